use indexmap::IndexMap;

use crate::header::ident::{ElfClass, ElfEndian};
use crate::reader::Reader;
use crate::ElfParser;
use crate::Error;

pub mod abbrev;
pub mod constants;
pub mod die;
pub mod expr;
pub mod line;
pub mod traverse;

use abbrev::AbbreviationTable;
use die::{DebugInfo, DieDecoder};
use line::LineNumberProgram;

/// This structure represents the header of one `.debug_pubnames` set together with its name
/// entries.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PubNamesSet {
    pub unit_length: u32,
    pub version: u16,
    pub debug_info_offset: u32,
    pub debug_info_length: u32,
    pub entries: Vec<PubName>,
}

/// One entry of a `.debug_pubnames` set: the CU-relative DIE offset and the public name.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PubName {
    pub offset: u32,
    pub name: String,
}

/// This structure represents the header of one `.debug_aranges` set. The range records behind
/// the header are retained as opaque bytes; this library does not interpret them.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ArangesSet {
    pub unit_length: u32,
    pub version: u16,
    pub debug_info_offset: u32,
    pub address_size: u8,
    pub segment_size: u8,
    pub raw_ranges: Vec<u8>,
}

/// This structure represents the header of a `.debug_macro` section (DWARF v5 macro
/// information), parsed to the header level.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MacroHeader {
    pub version: u16,
    pub flags: u8,
    pub debug_line_offset: Option<u32>,
}

/// One entry of a `.debug_macinfo` section (DWARF v4 macro information).
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum MacInfoEntry {
    Define { line: u64, text: String },
    Undef { line: u64, text: String },
    StartFile { line: u64, file: u64 },
    EndFile,
    VendorExt { constant: u64, text: String },
}

/// This structure is the DWARF pipeline over one parsed ELF file. It holds copies of the debug
/// section images, the per-file abbreviation table and the endianness and default address size
/// derived from the ELF identification. Caches are per instance; two processors never share
/// state.
pub struct DwarfProcessor {
    sections: IndexMap<String, Vec<u8>>,
    endian: ElfEndian,
    address_size: u8,
    abbreviations: AbbreviationTable,
}

impl DwarfProcessor {
    /// This function creates a processor over the debug sections of the specified parser.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::MissingSection] - The file carries no `.debug_info` or no `.debug_abbrev`
    pub fn new(parser: &ElfParser) -> Result<Self, Error> {
        let mut sections: IndexMap<String, Vec<u8>> = IndexMap::new();
        for section in parser.debug_sections() {
            sections.insert(section.name.clone(), section.image_bytes().to_vec());
        }
        if !sections.contains_key(".debug_info") {
            return Err(Error::MissingSection(".debug_info"));
        }
        let abbrev = sections
            .get(".debug_abbrev")
            .ok_or(Error::MissingSection(".debug_abbrev"))?
            .clone();
        let ident = parser.header().ident;
        Ok(Self {
            sections,
            endian: ident.endian,
            address_size: match ident.class {
                ElfClass::Class32 => 4,
                ElfClass::Class64 => 8,
            },
            abbreviations: AbbreviationTable::new(abbrev),
        })
    }

    /// This function returns the image of the specified debug section, or an empty slice when
    /// the file does not carry it.
    pub fn section(&self, name: &str) -> &[u8] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// This function returns the byte order of the processed file.
    #[inline]
    pub fn endian(&self) -> ElfEndian {
        self.endian
    }

    /// This function returns the default address size derived from the ELF class. Compilation
    /// units carry their own address size which takes precedence within the unit.
    #[inline]
    pub fn address_size(&self) -> u8 {
        self.address_size
    }

    /// This function reads the null-terminated string at the specified offset of `.debug_str`.
    pub fn get_string(&self, offset: u64) -> Result<String, Error> {
        let strings = self.section(".debug_str");
        let mut reader = Reader::with_position(strings, self.endian, offset as usize);
        Ok(reader.read_cstring_utf8()?.0)
    }

    /// This function walks `.debug_info` and materialises the DIE trees of every compilation
    /// unit. The abbreviation table is filled lazily along the way.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - A unit or attribute payload is cut short
    /// - [Error::UnknownForm] - An attribute uses a form this library cannot decode
    /// - [Error::UnknownAbbrev] - A DIE names an abbreviation code without definition
    /// - [Error::Unsupported] - A unit announces the 64-bit DWARF format
    pub fn debug_info(&mut self) -> Result<DebugInfo, Error> {
        let info = self.sections.get(".debug_info").cloned().unwrap_or_default();
        let strings = self.sections.get(".debug_str").cloned().unwrap_or_default();
        let line_strings = self
            .sections
            .get(".debug_line_str")
            .cloned()
            .unwrap_or_default();
        let decoder = DieDecoder::new(&info, &strings, &line_strings, self.endian);
        decoder.parse(&mut self.abbreviations)
    }

    /// This function parses every line-number program of `.debug_line`.
    pub fn line_programs(&self) -> Result<Vec<LineNumberProgram>, Error> {
        let image = self.section(".debug_line");
        let mut reader = Reader::new(image, self.endian);
        let mut programs = Vec::new();
        while reader.remaining() > 4 {
            programs.push(LineNumberProgram::read(&mut reader)?);
        }
        Ok(programs)
    }

    /// This function parses the name sets of `.debug_pubnames`. The section is optional; a
    /// file without it yields an empty list.
    pub fn pubnames(&self) -> Result<Vec<PubNamesSet>, Error> {
        let image = self.section(".debug_pubnames");
        let mut reader = Reader::new(image, self.endian);
        let mut sets = Vec::new();
        while reader.remaining() > 4 {
            let unit_length = reader.read_u32()?;
            let set_end = reader.position() + unit_length as usize;
            let mut set = PubNamesSet {
                unit_length,
                version: reader.read_u16()?,
                debug_info_offset: reader.read_u32()?,
                debug_info_length: reader.read_u32()?,
                entries: Vec::new(),
            };
            loop {
                let offset = reader.read_u32()?;
                if offset == 0 {
                    break;
                }
                let (name, _) = reader.read_cstring_ascii()?;
                set.entries.push(PubName { offset, name });
            }
            reader.seek(set_end);
            sets.push(set);
        }
        Ok(sets)
    }

    /// This function parses the set headers of `.debug_aranges`. The per-range records are
    /// preserved as raw bytes, they are not interpreted.
    pub fn aranges(&self) -> Result<Vec<ArangesSet>, Error> {
        let image = self.section(".debug_aranges");
        let mut reader = Reader::new(image, self.endian);
        let mut sets = Vec::new();
        while reader.remaining() > 4 {
            let unit_length = reader.read_u32()?;
            let set_end = reader.position() + unit_length as usize;
            let version = reader.read_u16()?;
            let debug_info_offset = reader.read_u32()?;
            let address_size = reader.read_u8()?;
            let segment_size = reader.read_u8()?;
            let raw_ranges = reader.read_block(set_end.saturating_sub(reader.position()))?;
            sets.push(ArangesSet {
                unit_length,
                version,
                debug_info_offset,
                address_size,
                segment_size,
                raw_ranges,
            });
        }
        Ok(sets)
    }

    /// This function parses the header of `.debug_macro`, when present.
    pub fn macro_header(&self) -> Result<Option<MacroHeader>, Error> {
        let image = self.section(".debug_macro");
        if image.is_empty() {
            return Ok(None);
        }
        let mut reader = Reader::new(image, self.endian);
        let version = reader.read_u16()?;
        let flags = reader.read_u8()?;
        let debug_line_offset = if flags & 0x02 != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        Ok(Some(MacroHeader {
            version,
            flags,
            debug_line_offset,
        }))
    }

    /// This function parses the entries of `.debug_macinfo`, when present. The section has no
    /// header; it is a sequence of typed entries terminated by a zero type.
    pub fn macinfo(&self) -> Result<Vec<MacInfoEntry>, Error> {
        let image = self.section(".debug_macinfo");
        let mut reader = Reader::new(image, self.endian);
        let mut entries = Vec::new();
        while !reader.is_empty() {
            let (entry_type, _) = reader.read_uleb()?;
            let entry = match entry_type {
                0x00 => break,
                0x01 => MacInfoEntry::Define {
                    line: reader.read_uleb()?.0,
                    text: reader.read_cstring_ascii()?.0,
                },
                0x02 => MacInfoEntry::Undef {
                    line: reader.read_uleb()?.0,
                    text: reader.read_cstring_ascii()?.0,
                },
                0x03 => MacInfoEntry::StartFile {
                    line: reader.read_uleb()?.0,
                    file: reader.read_uleb()?.0,
                },
                0x04 => MacInfoEntry::EndFile,
                0xFF => MacInfoEntry::VendorExt {
                    constant: reader.read_uleb()?.0,
                    text: reader.read_cstring_ascii()?.0,
                },
                value => {
                    tracing::debug!(value, "unknown macinfo entry type");
                    return Err(Error::Unsupported("macinfo entry type"));
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }
}
