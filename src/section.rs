use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::header::ident::{ElfClass, ElfIdent};
use crate::header::read_class_dependent;
use crate::reader::Reader;
use crate::Error;

/// This enum represents every known type of an ELF section. Values inside of the OS- and
/// processor-specific ranges as well as unregistered values are preserved in
/// [SectionType::Unknown].
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum SectionType {
    #[default]
    Null,
    ProgBits,
    SymbolTable,
    StringTable,
    Rela,
    Hash,
    Dynamic,
    Note,
    NoBits,
    Rel,
    ShLib,
    DynamicSymbol,
    InitArray,
    FiniArray,
    PreInitArray,
    Group,
    SymbolTableIndex,
    Unknown(u32),
}

impl From<u32> for SectionType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::ProgBits,
            2 => Self::SymbolTable,
            3 => Self::StringTable,
            4 => Self::Rela,
            5 => Self::Hash,
            6 => Self::Dynamic,
            7 => Self::Note,
            8 => Self::NoBits,
            9 => Self::Rel,
            10 => Self::ShLib,
            11 => Self::DynamicSymbol,
            14 => Self::InitArray,
            15 => Self::FiniArray,
            16 => Self::PreInitArray,
            17 => Self::Group,
            18 => Self::SymbolTableIndex,
            value => Self::Unknown(value),
        }
    }
}

bitflags! {
    /// This structure contains all flags for a section in an ELF file
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
    pub struct SectionFlags: u64 {
        /// This section is writable during execution
        const WRITE            = 0x1;

        /// This section occupies memory during process execution
        const ALLOC            = 0x2;

        /// This section contains executable machine instructions
        const EXECINSTR        = 0x4;

        /// The data in this section should be merged to avoid duplication
        const MERGE            = 0x10;

        /// This data section holds null-terminated strings
        const STRINGS          = 0x20;

        /// The `info` field of this header contains a section header table index
        const INFO_LINK        = 0x40;

        /// This flag adds special ordering requirements for link editors
        const LINK_ORDER       = 0x80;

        /// This section requires special OS-specific processing to avoid incorrect behavior
        const OS_NONCONFORMING = 0x100;

        /// This section is a member of a group
        const GROUP            = 0x200;

        /// This section holds the thread-local storage
        const TLS              = 0x400;

        /// This section contains compressed data
        const COMPRESSED       = 0x800;

        /// Reserved range for OS-specific semantics
        const MASKOS           = 0x0FF0_0000;

        /// Reserved range for processor-specific semantics
        const MASKPROC         = 0xF000_0000;
    }
}

/// This structure represents one section of an ELF file: the raw header fields, the name
/// resolved through the section-name string table and, for content-bearing sections, a copy of
/// the image bytes. The image is owned by the section; everything else in the model refers to
/// sections by index.
///
/// ## See also
/// - [Sections](https://www.sco.com/developers/gabi/latest/ch4.sheader.html) by SCO, Inc.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Section {
    /// This field indicates the 0-based position of this section in the section header table.
    pub index: usize,

    /// This field holds the name of the section, resolved from the section-name string table.
    pub name: String,

    /// This field indicates the index of the name in the string table.
    pub name_index: u32,

    /// This field indicates the type of this section.
    pub ty: SectionType,

    /// This field indicates the flags of this section.
    pub flags: SectionFlags,

    /// This field indicates the address of the first byte, if this section will appear in the
    /// memory.
    pub address: u64,

    /// This field indicates the offset of the first byte of the section from the start of the
    /// ELF data.
    pub offset: u64,

    /// This field indicates the size of the section in bytes.
    pub size: u64,

    /// This field indicates a section header table link index. (Interpretation depends on
    /// section type)
    pub link: u32,

    /// This field holds extra information about this section. (Interpretation depends on
    /// section type)
    pub info: u32,

    /// This field indicates the alignment for this section.
    pub alignment: u64,

    /// This field indicates the size of fixed-size entries. This value is zero if there are no
    /// entries. This value is used in sections like the symbol table.
    pub entry_size: u64,

    /// This field holds a copy of the section's bytes when the section has content in the file.
    /// `NULL` and `NOBITS` sections and sections with zero size carry no image.
    pub image: Option<Vec<u8>>,
}

impl Section {
    /// This function reads the header fields of a single section. The name and the image are
    /// attached afterwards by the parser, once the section-name string table is available.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - The header is cut short
    pub fn read(ident: &ElfIdent, data: &[u8], offset: usize, index: usize) -> Result<Self, Error> {
        let mut reader = Reader::with_position(data, ident.endian, offset);
        let name_index = reader.read_u32()?;
        let ty = SectionType::from(reader.read_u32()?);
        let flags = SectionFlags::from_bits_retain(read_class_dependent!(ident.class, reader));
        let address = read_class_dependent!(ident.class, reader);
        let file_offset = read_class_dependent!(ident.class, reader);
        let size = read_class_dependent!(ident.class, reader);
        let link = reader.read_u32()?;
        let info = reader.read_u32()?;
        let alignment = read_class_dependent!(ident.class, reader);
        let entry_size = read_class_dependent!(ident.class, reader);
        Ok(Self {
            index,
            name: String::new(),
            name_index,
            ty,
            flags,
            address,
            offset: file_offset,
            size,
            link,
            info,
            alignment,
            entry_size,
            image: None,
        })
    }

    /// This function indicates whether the section occupies bytes in the file. `NULL` and
    /// `NOBITS` sections and zero-sized sections do not.
    #[inline]
    pub fn has_content(&self) -> bool {
        !matches!(self.ty, SectionType::Null | SectionType::NoBits) && self.size > 0
    }

    /// This function indicates whether this is one of the DWARF debug sections.
    #[inline]
    pub fn is_debug(&self) -> bool {
        self.name.starts_with(".debug")
    }

    /// This function indicates whether this section belongs to a split-DWARF object.
    #[inline]
    pub fn is_dwo(&self) -> bool {
        self.name.ends_with(".dwo")
    }

    /// This function returns the image bytes of the section, or an empty slice when the section
    /// has no content.
    #[inline]
    pub fn image_bytes(&self) -> &[u8] {
        self.image.as_deref().unwrap_or(&[])
    }
}

/// This structure represents one record of a `SHT_NOTE` section: a producer name, a type code
/// with producer-defined meaning and an opaque descriptor payload.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Note {
    /// This field holds the name of the section the record was found in.
    pub section_name: String,

    /// This field holds the producer-defined type code of the record.
    pub ty: u32,

    /// This field holds the producer name, e.g. `GNU` or `Go`.
    pub name: String,

    /// This field holds the raw descriptor payload.
    pub descriptor: Vec<u8>,
}

/// This function parses the records of a note section. Both the name and the descriptor are
/// padded to 4-byte boundaries on the wire. A truncated trailing record ends the scan; complete
/// records before it are kept.
pub fn parse_notes(section: &Section, ident: &ElfIdent) -> Vec<Note> {
    let image = section.image_bytes();
    let mut reader = Reader::new(image, ident.endian);
    let mut notes = Vec::new();
    while reader.remaining() >= 12 {
        let result: Result<Note, Error> = (|| {
            let name_size = reader.read_u32()? as usize;
            let desc_size = reader.read_u32()? as usize;
            let ty = reader.read_u32()?;
            let name_raw = reader.read_block(name_size)?;
            reader.skip(padding_to_4(name_size));
            let descriptor = reader.read_block(desc_size)?;
            reader.skip(padding_to_4(desc_size));
            let name = name_raw
                .split(|&byte| byte == 0)
                .next()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            Ok(Note {
                section_name: section.name.clone(),
                ty,
                name,
                descriptor,
            })
        })();
        match result {
            Ok(note) => notes.push(note),
            Err(error) => {
                tracing::debug!(section = %section.name, %error, "stopping note scan on malformed record");
                break;
            }
        }
    }
    notes
}

#[inline]
fn padding_to_4(length: usize) -> usize {
    (4 - (length % 4)) % 4
}

/// This function decodes the text of a `.comment` section. The image is split on NUL bytes and
/// the non-empty parts are joined with newlines; an image without any NUL byte is returned
/// verbatim. An empty image yields an empty string.
pub fn parse_comment(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    if !data.contains(&0) {
        return String::from_utf8_lossy(data).into_owned();
    }
    data.split(|&byte| byte == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
