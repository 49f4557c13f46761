//! Library for parsing and introspecting ELF object files and the DWARF v4/v5 debug
//! information carried inside them. The parser materialises headers, sections, segments,
//! symbols, notes and build attributes into an in-memory model, persists that model in a
//! hash-gated sibling store (`.prgdb`) and exposes filterable queries over it. The DWARF
//! pipeline decodes abbreviation tables, DIE trees, attribute forms, location expressions and
//! line-number programs on top of the same model.

#[cfg(test)]
pub mod tests;

pub mod arm;
pub mod cache;
pub mod dwarf;
pub mod header;
pub mod query;
pub mod reader;
pub mod section;
pub mod segment;
pub mod symbol;

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;

use crate::arm::ArmAttributes;
use crate::cache::{CacheMeta, CachedModel};
use crate::dwarf::die::DebugInfo;
use crate::header::FileHeader;
use crate::section::{Note, Section, SectionType};
use crate::segment::ProgramSegment;
use crate::symbol::Symbol;

/// This enum represents all possible recoverable error codes in this library. This error is
/// used on any operation that can fail. Cache mismatches are non-fatal to the open path; they
/// trigger a rebuild and only surface when the caller inspects the cache directly.
#[derive(Error, Debug)]
pub enum Error {
    /// The ELF magic bytes can't be found at the start of the specified data
    #[error("unable to find magic bytes in specified ELF")]
    BadMagic,

    /// The `EI_CLASS` byte is neither 32- nor 64-bit
    #[error("unsupported ELF class {0}")]
    UnsupportedClass(u8),

    /// The `EI_DATA` byte is neither little- nor big-endian
    #[error("unsupported ELF data encoding {0}")]
    UnsupportedEndianness(u8),

    /// The `EI_VERSION` byte is not the current version
    #[error("unsupported ELF version {0}")]
    UnsupportedVersion(u8),

    /// A reader requested more bytes than remain in the stream
    #[error("truncated input: {wanted} bytes wanted at position {position}")]
    Truncated { position: usize, wanted: usize },

    /// A LEB128 accumulator would exceed 64 bits
    #[error("LEB128 value exceeds 64 bits")]
    LebOverflow,

    /// Bytes labelled UTF-8 failed to decode
    #[error("string is not valid UTF-8")]
    Encoding(#[from] core::str::Utf8Error),

    /// An attribute definition uses a form number this library cannot decode
    #[error("unknown DWARF form 0x{0:x}")]
    UnknownForm(u64),

    /// A DIE names an abbreviation code with no definition in its table
    #[error("no abbreviation with code {0}")]
    UnknownAbbrev(u64),

    /// A tag number outside of every registered range was rejected by a caller
    #[error("unknown DWARF tag 0x{0:x}")]
    UnknownTag(u64),

    /// An expression popped more values than its stack holds
    #[error("expression stack underflow")]
    StackUnderflow,

    /// An expression uses an opcode this library cannot evaluate
    #[error("unknown DWARF opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// The requested operation needs context or support that is not available
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A required debug section is missing from the file
    #[error("missing section {0}")]
    MissingSection(&'static str),

    /// The cache rows do not match the schema of this library version
    #[error("cache schema does not match this library version")]
    CacheSchemaMismatch,

    /// The cache was built from different input bytes
    #[error("cache was built from different file contents")]
    CacheHashMismatch,

    /// Some std I/O operation failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A query name pattern is not a valid regular expression
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// The bytes backing one parser: a read-only map of the input file, or an owned copy when the
/// parser was fed a slice. The mapped file is never written through.
enum ElfData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl ElfData {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Owned(bytes) => bytes,
        }
    }
}

/// This struct is the parser over one ELF file. Opening a file decodes the header, sections,
/// segments, symbols, notes and `.comment` once; section images are owned copies, so the model
/// outlives the mapping. Opening through [ElfParser::from_path] additionally gates the work
/// behind the `.prgdb` store: an existing cache built from identical bytes is loaded instead of
/// re-parsing, a stale one is dropped and rebuilt.
pub struct ElfParser {
    data: Option<ElfData>,
    header: FileHeader,
    sections: Vec<Section>,
    segments: Vec<ProgramSegment>,
    symbols: Vec<Symbol>,
    notes: Vec<Note>,
    comment: String,
    file_hash: String,
    db_path: Option<PathBuf>,
    debug_info: Option<DebugInfo>,
}

impl ElfParser {
    /// This function parses the specified bytes into the in-memory model without touching any
    /// cache. The bytes are hashed so that the model can later be persisted.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::BadMagic] - The magic bytes of the file can't be found
    /// - [Error::UnsupportedClass] - The provided ELF file's class is not valid
    /// - [Error::UnsupportedEndianness] - The provided ELF file's data encoding is not valid
    /// - [Error::UnsupportedVersion] - The identification version byte is not 1
    /// - [Error::Truncated] - A header table runs past the end of the data
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut parser = Self::parse(bytes)?;
        parser.file_hash = cache::file_hash(bytes);
        parser.data = Some(ElfData::Owned(bytes.to_vec()));
        Ok(parser)
    }

    /// This function opens the specified file through the persistent store. The file is mapped
    /// read-only and hashed; a sibling `.prgdb` built from the same bytes and schema is reused,
    /// anything else is discarded, re-parsed and re-written in one batch.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::IO](Error::Io) - Opening or mapping the file failed, or the store is unwritable
    /// - plus everything [ElfParser::from_bytes] can raise
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        // The mapping is read-only and the file is not expected to change underneath us; the
        // hash gate catches it at the next open if it does.
        let map = unsafe { Mmap::map(&file)? };
        let file_hash = cache::file_hash(&map);
        let db_path = cache::sibling_path(path.as_ref());

        match cache::load(&db_path, &file_hash) {
            Ok(model) => {
                tracing::debug!(path = %db_path.display(), "reusing program database");
                let mut parser = Self::from_cached(model);
                parser.data = Some(ElfData::Mapped(map));
                parser.db_path = Some(db_path);
                Ok(parser)
            }
            Err(error) => {
                match &error {
                    Error::Io(io) if io.kind() == ErrorKind::NotFound => {}
                    Error::CacheSchemaMismatch | Error::CacheHashMismatch => {
                        tracing::debug!(path = %db_path.display(), %error, "rebuilding program database");
                        cache::remove_stale(&db_path);
                    }
                    _ => return Err(error),
                }
                let mut parser = Self::parse(&map)?;
                parser.file_hash = file_hash;
                parser.data = Some(ElfData::Mapped(map));
                parser.db_path = Some(db_path);
                parser.store()?;
                Ok(parser)
            }
        }
    }

    /// The full parse: header, section headers with images and names, program headers, symbol
    /// tables, notes and `.comment`.
    fn parse(data: &[u8]) -> Result<Self, Error> {
        let header = FileHeader::read(data)?;
        let ident = header.ident;

        // Section headers first; names resolve through the section pointed at by e_shstrndx
        // once all headers are in.
        let mut sections = Vec::with_capacity(header.section_header_count as usize);
        for index in 0..header.section_header_count as usize {
            let offset = header.section_header_offset as usize
                + index * header.section_header_size as usize;
            let mut section = Section::read(&ident, data, offset, index)?;
            if section.has_content() {
                let start = section.offset as usize;
                let end = start.checked_add(section.size as usize);
                section.image = Some(
                    end.and_then(|end| data.get(start..end))
                        .ok_or(Error::Truncated {
                            position: start,
                            wanted: section.size as usize,
                        })?
                        .to_vec(),
                );
            }
            sections.push(section);
        }
        let string_table = sections
            .get(header.string_table_index as usize)
            .map(Section::image_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        for section in &mut sections {
            section.name = symbol::resolve_string(&string_table, section.name_index as usize);
        }

        let mut segments = Vec::with_capacity(header.program_header_count as usize);
        for index in 0..header.program_header_count as usize {
            let offset = header.program_header_offset as usize
                + index * header.program_header_size as usize;
            segments.push(ProgramSegment::read(&ident, data, offset)?);
        }

        let mut symbols = Vec::new();
        for section in sections.iter().filter(|section| symbol::is_symbol_table(section)) {
            symbols.extend(symbol::parse_symbol_section(&ident, section, &sections));
        }

        let mut notes = Vec::new();
        for section in sections.iter().filter(|section| section.ty == SectionType::Note) {
            notes.extend(section::parse_notes(section, &ident));
        }

        let comment = sections
            .iter()
            .find(|section| section.name == ".comment")
            .map(|section| section::parse_comment(section.image_bytes()))
            .unwrap_or_default();

        Ok(Self {
            data: None,
            header,
            sections,
            segments,
            symbols,
            notes,
            comment,
            file_hash: String::new(),
            db_path: None,
            debug_info: None,
        })
    }

    /// Rebuilds a parser from the rows of a validated store.
    fn from_cached(model: CachedModel) -> Self {
        let debug_info = if model.units.is_empty() && model.dies.is_empty() {
            None
        } else {
            Some(DebugInfo::from_parts(model.units, model.dies))
        };
        Self {
            data: None,
            header: model.header,
            sections: model.sections,
            segments: model.segments,
            symbols: model.symbols,
            notes: model.notes,
            comment: model.comment,
            file_hash: model.meta.file_hash,
            db_path: None,
            debug_info,
        }
    }

    /// Serialises the current model into the store, when one is attached.
    fn store(&self) -> Result<(), Error> {
        let Some(db_path) = &self.db_path else {
            return Ok(());
        };
        let (units, dies) = match &self.debug_info {
            Some(info) => (info.units.clone(), info.dies.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let model = CachedModel {
            meta: CacheMeta {
                schema_version: cache::SCHEMA_VERSION,
                file_hash: self.file_hash.clone(),
            },
            header: self.header,
            sections: self.sections.clone(),
            segments: self.segments.clone(),
            symbols: self.symbols.clone(),
            notes: self.notes.clone(),
            comment: self.comment.clone(),
            units,
            dies,
        };
        cache::store(db_path, &model)
    }

    /// This function returns a reference to the file header.
    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// This function returns the sections in file order.
    #[inline]
    pub fn sections_raw(&self) -> &[Section] {
        &self.sections
    }

    /// This function returns the program segments in file order.
    #[inline]
    pub fn segments(&self) -> &[ProgramSegment] {
        &self.segments
    }

    /// This function returns the symbols in table order, symbol-table sections concatenated.
    #[inline]
    pub fn symbols_raw(&self) -> &[Symbol] {
        &self.symbols
    }

    /// This function returns the parsed note records.
    #[inline]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// This function returns the decoded `.comment` text; an ELF without the section (or with
    /// an empty one) yields an empty string.
    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// This function returns the SHA-512 of the input bytes as a hex string.
    #[inline]
    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    /// This function returns the query interface over the sections.
    pub fn sections(&self) -> query::SectionQuery<'_> {
        query::SectionQuery::new(&self.sections)
    }

    /// This function returns the query interface over the symbols.
    pub fn symbols(&self) -> query::SymbolQuery<'_> {
        query::SymbolQuery::new(&self.symbols)
    }

    /// This function returns the DWARF debug sections in file order.
    pub fn debug_sections(&self) -> Vec<&Section> {
        self.sections.iter().filter(|section| section.is_debug()).collect()
    }

    /// This function builds the section-to-segment mapping: for every segment, in program
    /// header order, the indices of the sections it contains.
    pub fn section_to_segment_mapping(&self) -> Vec<Vec<usize>> {
        segment::section_to_segment_mapping(&self.sections, &self.segments)
    }

    /// This function decodes the `.ARM.attributes` section, when the file carries one.
    pub fn arm_attributes(&self) -> Option<Result<ArmAttributes, Error>> {
        self.sections
            .iter()
            .find(|section| section.name == ".ARM.attributes")
            .map(|section| ArmAttributes::parse(section.image_bytes(), self.header.ident.endian))
    }

    /// This function returns the debug information decoded by a previous run of the DWARF
    /// pipeline, either in this process or restored from the store.
    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug_info.as_ref()
    }

    /// This function attaches decoded debug information to the model and re-writes the store
    /// (one row per DIE) when one is attached.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::IO](Error::Io) - Writing the store failed
    pub fn store_debug_info(&mut self, info: DebugInfo) -> Result<(), Error> {
        self.debug_info = Some(info);
        self.store()
    }

    /// This function returns the raw input bytes, when the parser still holds them.
    pub fn image(&self) -> Option<&[u8]> {
        self.data.as_ref().map(ElfData::as_slice)
    }
}
