use serde::{Deserialize, Serialize};

use crate::header::ident::{ElfClass, ElfIdent};
use crate::reader::Reader;
use crate::section::{Section, SectionFlags, SectionType};
use crate::Error;

/// This enum represents the binding of a symbol, the upper four bits of its `st_info` field.
/// Bindings from the OS- and processor-specific ranges are preserved in the numeric variants.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum SymbolBinding {
    #[default]
    Local,
    Global,
    Weak,
    GnuUnique,
    Os(u8),
    Proc(u8),
    Unknown(u8),
}

impl From<u8> for SymbolBinding {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Local,
            1 => Self::Global,
            2 => Self::Weak,
            10 => Self::GnuUnique,
            value @ 11..=12 => Self::Os(value),
            value @ 13..=15 => Self::Proc(value),
            value => Self::Unknown(value),
        }
    }
}

/// This enum represents the type of a symbol, the lower four bits of its `st_info` field.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum SymbolType {
    #[default]
    NoType,
    Object,
    Func,
    Section,
    File,
    Common,
    Tls,
    GnuIFunc,
    Os(u8),
    Proc(u8),
    Unknown(u8),
}

impl From<u8> for SymbolType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NoType,
            1 => Self::Object,
            2 => Self::Func,
            3 => Self::Section,
            4 => Self::File,
            5 => Self::Common,
            6 => Self::Tls,
            10 => Self::GnuIFunc,
            value @ 11..=12 => Self::Os(value),
            value @ 13..=15 => Self::Proc(value),
            value => Self::Unknown(value),
        }
    }
}

/// This enum represents the visibility of a symbol, the lower two bits of its `st_other` field.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum SymbolVisibility {
    #[default]
    Default,
    Internal,
    Hidden,
    Protected,
}

impl From<u8> for SymbolVisibility {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            1 => Self::Internal,
            2 => Self::Hidden,
            3 => Self::Protected,
            _ => Self::Default,
        }
    }
}

/// This enum represents the `st_shndx` field of a symbol: either the index of the section the
/// symbol is defined in, or one of the reserved special values.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum SectionIndex {
    /// The symbol is undefined.
    Undef,

    /// Ordering lower bound reserved by the ABI.
    Before,

    /// Ordering upper bound reserved by the ABI.
    After,

    /// The symbol has an absolute value that is not affected by relocation.
    Abs,

    /// The symbol labels a common block that has not yet been allocated.
    Common,

    /// The real section index is held in the `SHT_SYMTAB_SHNDX` section.
    XIndex,

    /// A regular section index.
    Normal(u16),
}

impl SectionIndex {
    /// This function returns the literal name of a special index, or none for regular indices.
    pub fn special_name(&self) -> Option<&'static str> {
        match self {
            Self::Undef => Some("UNDEF"),
            Self::Before => Some("BEFORE"),
            Self::After => Some("AFTER"),
            Self::Abs => Some("ABS"),
            Self::Common => Some("COMMON"),
            Self::XIndex => Some("XINDEX"),
            Self::Normal(_) => None,
        }
    }
}

impl From<u16> for SectionIndex {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::Undef,
            0xFF00 => Self::Before,
            0xFF01 => Self::After,
            0xFFF1 => Self::Abs,
            0xFFF2 => Self::Common,
            0xFFFF => Self::XIndex,
            value => Self::Normal(value),
        }
    }
}

/// This structure represents one entry of a symbol table. The name is resolved through the
/// string table linked by the owning section; `section_name` and `access` are resolved from the
/// section named by `st_shndx` so that flag-based queries do not need a join.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Symbol {
    /// This field indicates the index of the name in the linked string table.
    pub name_index: u32,

    /// This field holds the name of the symbol, resolved from the linked string table.
    pub name: String,

    /// This field holds the value of the symbol, typically an address.
    pub value: u64,

    /// This field holds the size of the symbol in bytes.
    pub size: u64,

    /// This field represents the binding of the symbol. For more information, see
    /// [SymbolBinding].
    pub binding: SymbolBinding,

    /// This field represents the type of the symbol. For more information, see [SymbolType].
    pub ty: SymbolType,

    /// This field represents the visibility of the symbol. For more information, see
    /// [SymbolVisibility].
    pub visibility: SymbolVisibility,

    /// This field holds the section index of the symbol, which may be one of the reserved
    /// special values. For more information, see [SectionIndex].
    pub section_index: SectionIndex,

    /// This field holds the name of the section the symbol is defined in, or the literal name
    /// of a special section index.
    pub section_name: String,

    /// This field caches the access flags of the owning section, so that queries on access
    /// flags do not have to look the section up again.
    pub access: SectionFlags,
}

/// This function returns the size of one symbol entry for the specified class: 16 bytes on
/// 32-bit files, 24 bytes on 64-bit files.
#[inline]
pub fn entry_size(class: ElfClass) -> usize {
    match class {
        ElfClass::Class32 => 16,
        ElfClass::Class64 => 24,
    }
}

/// This function parses every entry of a symbol table section (`SHT_SYMTAB` or `SHT_DYNSYM`).
/// Names are resolved through the string table referenced by the section's `sh_link`. A
/// truncated entry is logged and skipped; the remaining entries still populate.
pub fn parse_symbol_section(
    ident: &ElfIdent,
    section: &Section,
    sections: &[Section],
) -> Vec<Symbol> {
    let image = section.image_bytes();
    let string_table = sections
        .get(section.link as usize)
        .map(Section::image_bytes)
        .unwrap_or(&[]);
    let step = entry_size(ident.class);
    let mut symbols = Vec::with_capacity(image.len() / step.max(1));

    let mut offset = 0usize;
    while offset + step <= image.len() {
        match parse_entry(ident, image, offset, string_table, sections) {
            Ok(symbol) => symbols.push(symbol),
            Err(error) => {
                tracing::warn!(
                    section = %section.name,
                    offset,
                    %error,
                    "skipping malformed symbol entry"
                );
            }
        }
        offset += step;
    }
    if offset < image.len() {
        tracing::warn!(
            section = %section.name,
            trailing = image.len() - offset,
            "symbol table ends with a partial entry"
        );
    }
    symbols
}

fn parse_entry(
    ident: &ElfIdent,
    image: &[u8],
    offset: usize,
    string_table: &[u8],
    sections: &[Section],
) -> Result<Symbol, Error> {
    let mut reader = Reader::with_position(image, ident.endian, offset);

    // The field order differs by class: 64-bit files carry info/other/shndx directly behind
    // the name index, 32-bit files carry value and size first.
    let (name_index, value, size, info, other, shndx) = match ident.class {
        ElfClass::Class64 => {
            let name_index = reader.read_u32()?;
            let info = reader.read_u8()?;
            let other = reader.read_u8()?;
            let shndx = reader.read_u16()?;
            let value = reader.read_u64()?;
            let size = reader.read_u64()?;
            (name_index, value, size, info, other, shndx)
        }
        ElfClass::Class32 => {
            let name_index = reader.read_u32()?;
            let value = reader.read_u32()? as u64;
            let size = reader.read_u32()? as u64;
            let info = reader.read_u8()?;
            let other = reader.read_u8()?;
            let shndx = reader.read_u16()?;
            (name_index, value, size, info, other, shndx)
        }
    };

    let name = resolve_string(string_table, name_index as usize);
    let section_index = SectionIndex::from(shndx);
    let (section_name, access) = match section_index {
        SectionIndex::Normal(index) => match sections.get(index as usize) {
            Some(owner) => (owner.name.clone(), owner.flags),
            None => (index.to_string(), SectionFlags::empty()),
        },
        special => (
            special.special_name().unwrap_or("UNDEF").to_string(),
            SectionFlags::empty(),
        ),
    };

    Ok(Symbol {
        name_index,
        name,
        value,
        size,
        binding: SymbolBinding::from(info >> 4),
        ty: SymbolType::from(info & 0xF),
        visibility: SymbolVisibility::from(other),
        section_index,
        section_name,
        access,
    })
}

/// This function reads the null-terminated string at the specified index of a string table.
/// An out-of-range index yields an empty string.
pub fn resolve_string(table: &[u8], index: usize) -> String {
    let Some(rest) = table.get(index..) else {
        return String::new();
    };
    let end = rest.iter().position(|&byte| byte == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// This function indicates whether the specified section holds a symbol table.
#[inline]
pub fn is_symbol_table(section: &Section) -> bool {
    matches!(
        section.ty,
        SectionType::SymbolTable | SectionType::DynamicSymbol
    )
}
