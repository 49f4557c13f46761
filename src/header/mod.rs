use serde::{Deserialize, Serialize};

use crate::header::ident::{ElfClass, ElfIdent};
use crate::reader::Reader;
use crate::Error;

pub mod ident;

/// This macro reads one class-sized field: a `u32` widened to 64 bits on 32-bit files, a plain
/// `u64` on 64-bit files.
macro_rules! read_class_dependent {
    ($class: expr, $reader: expr) => {
        match $class {
            ElfClass::Class32 => $reader.read_u32()? as u64,
            ElfClass::Class64 => $reader.read_u64()?,
        }
    };
}

pub(crate) use read_class_dependent;

/// This enum represents the type of the ELF file. The file can be a relocatable file, an
/// executable file, a shared object or a core file.
///
/// - [FileType::None]: No file type defined
/// - [FileType::Relocatable]: Relocatable file
/// - [FileType::Executable]: Executable file
/// - [FileType::SharedObject]: Shared object file
/// - [FileType::Core]: Core file
///
/// ## See also
/// - [ELF Header](https://www.sco.com/developers/gabi/latest/ch4.eheader.html) by SCO, Inc.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
    Unknown(u16),
}

impl From<u16> for FileType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Relocatable,
            2 => Self::Executable,
            3 => Self::SharedObject,
            4 => Self::Core,
            value => Self::Unknown(value),
        }
    }
}

/// This enum represents the target architecture/machine of the ELF file. The list covers the
/// machines this library is routinely pointed at (embedded and hosted toolchains); every other
/// value is preserved in [TargetMachine::Unknown].
///
/// ## See also
/// - [ELF Header](https://www.sco.com/developers/gabi/latest/ch4.eheader.html) by SCO, Inc.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum TargetMachine {
    #[default]
    None,
    M68K,
    X86,
    MIPS,
    PowerPC,
    PowerPC64,
    ARM,
    SuperH,
    SPARCV9,
    X86_64,
    AVR,
    Xtensa,
    MSP430,
    ARM64,
    RISCV,
    Unknown(u16),
}

impl From<u16> for TargetMachine {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            3 => Self::X86,
            4 => Self::M68K,
            8 => Self::MIPS,
            20 => Self::PowerPC,
            21 => Self::PowerPC64,
            40 => Self::ARM,
            42 => Self::SuperH,
            43 => Self::SPARCV9,
            62 => Self::X86_64,
            83 => Self::AVR,
            94 => Self::Xtensa,
            105 => Self::MSP430,
            183 => Self::ARM64,
            243 => Self::RISCV,
            value => Self::Unknown(value),
        }
    }
}

/// This struct represents the file header of an ELF file. This header contains information about
/// the different program and section headers and the location of them in the file.
///
/// ## See also
/// - [ELF Header](https://www.sco.com/developers/gabi/latest/ch4.eheader.html) by SCO, Inc.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct FileHeader {
    /// This struct represents the identification bytes of the ELF file. For more information,
    /// see [ElfIdent].
    pub ident: ElfIdent,

    /// This field represents the type of the ELF file. For more information, see [FileType].
    pub ty: FileType,

    /// This field represents the architecture target of the ELF file. For more information, see
    /// [TargetMachine].
    pub machine: TargetMachine,

    /// This field indicates the version of the object file.
    pub version: u32,

    /// This field represents the virtual address of the entrypoint function. If there is no
    /// entry this field is null. In this API, the field is none when there is no address.
    pub entry_address: Option<u64>,

    /// This field indicates the in-file offset for the program header tables. If there are no
    /// program headers, this value is zero.
    pub program_header_offset: u64,

    /// This field indicates the in-file offset for the section header tables. If there are no
    /// section headers, this value is zero.
    pub section_header_offset: u64,

    /// This field holds target-specific flags.
    pub flags: u32,

    /// This field indicates the size of the ELF file header.
    pub file_header_size: u16,

    /// This field indicates the size of a single program header. All program headers have the
    /// same size.
    pub program_header_size: u16,

    /// This field indicates the count of the program headers in the file. If there are no
    /// program headers, this value is zero.
    pub program_header_count: u16,

    /// This field indicates the size of a single section header. All section headers have the
    /// same size.
    pub section_header_size: u16,

    /// This field indicates the count of the section headers in the file. If there are no
    /// section headers, this value is zero.
    pub section_header_count: u16,

    /// This member holds the index of the section-name string table. If there is no string
    /// table, this value is equal to `SHN_UNDEF`.
    pub string_table_index: u16,
}

impl FileHeader {
    /// This function parses the identification prefix and the extended header behind it. Field
    /// widths follow the class announced by the identification.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::BadMagic] - The magic bytes of the file can't be found
    /// - [Error::UnsupportedClass] - The provided ELF file's class is not valid
    /// - [Error::UnsupportedEndianness] - The provided ELF file's data encoding is not valid
    /// - [Error::UnsupportedVersion] - The identification version byte is not 1
    /// - [Error::Truncated] - The header is cut short
    pub fn read(data: &[u8]) -> Result<FileHeader, Error> {
        let ident = ElfIdent::parse(data)?;
        let mut reader = Reader::with_position(data, ident.endian, ElfIdent::SIZE);

        // Read platform-independent sized fields
        let ty = reader.read_u16()?;
        let machine = reader.read_u16()?;
        let version = reader.read_u32()?;

        // Read entrypoint address and the offsets of both header tables
        let entry_address = read_class_dependent!(ident.class, reader);
        let program_header_offset = read_class_dependent!(ident.class, reader);
        let section_header_offset = read_class_dependent!(ident.class, reader);

        // Read target-specific flags and size of this header
        let flags = reader.read_u32()?;
        let file_header_size = reader.read_u16()?;

        // Read count and size of program headers
        let program_header_size = reader.read_u16()?;
        let program_header_count = reader.read_u16()?;

        // Read count and size of section headers
        let section_header_size = reader.read_u16()?;
        let section_header_count = reader.read_u16()?;

        // Read index of string table header
        let string_table_index = reader.read_u16()?;

        Ok(Self {
            ident,
            ty: FileType::from(ty),
            machine: TargetMachine::from(machine),
            version,
            entry_address: if entry_address == 0 { None } else { Some(entry_address) },
            program_header_offset,
            section_header_offset,
            flags,
            file_header_size,
            program_header_size,
            program_header_count,
            section_header_size,
            section_header_count,
            string_table_index,
        })
    }
}
