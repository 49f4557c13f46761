use serde::{Deserialize, Serialize};

use crate::Error;

/// This enum represents the `EI_CLASS` field of the ident bytes in the header. This is `Class32`
/// if this file is a 32-bit object or `Class64` if this file is a 64-bit object. The class decides
/// the width of every class-sized field in the section headers, program headers and symbol
/// entries that follow.
///
/// - [ElfClass::Class32]: 32-bit ELF file
/// - [ElfClass::Class64]: 64-bit ELF file
#[repr(u8)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum ElfClass {
    Class32 = 1,
    Class64 = 2,
}

impl ElfClass {
    /// This function decodes the class byte of the identification prefix.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::UnsupportedClass] - The byte is neither 1 nor 2
    pub fn from_byte(value: u8) -> Result<Self, Error> {
        match value {
            1 => Ok(Self::Class32),
            2 => Ok(Self::Class64),
            value => Err(Error::UnsupportedClass(value)),
        }
    }

    /// This function returns the width in bytes of a class-sized (address/offset) field.
    #[inline]
    pub fn word_size(&self) -> usize {
        match self {
            Self::Class32 => 4,
            Self::Class64 => 8,
        }
    }
}

/// This enum represents the `EI_DATA` field of the ident bytes in the header. This is
/// [`ElfEndian::Little`] when this file is little-endian encoded or [`ElfEndian::Big`] when this
/// file is big-endian encoded.
///
/// - [ElfEndian::Little]: Little endian
/// - [ElfEndian::Big]: Big endian
#[repr(u8)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum ElfEndian {
    Little = 1,
    Big = 2,
}

impl ElfEndian {
    /// This function decodes the data-encoding byte of the identification prefix.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::UnsupportedEndianness] - The byte is neither 1 nor 2
    pub fn from_byte(value: u8) -> Result<Self, Error> {
        match value {
            1 => Ok(Self::Little),
            2 => Ok(Self::Big),
            value => Err(Error::UnsupportedEndianness(value)),
        }
    }
}

/// This enum represents the version of the ELF file. Only the current version (1) is valid.
#[repr(u8)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum ElfVersion {
    Current = 1,
}

impl ElfVersion {
    /// This function decodes the version byte of the identification prefix.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::UnsupportedVersion] - The byte is not 1
    pub fn from_byte(value: u8) -> Result<Self, Error> {
        match value {
            1 => Ok(Self::Current),
            value => Err(Error::UnsupportedVersion(value)),
        }
    }
}

/// This enum represents the ABI extensions of the ELF file. Values outside of the registered
/// range are preserved in the [ElfOsAbi::Unknown] variant.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum ElfOsAbi {
    /// No extensions or unspecified
    Unspecified,

    /// Hewlett-Packard HP-UX
    HP_UX,

    /// NetBSD
    NetBSD,

    /// GNU/Linux
    GNU,

    /// Sun Solaris
    Solaris,

    /// AIX
    AIX,

    /// IRIX
    Irix,

    /// FreeBSD
    FreeBSD,

    /// Compaq TRU64 UNIX
    Tru64,

    /// Novell Modesto
    Modesto,

    /// Open BSD
    OpenBSD,

    /// Open VMS
    OpenVMS,

    /// Hewlett-Packard Non-Stop Kernel
    NSK,

    /// Amiga Research OS
    AROS,

    /// The FenixOS highly scalable multi-core OS
    FenixOS,

    /// Nuxi CloudABI
    CloudABI,

    /// Stratus Technologies OpenVOS
    OpenVOS,

    /// Architecture- or vendor-specific value
    Unknown(u8),
}

impl From<u8> for ElfOsAbi {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Unspecified,
            0x01 => Self::HP_UX,
            0x02 => Self::NetBSD,
            0x03 => Self::GNU,
            0x06 => Self::Solaris,
            0x07 => Self::AIX,
            0x08 => Self::Irix,
            0x09 => Self::FreeBSD,
            0x0A => Self::Tru64,
            0x0B => Self::Modesto,
            0x0C => Self::OpenBSD,
            0x0D => Self::OpenVMS,
            0x0E => Self::NSK,
            0x0F => Self::AROS,
            0x10 => Self::FenixOS,
            0x11 => Self::CloudABI,
            0x12 => Self::OpenVOS,
            value => Self::Unknown(value),
        }
    }
}

/// This structure represents the decoded identification prefix of an ELF file. These bytes
/// indicate the class, endianness, version and OS ABI of the file. The class and endianness fully
/// determine the primitive widths for all subsequent parsing.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ElfIdent {
    /// This byte indicates the class of the ELF file. More details can be found in the [ElfClass]
    /// enum.
    pub class: ElfClass,

    /// This byte indicates the endianness of the ELF file. More details can be found in the
    /// [ElfEndian] enum.
    pub endian: ElfEndian,

    /// This byte indicates the version of the ELF file. More details can be found in the
    /// [ElfVersion] enum.
    pub version: ElfVersion,

    /// This byte indicates the ABI extensions of the ELF file. More details can be found in the
    /// [ElfOsAbi] enum.
    pub os_abi: ElfOsAbi,

    /// This byte indicates the ABI extensions version of the ELF file.
    pub abi_version: u8,
}

impl ElfIdent {
    /// This field contains the magic bytes of an ELF file.
    pub const MAGIC_BYTES: [u8; 4] = [0x7F, 0x45, 0x4C, 0x46];

    /// This field contains the size of the identification prefix including magic and padding.
    pub const SIZE: usize = 16;

    /// This function validates the magic bytes at the start of the specified slice and decodes
    /// the identification fields behind them.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - The slice is shorter than the 16 identification bytes
    /// - [Error::BadMagic] - The magic bytes of the file can't be found
    /// - [Error::UnsupportedClass] - The class byte is invalid
    /// - [Error::UnsupportedEndianness] - The data-encoding byte is invalid
    /// - [Error::UnsupportedVersion] - The version byte is not 1
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let ident = data.get(..Self::SIZE).ok_or(Error::Truncated {
            position: 0,
            wanted: Self::SIZE,
        })?;
        if ident[..4] != Self::MAGIC_BYTES {
            return Err(Error::BadMagic);
        }
        Ok(Self {
            class: ElfClass::from_byte(ident[4])?,
            endian: ElfEndian::from_byte(ident[5])?,
            version: ElfVersion::from_byte(ident[6])?,
            os_abi: ElfOsAbi::from(ident[7]),
            abi_version: ident[8],
        })
    }
}
