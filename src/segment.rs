use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::header::ident::{ElfClass, ElfIdent};
use crate::header::read_class_dependent;
use crate::reader::Reader;
use crate::section::{Section, SectionFlags, SectionType};
use crate::Error;

/// This enum contains all known types for segments in ELF files. These types are parsed by the
/// [ProgramSegment::read] function.
///
/// ## See also
/// - [Program Header](https://www.sco.com/developers/gabi/latest/ch5.pheader.html) by SCO, Inc.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum SegmentType {
    /// This type is unused. Other member values are undefined so we ignore that type in loading
    /// etc.
    #[default]
    Null,

    /// This type defines a loadable segment. The bytes in the file are mapped to the virtual
    /// address; if the memory size is larger than the file size, the extra bytes are filled
    /// with zeros.
    Load,

    /// This type defines a segment that contains dynamic linking information.
    Dynamic,

    /// This type defines the location and size of a null-terminated path name. This segment is
    /// only meaningful for executable files and shared objects.
    Interp,

    /// The array element specifies the location and size of auxiliary information.
    Note,

    /// This type is reserved but has unspecified semantics.
    ShLib,

    /// This type defines a segment that specifies the location and size of the program header
    /// table itself.
    Phdr,

    /// This type defines the thread-local storage template.
    Tls,

    GnuProperty,
    GnuEhFrame,
    GnuStack,
    GnuRelro,
    Unknown(u32),
}

impl From<u32> for SegmentType {
    fn from(value: u32) -> Self {
        match value {
            0x00000000 => Self::Null,
            0x00000001 => Self::Load,
            0x00000002 => Self::Dynamic,
            0x00000003 => Self::Interp,
            0x00000004 => Self::Note,
            0x00000005 => Self::ShLib,
            0x00000006 => Self::Phdr,
            0x00000007 => Self::Tls,
            0x6474E553 => Self::GnuProperty,
            0x6474E550 => Self::GnuEhFrame,
            0x6474E551 => Self::GnuStack,
            0x6474E552 => Self::GnuRelro,
            value => Self::Unknown(value),
        }
    }
}

bitflags! {
    /// This structure represents the access flags of a program segment.
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
    pub struct SegmentFlags: u32 {
        /// The content of the segment is executable
        const EXECUTABLE = 0x1;

        /// The content of the segment is writable
        const WRITABLE   = 0x2;

        /// The content of the segment is readable
        const READABLE   = 0x4;

        /// Reserved range for OS-specific semantics
        const MASKOS     = 0x0FF0_0000;

        /// Reserved range for processor-specific semantics
        const MASKPROC   = 0xF000_0000;
    }
}

/// This structure contains one program segment header of an ELF file: the type, the flags,
/// offset, virtual and physical address, file and memory size and alignment of the segment.
///
/// ## See also
/// - [Program Header](https://www.sco.com/developers/gabi/latest/ch5.pheader.html) by SCO, Inc.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Default, Serialize, Deserialize)]
pub struct ProgramSegment {
    /// This field represents the type of the segment. For more information, see [SegmentType].
    pub ty: SegmentType,

    /// This field represents the flags of the segment.
    pub flags: SegmentFlags,

    /// This field indicates the offset of the segment in the ELF data.
    pub offset: u64,

    /// This field indicates the virtual address of the first byte in the memory.
    pub virtual_address: u64,

    /// On systems for which physical addressing is relevant, this member is reserved for the
    /// segment's physical address.
    pub physical_address: u64,

    /// This field indicates the size of the segment in the ELF file.
    pub file_size: u64,

    /// This field indicates the size of the segment in the memory.
    pub memory_size: u64,

    /// This field indicates the alignment of the segment in the memory.
    pub alignment: u64,
}

impl ProgramSegment {
    /// This function reads a single program header. The position of the flags field depends on
    /// the class: 64-bit files carry it directly behind the type, 32-bit files behind the
    /// memory size.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - The header is cut short
    pub fn read(ident: &ElfIdent, data: &[u8], offset: usize) -> Result<Self, Error> {
        let mut reader = Reader::with_position(data, ident.endian, offset);
        let mut segment = Self::default();
        segment.ty = SegmentType::from(reader.read_u32()?);

        // Read segment flags if 64-bit ELF
        if ident.class == ElfClass::Class64 {
            segment.flags = SegmentFlags::from_bits_retain(reader.read_u32()?);
        }

        segment.offset = read_class_dependent!(ident.class, reader);
        segment.virtual_address = read_class_dependent!(ident.class, reader);
        segment.physical_address = read_class_dependent!(ident.class, reader);
        segment.file_size = read_class_dependent!(ident.class, reader);
        segment.memory_size = read_class_dependent!(ident.class, reader);

        // Read segment flags if 32-bit ELF
        if ident.class == ElfClass::Class32 {
            segment.flags = SegmentFlags::from_bits_retain(reader.read_u32()?);
        }

        segment.alignment = read_class_dependent!(ident.class, reader);
        Ok(segment)
    }
}

/// This function indicates whether the section is thread-local BSS inside of a segment other
/// than `PT_TLS`. Such a section occupies no file or memory bytes in that segment; its natural
/// size counts only towards the dedicated TLS segment.
pub fn tbss_special(section: &Section, segment: &ProgramSegment) -> bool {
    section.flags.contains(SectionFlags::TLS)
        && section.ty == SectionType::NoBits
        && segment.ty != SegmentType::Tls
}

/// This function returns the size the section contributes inside of the specified segment:
/// zero for thread-local BSS outside of `PT_TLS`, the natural section size everywhere else.
pub fn effective_size(section: &Section, segment: &ProgramSegment) -> u64 {
    if tbss_special(section, segment) {
        0
    } else {
        section.size
    }
}

/// This function decides whether a section belongs to a segment. Four independent checks must
/// all hold:
///
/// 1. Type compatibility: TLS sections only map into `PT_TLS`, `PT_GNU_RELRO` or `PT_LOAD`
///    segments; non-TLS sections never map into `PT_TLS` or `PT_PHDR`.
/// 2. File-offset containment, with `NOBITS` sections passing unconditionally.
/// 3. Virtual-address containment, checked only for `ALLOC` sections (and only when `check_vma`
///    is requested).
/// 4. `PT_DYNAMIC` well-formedness: an empty section inside of a non-empty dynamic segment must
///    lie strictly inside of it.
///
/// In strict mode the section must start inside of the segment, not at its end boundary.
pub fn section_in_segment1(
    section: &Section,
    segment: &ProgramSegment,
    check_vma: bool,
    strict: bool,
) -> bool {
    let size = effective_size(section, segment);
    let is_tls = section.flags.contains(SectionFlags::TLS);

    let valid_segment = (is_tls
        && matches!(
            segment.ty,
            SegmentType::Tls | SegmentType::GnuRelro | SegmentType::Load
        ))
        || (!is_tls && segment.ty != SegmentType::Tls && segment.ty != SegmentType::Phdr);

    let has_offset = section.ty == SectionType::NoBits
        || (section.offset >= segment.offset
            && (!strict
                || (segment.file_size > 0
                    && section.offset - segment.offset <= segment.file_size - 1))
            && (section.offset - segment.offset + size <= segment.file_size));

    let has_vma = !check_vma
        || !section.flags.contains(SectionFlags::ALLOC)
        || (section.address >= segment.virtual_address
            && (!strict
                || (segment.memory_size > 0
                    && section.address - segment.virtual_address <= segment.memory_size - 1))
            && (section.address - segment.virtual_address + size <= segment.memory_size));

    let has_dynamic_size = segment.ty != SegmentType::Dynamic
        || section.size != 0
        || segment.memory_size == 0
        || ((section.ty == SectionType::NoBits
            || (section.offset > segment.offset
                && section.offset - segment.offset < segment.file_size))
            && (!section.flags.contains(SectionFlags::ALLOC)
                || (section.address > segment.virtual_address
                    && section.address - segment.virtual_address < segment.memory_size)));

    valid_segment && has_offset && has_vma && has_dynamic_size
}

/// This function checks section-to-segment membership with the standard boundary rules.
#[inline]
pub fn section_in_segment(section: &Section, segment: &ProgramSegment) -> bool {
    section_in_segment1(section, segment, true, false)
}

/// This function checks section-to-segment membership with strict boundary rules: a section
/// starting exactly at the end of the segment is rejected.
#[inline]
pub fn section_in_segment_strict(section: &Section, segment: &ProgramSegment) -> bool {
    section_in_segment1(section, segment, true, true)
}

/// This function builds the section-to-segment mapping: for every segment, in program-header
/// order, the indices of the sections that belong to it.
pub fn section_to_segment_mapping(
    sections: &[Section],
    segments: &[ProgramSegment],
) -> Vec<Vec<usize>> {
    segments
        .iter()
        .map(|segment| {
            sections
                .iter()
                .filter(|section| section_in_segment(section, segment))
                .map(|section| section.index)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tbss_section() -> Section {
        Section {
            index: 1,
            name: ".tbss".to_string(),
            name_index: 0,
            ty: SectionType::NoBits,
            flags: SectionFlags::ALLOC | SectionFlags::WRITE | SectionFlags::TLS,
            address: 0x2000,
            offset: 0x1800,
            size: 0x40,
            link: 0,
            info: 0,
            alignment: 8,
            entry_size: 0,
            image: None,
        }
    }

    fn load_segment() -> ProgramSegment {
        ProgramSegment {
            ty: SegmentType::Load,
            flags: SegmentFlags::READABLE | SegmentFlags::WRITABLE,
            offset: 0x1000,
            virtual_address: 0x2000,
            physical_address: 0x2000,
            file_size: 0x1000,
            memory_size: 0x1000,
            alignment: 0x1000,
        }
    }

    fn tls_segment() -> ProgramSegment {
        ProgramSegment {
            ty: SegmentType::Tls,
            flags: SegmentFlags::READABLE,
            offset: 0x1800,
            virtual_address: 0x2000,
            physical_address: 0x2000,
            file_size: 0,
            memory_size: 0x40,
            alignment: 8,
        }
    }

    #[test]
    fn tbss_maps_into_both_load_and_tls_segments() {
        let section = tbss_section();
        assert!(section_in_segment(&section, &load_segment()));
        assert!(section_in_segment(&section, &tls_segment()));
    }

    #[test]
    fn tbss_contributes_zero_bytes_outside_of_its_tls_segment() {
        let section = tbss_section();
        assert_eq!(effective_size(&section, &load_segment()), 0);
        assert_eq!(effective_size(&section, &tls_segment()), 0x40);
    }

    #[test]
    fn non_tls_sections_never_map_into_tls_segments() {
        let mut section = tbss_section();
        section.flags = SectionFlags::ALLOC | SectionFlags::WRITE;
        section.ty = SectionType::ProgBits;
        section.offset = 0x1800;
        assert!(!section_in_segment(&section, &tls_segment()));
    }

    #[test]
    fn tls_sections_never_map_into_phdr_segments() {
        let section = tbss_section();
        let mut segment = load_segment();
        segment.ty = SegmentType::Phdr;
        assert!(!section_in_segment(&section, &segment));
    }

    #[test]
    fn strict_mode_rejects_sections_at_the_end_boundary() {
        let mut section = tbss_section();
        section.flags = SectionFlags::ALLOC;
        section.ty = SectionType::ProgBits;
        section.size = 0;
        section.offset = 0x2000;
        section.address = 0x3000;
        let segment = load_segment();
        assert!(section_in_segment(&section, &segment));
        assert!(!section_in_segment_strict(&section, &segment));
    }

    #[test]
    fn empty_sections_need_to_lie_strictly_inside_of_dynamic_segments() {
        let mut section = tbss_section();
        section.flags = SectionFlags::ALLOC;
        section.ty = SectionType::ProgBits;
        section.size = 0;
        section.offset = 0x1000;
        section.address = 0x2000;
        let mut segment = load_segment();
        segment.ty = SegmentType::Dynamic;
        // Starts exactly at the segment boundary, not strictly inside.
        assert!(!section_in_segment(&section, &segment));
        section.offset = 0x1100;
        section.address = 0x2100;
        assert!(section_in_segment(&section, &segment));
    }
}
