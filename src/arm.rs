use crate::header::ident::ElfEndian;
use crate::reader::Reader;
use crate::Error;

/// The representation of one attribute value in the sub-section stream.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum ParameterType {
    Ntbs,
    Uleb128,
    Uint32,
}

/// One entry of the EABI attribute tag table: the public tag name and the wire representation
/// of its value.
struct TagInfo {
    tag: u64,
    name: &'static str,
    parameter: ParameterType,
}

/// The registered EABI file-attribute tags. Const data shared across parser instances; tags not
/// listed here are preserved numerically.
const EABI_TAGS: &[TagInfo] = &[
    TagInfo { tag: 4, name: "Tag_CPU_raw_name", parameter: ParameterType::Ntbs },
    TagInfo { tag: 5, name: "Tag_CPU_name", parameter: ParameterType::Ntbs },
    TagInfo { tag: 6, name: "Tag_CPU_arch", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 7, name: "Tag_CPU_arch_profile", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 8, name: "Tag_ARM_ISA_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 9, name: "Tag_THUMB_ISA_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 10, name: "Tag_FP_arch", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 11, name: "Tag_WMMX_arch", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 12, name: "Tag_Advanced_SIMD_arch", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 13, name: "Tag_PCS_config", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 14, name: "Tag_ABI_PCS_R9_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 15, name: "Tag_ABI_PCS_RW_data", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 16, name: "Tag_ABI_PCS_RO_data", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 17, name: "Tag_ABI_PCS_GOT_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 18, name: "Tag_ABI_PCS_wchar_t", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 19, name: "Tag_ABI_FP_rounding", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 20, name: "Tag_ABI_FP_denormal", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 21, name: "Tag_ABI_FP_exceptions", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 22, name: "Tag_ABI_FP_user_exceptions", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 23, name: "Tag_ABI_FP_number_model", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 24, name: "Tag_ABI_align_needed", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 25, name: "Tag_ABI_align_preserved", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 26, name: "Tag_ABI_enum_size", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 27, name: "Tag_ABI_HardFP_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 28, name: "Tag_ABI_VFP_args", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 29, name: "Tag_ABI_WMMX_args", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 30, name: "Tag_ABI_optimization_goals", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 31, name: "Tag_ABI_FP_optimization_goals", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 32, name: "Tag_compatibility", parameter: ParameterType::Ntbs },
    TagInfo { tag: 34, name: "Tag_CPU_unaligned_access", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 36, name: "Tag_FP_HP_extension", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 38, name: "Tag_ABI_FP_16bit_format", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 42, name: "Tag_MPextension_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 44, name: "Tag_DIV_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 64, name: "Tag_nodefaults", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 65, name: "Tag_also_compatible_with", parameter: ParameterType::Ntbs },
    TagInfo { tag: 66, name: "Tag_T2EE_use", parameter: ParameterType::Uleb128 },
    TagInfo { tag: 67, name: "Tag_conformance", parameter: ParameterType::Ntbs },
    TagInfo { tag: 68, name: "Tag_Virtualization_use", parameter: ParameterType::Uleb128 },
];

fn tag_info(tag: u64) -> Option<&'static TagInfo> {
    EABI_TAGS.iter().find(|info| info.tag == tag)
}

/// This function describes the meaning of a handful of frequently inspected attribute values.
/// Tags without a registered description keep their numeric value only.
fn describe(tag: u64, value: &ArmAttributeValue) -> Option<String> {
    let number = match value {
        ArmAttributeValue::Number(number) => *number,
        ArmAttributeValue::Text(_) => return None,
    };
    let text = match tag {
        // Tag_CPU_arch
        6 => match number {
            0 => "Pre-v4",
            1 => "ARM v4",
            2 => "ARM v4T",
            3 => "ARM v5T",
            4 => "ARM v5TE",
            5 => "ARM v5TEJ",
            6 => "ARM v6",
            7 => "ARM v6KZ",
            8 => "ARM v6T2",
            9 => "ARM v6K",
            10 => "ARM v7",
            11 => "ARM v6-M",
            12 => "ARM v6S-M",
            13 => "ARM v7E-M",
            14 => "ARM v8",
            _ => return None,
        },
        // Tag_CPU_arch_profile
        7 => match number {
            0 => "Architecture profile is not applicable",
            0x41 => "The application profile 'A'",
            0x52 => "The real-time profile 'R'",
            0x4D => "The microcontroller profile 'M'",
            0x53 => "Application or real-time profile",
            _ => return None,
        },
        // Tag_ARM_ISA_use
        8 => match number {
            0 => "ARM instructions were not permitted to be used",
            1 => "ARM instructions were permitted to be used",
            _ => return None,
        },
        // Tag_THUMB_ISA_use
        9 => match number {
            0 => "Thumb instructions were not permitted to be used",
            1 => "16-bit Thumb instructions were permitted",
            2 => "Thumb2 instructions were permitted",
            _ => return None,
        },
        // Tag_FP_arch
        10 => match number {
            0 => "The user did not permit this entity to use instructions requiring FP hardware",
            1 => "VFPv1 instructions were permitted",
            2 => "VFPv2 instructions were permitted",
            3 => "VFPv3 instructions were permitted",
            4 => "VFPv3 instructions restricted to D0-D15 were permitted",
            5 => "VFPv4 instructions were permitted",
            6 => "VFPv4 instructions restricted to D0-D15 were permitted",
            _ => return None,
        },
        // Tag_ABI_enum_size
        26 => match number {
            0 => "The user prohibited the use of enums when building this entity",
            1 => "Enum values occupy the smallest container big enough to hold all values",
            2 => "Enum containers are 32-bit",
            3 => "Enum containers vary by use",
            _ => return None,
        },
        _ => return None,
    };
    Some(text.to_string())
}

/// This enum represents a decoded attribute value: either a null-terminated string or an
/// unsigned number (ULEB128 or `uint32` on the wire).
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ArmAttributeValue {
    Text(String),
    Number(u64),
}

/// This structure represents one decoded build attribute: the numeric tag, the registered tag
/// name (if any), the typed value and a human-readable description of the value for the
/// well-known tags.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ArmAttribute {
    pub tag: u64,
    pub name: Option<&'static str>,
    pub value: ArmAttributeValue,
    pub description: Option<String>,
}

/// This structure represents one vendor record of the `.ARM.attributes` section, e.g. the
/// `aeabi` record emitted by every EABI-conforming toolchain.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct VendorSection {
    pub vendor: String,
    pub attributes: Vec<ArmAttribute>,
}

/// This structure represents the decoded `.ARM.attributes` section: the format version and the
/// vendor records in file order.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ArmAttributes {
    pub version: u8,
    pub vendors: Vec<VendorSection>,
}

impl ArmAttributes {
    /// The only supported format version byte, ASCII `A`.
    pub const VERSION_A: u8 = 0x41;

    /// This function parses a complete `.ARM.attributes` section image.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - The image ends inside of a record
    /// - [Error::Unsupported] - The format version byte is not `A`
    pub fn parse(image: &[u8], endian: ElfEndian) -> Result<Self, Error> {
        let mut reader = Reader::new(image, endian);
        let version = reader.read_u8()?;
        if version != Self::VERSION_A {
            return Err(Error::Unsupported("ARM attributes format version"));
        }
        let mut vendors = Vec::new();
        while !reader.is_empty() {
            vendors.push(Self::parse_vendor(&mut reader)?);
        }
        Ok(Self { version, vendors })
    }

    /// One vendor record: total size (including the size field), vendor name, sub-sections.
    fn parse_vendor(reader: &mut Reader<'_>) -> Result<VendorSection, Error> {
        let record_start = reader.position();
        let size = reader.read_u32()? as usize;
        let (vendor, _) = reader.read_cstring_ascii()?;
        let record_end = record_start + size;

        let mut attributes = Vec::new();
        while reader.position() < record_end {
            Self::parse_subsection(reader, record_end, &mut attributes)?;
        }
        reader.seek(record_end);
        Ok(VendorSection { vendor, attributes })
    }

    /// One sub-section: a scope tag (file/section/symbol), the sub-section size, then the
    /// attribute stream. Only file scope carries attributes this library interprets; the other
    /// scopes are skipped whole.
    fn parse_subsection(
        reader: &mut Reader<'_>,
        record_end: usize,
        attributes: &mut Vec<ArmAttribute>,
    ) -> Result<(), Error> {
        const TAG_FILE: u8 = 1;

        let sub_start = reader.position();
        let scope = reader.read_u8()?;
        let size = reader.read_u32()? as usize;
        let sub_end = (sub_start + size).min(record_end);

        if scope != TAG_FILE {
            reader.seek(sub_end);
            return Ok(());
        }
        while reader.position() < sub_end {
            let (tag, _) = reader.read_uleb()?;
            let parameter = match tag_info(tag) {
                Some(info) => info.parameter,
                // Unregistered tags follow the EABI convention: from 32 upwards odd tags carry
                // strings, even tags carry ULEB128 values.
                None if tag >= 32 && tag % 2 == 1 => ParameterType::Ntbs,
                None => ParameterType::Uleb128,
            };
            let value = match parameter {
                ParameterType::Ntbs => ArmAttributeValue::Text(reader.read_cstring_ascii()?.0),
                ParameterType::Uleb128 => ArmAttributeValue::Number(reader.read_uleb()?.0),
                ParameterType::Uint32 => ArmAttributeValue::Number(reader.read_u32()? as u64),
            };
            let description = describe(tag, &value);
            attributes.push(ArmAttribute {
                tag,
                name: tag_info(tag).map(|info| info.name),
                value,
                description,
            });
        }
        reader.seek(sub_end);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assembles a minimal file-scope `aeabi` record.
    fn fixture() -> Vec<u8> {
        let mut attrs = Vec::new();
        attrs.push(5u8); // Tag_CPU_name
        attrs.extend_from_slice(b"8-A.32\0");
        attrs.push(6u8); // Tag_CPU_arch
        attrs.push(10u8); // ARM v7
        attrs.push(9u8); // Tag_THUMB_ISA_use
        attrs.push(2u8); // Thumb2

        let sub_size = 1 + 4 + attrs.len();
        let vendor = b"aeabi\0";
        let record_size = 4 + vendor.len() + sub_size;

        let mut image = vec![0x41]; // version 'A'
        image.extend_from_slice(&(record_size as u32).to_le_bytes());
        image.extend_from_slice(vendor);
        image.push(1); // file scope
        image.extend_from_slice(&(sub_size as u32).to_le_bytes());
        image.extend_from_slice(&attrs);
        image
    }

    #[test]
    fn parses_file_scope_attributes() {
        let decoded = ArmAttributes::parse(&fixture(), ElfEndian::Little).unwrap();
        assert_eq!(decoded.version, 0x41);
        assert_eq!(decoded.vendors.len(), 1);
        let vendor = &decoded.vendors[0];
        assert_eq!(vendor.vendor, "aeabi");
        assert_eq!(vendor.attributes.len(), 3);
        assert_eq!(vendor.attributes[0].name, Some("Tag_CPU_name"));
        assert_eq!(
            vendor.attributes[0].value,
            ArmAttributeValue::Text("8-A.32".to_string())
        );
        assert_eq!(vendor.attributes[1].value, ArmAttributeValue::Number(10));
        assert_eq!(vendor.attributes[1].description.as_deref(), Some("ARM v7"));
        assert_eq!(vendor.attributes[2].description.as_deref(), Some("Thumb2 instructions were permitted"));
    }

    #[test]
    fn rejects_unknown_format_versions() {
        assert!(matches!(
            ArmAttributes::parse(&[0x42], ElfEndian::Little),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn unknown_tags_are_preserved_numerically() {
        let mut attrs = Vec::new();
        attrs.push(96u8); // unregistered even tag: ULEB value
        attrs.push(1u8);
        let sub_size = 1 + 4 + attrs.len();
        let vendor = b"aeabi\0";
        let record_size = 4 + vendor.len() + sub_size;
        let mut image = vec![0x41];
        image.extend_from_slice(&(record_size as u32).to_le_bytes());
        image.extend_from_slice(vendor);
        image.push(1);
        image.extend_from_slice(&(sub_size as u32).to_le_bytes());
        image.extend_from_slice(&attrs);

        let decoded = ArmAttributes::parse(&image, ElfEndian::Little).unwrap();
        let attribute = &decoded.vendors[0].attributes[0];
        assert_eq!(attribute.tag, 96);
        assert_eq!(attribute.name, None);
        assert_eq!(attribute.value, ArmAttributeValue::Number(1));
    }
}
