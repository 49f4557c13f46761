use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dwarf::abbrev::{AbbreviationTable, AttributeSpec};
use crate::dwarf::constants::{AttributeEncoding, AttributeForm, Tag};
use crate::header::ident::ElfEndian;
use crate::reader::Reader;
use crate::Error;

/// This enum represents one decoded attribute value: an unsigned integer, a signed integer, a
/// byte block, a null-terminated string or a reference carrying a DIE offset. Reference values
/// of CU-relative forms keep their raw (unadjusted) offset; the adjustment happens when the
/// reference is followed.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum AttributeValue {
    Unsigned(u64),
    Signed(i64),
    Bytes(Vec<u8>),
    Text(String),
    Reference(u64),
}

impl AttributeValue {
    /// This function returns the value as an unsigned integer where that makes sense.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(value) | Self::Reference(value) => Some(*value),
            Self::Signed(value) => Some(*value as u64),
            _ => None,
        }
    }

    /// This function returns the value as a string slice where the value holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// This structure represents one attribute of a DIE. The original form is preserved next to the
/// value: reference-form values need the CU-relative offset correction at lookup time, and only
/// the form tells whether that applies.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct DieAttribute {
    pub encoding: AttributeEncoding,
    pub form: AttributeForm,
    pub value: AttributeValue,
}

/// The index of a DIE inside of the arena of its [DebugInfo].
pub type DieId = usize;

/// This structure represents one debug information entry. DIEs live in an arena; parents and
/// children refer to each other by arena index, never by pointer, which keeps the tree
/// move-friendly and cycle-safe. The absolute file offset is the sort key and the reference
/// target, the CU start offset is the origin for relative reference forms.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Die {
    pub tag: Tag,
    pub offset: u64,
    pub cu_start: u64,
    pub attributes: Vec<DieAttribute>,
    pub children: Vec<DieId>,
    pub parent: Option<DieId>,
}

impl Die {
    /// This function returns the first attribute with the specified encoding.
    pub fn attribute(&self, encoding: AttributeEncoding) -> Option<&DieAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.encoding == encoding)
    }

    /// This function returns the name attribute of the DIE, if it carries one.
    pub fn name(&self) -> Option<&str> {
        self.attribute(AttributeEncoding::Name)
            .and_then(|attribute| attribute.value.as_text())
    }
}

/// This structure represents the header of one compilation unit of `.debug_info`. For version 5
/// units the unit type is parsed but otherwise unused by this library.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// This field holds the absolute section offset the unit starts at.
    pub offset: u64,

    /// This field holds the length of the unit, not counting the length field itself.
    pub unit_length: u32,

    /// This field holds the DWARF version of the unit.
    pub version: u16,

    /// This field holds the unit type of a version 5 unit.
    pub unit_type: Option<u8>,

    /// This field holds the CU-local offset into `.debug_abbrev`.
    pub abbrev_offset: u64,

    /// This field holds the size of a target address in this unit, 4 or 8 bytes.
    pub address_size: u8,

    /// This field holds the arena index of the unit's root DIE.
    pub root: Option<DieId>,
}

/// This structure holds the decoded `.debug_info` section: the compilation units, the DIE arena
/// and the offset index for reference resolution.
#[derive(Clone, Default, Debug)]
pub struct DebugInfo {
    pub units: Vec<CompilationUnit>,
    pub dies: Vec<Die>,
    by_offset: HashMap<u64, DieId>,
}

impl DebugInfo {
    /// This function returns the DIE with the specified arena index.
    #[inline]
    pub fn die(&self, id: DieId) -> &Die {
        &self.dies[id]
    }

    /// This function looks a DIE up by its absolute section offset.
    pub fn die_at_offset(&self, offset: u64) -> Option<&Die> {
        self.by_offset.get(&offset).map(|&id| &self.dies[id])
    }

    /// This function returns the arena index of the DIE at the specified offset.
    pub fn id_at_offset(&self, offset: u64) -> Option<DieId> {
        self.by_offset.get(&offset).copied()
    }

    /// This function rebuilds a decoded section from stored rows (the cache keeps units and
    /// DIEs; the offset index is derived).
    pub fn from_parts(units: Vec<CompilationUnit>, dies: Vec<Die>) -> Self {
        let by_offset = dies
            .iter()
            .enumerate()
            .map(|(id, die)| (die.offset, id))
            .collect();
        Self {
            units,
            dies,
            by_offset,
        }
    }

    /// This function appends a DIE to the arena, indexes it by its offset and attaches it to
    /// its parent's child list.
    pub fn push_die(&mut self, die: Die) -> DieId {
        let id = self.dies.len();
        self.by_offset.insert(die.offset, id);
        let parent = die.parent;
        self.dies.push(die);
        if let Some(parent) = parent {
            self.dies[parent].children.push(id);
        }
        id
    }
}

/// This structure walks `.debug_info` and builds the DIE arena. Decoding is a single forward
/// scan per compilation unit; a stack of arena indices tracks the current hierarchical depth.
pub struct DieDecoder<'a> {
    info: &'a [u8],
    strings: &'a [u8],
    line_strings: &'a [u8],
    endian: ElfEndian,
}

impl<'a> DieDecoder<'a> {
    /// This function creates a decoder over the specified `.debug_info` image and the string
    /// sections referenced by `strp`/`line_strp` forms.
    pub fn new(
        info: &'a [u8],
        strings: &'a [u8],
        line_strings: &'a [u8],
        endian: ElfEndian,
    ) -> Self {
        Self {
            info,
            strings,
            line_strings,
            endian,
        }
    }

    /// This function decodes every compilation unit of the section.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - A unit or attribute payload is cut short
    /// - [Error::UnknownForm] - An attribute definition uses a form this library cannot decode
    /// - [Error::UnknownAbbrev] - A DIE names an abbreviation code without definition
    /// - [Error::Unsupported] - The unit announces the 64-bit DWARF format
    pub fn parse(&self, abbrevs: &mut AbbreviationTable) -> Result<DebugInfo, Error> {
        let mut result = DebugInfo::default();
        let mut reader = Reader::new(self.info, self.endian);

        while reader.remaining() > 4 {
            let unit = self.parse_unit(&mut reader, abbrevs, &mut result)?;
            result.units.push(unit);
        }
        Ok(result)
    }

    fn parse_unit(
        &self,
        reader: &mut Reader<'a>,
        abbrevs: &mut AbbreviationTable,
        result: &mut DebugInfo,
    ) -> Result<CompilationUnit, Error> {
        let cu_start = reader.position() as u64;
        let unit_length = reader.read_u32()?;
        if unit_length == 0xFFFF_FFFF {
            return Err(Error::Unsupported("64-bit DWARF unit length"));
        }
        let version = reader.read_u16()?;
        let (unit_type, abbrev_offset, address_size) = if version >= 5 {
            let unit_type = reader.read_u8()?;
            let address_size = reader.read_u8()?;
            let abbrev_offset = reader.read_u32()? as u64;
            (Some(unit_type), abbrev_offset, address_size)
        } else {
            let abbrev_offset = reader.read_u32()? as u64;
            let address_size = reader.read_u8()?;
            (None, abbrev_offset, address_size)
        };
        let unit_end = (cu_start + 4 + unit_length as u64) as usize;
        tracing::trace!(cu_start, version, address_size, "decoding compilation unit");

        let mut unit = CompilationUnit {
            offset: cu_start,
            unit_length,
            version,
            unit_type,
            abbrev_offset,
            address_size,
            root: None,
        };

        let mut stack: Vec<DieId> = Vec::new();
        while reader.position() < unit_end && reader.position() < self.info.len() {
            let die_offset = reader.position() as u64;
            let (code, _) = reader.read_uleb()?;
            if code == 0 {
                // The null DIE closes the innermost open child list.
                stack.pop();
                continue;
            }
            let abbrev = abbrevs.get(abbrev_offset, code)?;
            let parent = stack.last().copied();
            let id = result.push_die(Die {
                tag: abbrev.tag,
                offset: die_offset,
                cu_start,
                attributes: Vec::with_capacity(abbrev.attributes.len()),
                children: Vec::new(),
                parent,
            });
            if parent.is_none() && unit.root.is_none() {
                unit.root = Some(id);
            }

            for spec in &abbrev.attributes {
                let value = self.read_form_value(reader, spec.form, spec, address_size)?;
                result.dies[id].attributes.push(DieAttribute {
                    encoding: spec.encoding,
                    form: spec.form,
                    value,
                });
            }
            if abbrev.has_children {
                stack.push(id);
            }
        }
        reader.seek(unit_end.min(self.info.len()));
        Ok(unit)
    }

    /// This function reads one attribute value of the specified form. `indirect` reads the real
    /// form from the stream first; a nested `indirect` is rejected to bound the recursion.
    fn read_form_value(
        &self,
        reader: &mut Reader<'a>,
        form: AttributeForm,
        spec: &AttributeSpec,
        address_size: u8,
    ) -> Result<AttributeValue, Error> {
        Ok(match form {
            AttributeForm::String => AttributeValue::Text(reader.read_cstring_utf8()?.0),
            AttributeForm::Strp => AttributeValue::Text(reader.read_strp(self.strings)?),
            AttributeForm::LineStrp => AttributeValue::Text(reader.read_strp(self.line_strings)?),
            AttributeForm::Udata => AttributeValue::Unsigned(reader.read_uleb()?.0),
            AttributeForm::Sdata => AttributeValue::Signed(reader.read_sleb()?.0),
            AttributeForm::Data1 => AttributeValue::Unsigned(reader.read_u8()? as u64),
            AttributeForm::Data2 => AttributeValue::Unsigned(reader.read_u16()? as u64),
            AttributeForm::Data4 => AttributeValue::Unsigned(reader.read_u32()? as u64),
            AttributeForm::Data8 => AttributeValue::Unsigned(reader.read_u64()?),
            AttributeForm::Addr => AttributeValue::Unsigned(reader.read_address(address_size)?),
            AttributeForm::Block => {
                let (length, _) = reader.read_uleb()?;
                AttributeValue::Bytes(reader.read_block(length as usize)?)
            }
            AttributeForm::Block1 => {
                let length = reader.read_u8()? as usize;
                AttributeValue::Bytes(reader.read_block(length)?)
            }
            AttributeForm::Block2 => {
                let length = reader.read_u16()? as usize;
                AttributeValue::Bytes(reader.read_block(length)?)
            }
            AttributeForm::Block4 => {
                let length = reader.read_u32()? as usize;
                AttributeValue::Bytes(reader.read_block(length)?)
            }
            AttributeForm::Flag => AttributeValue::Unsigned(reader.read_u8()? as u64),
            AttributeForm::FlagPresent => AttributeValue::Unsigned(1),
            AttributeForm::Ref1 => AttributeValue::Reference(reader.read_u8()? as u64),
            AttributeForm::Ref2 => AttributeValue::Reference(reader.read_u16()? as u64),
            AttributeForm::Ref4 => AttributeValue::Reference(reader.read_u32()? as u64),
            AttributeForm::Ref8 => AttributeValue::Reference(reader.read_u64()?),
            AttributeForm::RefUdata => AttributeValue::Reference(reader.read_uleb()?.0),
            AttributeForm::RefAddr => AttributeValue::Reference(reader.read_u32()? as u64),
            AttributeForm::RefSig8 => AttributeValue::Reference(reader.read_u64()?),
            AttributeForm::SecOffset => AttributeValue::Unsigned(reader.read_u32()? as u64),
            AttributeForm::Exprloc => {
                let (length, _) = reader.read_uleb()?;
                AttributeValue::Bytes(reader.read_block(length as usize)?)
            }
            AttributeForm::ImplicitConst => {
                AttributeValue::Signed(spec.implicit_const.unwrap_or_default())
            }
            AttributeForm::Indirect => {
                let (raw_form, _) = reader.read_uleb()?;
                let inner = AttributeForm::from(raw_form);
                if inner == AttributeForm::Indirect {
                    return Err(Error::UnknownForm(0x16));
                }
                self.read_form_value(reader, inner, spec, address_size)?
            }
            AttributeForm::Unknown(value) => return Err(Error::UnknownForm(value)),
        })
    }
}
