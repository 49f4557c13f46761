use std::collections::HashMap;
use std::rc::Rc;

use crate::dwarf::constants::{AttributeEncoding, AttributeForm, Tag};
use crate::header::ident::ElfEndian;
use crate::reader::Reader;
use crate::Error;

/// This structure represents one attribute definition of an abbreviation: the semantic encoding,
/// the wire form and, only for `DW_FORM_implicit_const`, the constant that stands in for the
/// value in the instruction stream.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct AttributeSpec {
    pub encoding: AttributeEncoding,
    pub form: AttributeForm,
    pub implicit_const: Option<i64>,
}

/// This structure represents one abbreviation: the schema that maps a per-CU code to a tag, a
/// has-children flag and an ordered attribute list, enabling the compact DIE encoding of
/// `.debug_info`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Abbreviation {
    pub code: u64,
    pub tag: Tag,
    pub has_children: bool,
    pub attributes: Vec<AttributeSpec>,
}

/// This structure is the lazily parsed abbreviation table over a `.debug_abbrev` image. Entries
/// are cached by `(table offset, code)`; a lookup parses forward from the requested offset until
/// the code is found or the section ends. Unknown tag and form numbers are preserved as
/// integers, they are not a parse error here.
pub struct AbbreviationTable {
    image: Vec<u8>,
    entries: HashMap<(u64, u64), Rc<Abbreviation>>,
}

impl AbbreviationTable {
    /// This function creates a table over the specified `.debug_abbrev` image.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            entries: HashMap::new(),
        }
    }

    /// This function returns the abbreviation with the specified code, parsed relative to the
    /// CU-local table offset. Entries already seen are served from the cache.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::UnknownAbbrev] - No entry with this code exists before the section ends
    /// - [Error::Truncated] - The table is cut short in the middle of an entry
    pub fn get(&mut self, table_offset: u64, code: u64) -> Result<Rc<Abbreviation>, Error> {
        if code == 0 {
            return Err(Error::UnknownAbbrev(0));
        }
        if let Some(entry) = self.entries.get(&(table_offset, code)) {
            return Ok(Rc::clone(entry));
        }
        self.fetch(table_offset, code)
    }

    /// Parses entries starting at the table offset, caching everything encountered, until the
    /// requested code shows up.
    fn fetch(&mut self, table_offset: u64, code: u64) -> Result<Rc<Abbreviation>, Error> {
        // The abbreviation table is LEB-coded throughout, so the byte order never matters here.
        let image = std::mem::take(&mut self.image);
        let mut reader = Reader::with_position(&image, ElfEndian::Little, table_offset as usize);
        let result = self.fetch_inner(&mut reader, table_offset, code);
        self.image = image;
        result
    }

    fn fetch_inner(
        &mut self,
        reader: &mut Reader<'_>,
        table_offset: u64,
        wanted: u64,
    ) -> Result<Rc<Abbreviation>, Error> {
        loop {
            if reader.is_empty() {
                return Err(Error::UnknownAbbrev(wanted));
            }
            let (code, _) = reader.read_uleb()?;
            if code == 0 {
                // A zero entry terminates one CU's table; the next table may follow directly.
                continue;
            }
            let (tag, _) = reader.read_uleb()?;
            let has_children = reader.read_u8()? == 1;

            let mut attributes = Vec::new();
            loop {
                let (encoding, _) = reader.read_uleb()?;
                let (form, _) = reader.read_uleb()?;
                if encoding == 0 && form == 0 {
                    break;
                }
                let form = AttributeForm::from(form);
                let implicit_const = if form == AttributeForm::ImplicitConst {
                    Some(reader.read_sleb()?.0)
                } else {
                    None
                };
                attributes.push(AttributeSpec {
                    encoding: AttributeEncoding::from(encoding),
                    form,
                    implicit_const,
                });
            }

            let entry = Rc::new(Abbreviation {
                code,
                tag: Tag::from(tag),
                has_children,
                attributes,
            });
            self.entries
                .insert((table_offset, code), Rc::clone(&entry));
            if code == wanted {
                return Ok(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::encode_sleb;

    /// A table with two entries: a compile unit with name/implicit-const attributes and a
    /// childless base type.
    fn fixture() -> Vec<u8> {
        let mut image = Vec::new();
        // Code 1: DW_TAG_compile_unit, has children.
        image.extend_from_slice(&[0x01, 0x11, 0x01]);
        image.extend_from_slice(&[0x03, 0x08]); // name, string
        image.extend_from_slice(&[0x13, 0x21]); // language, implicit_const
        image.extend_from_slice(&encode_sleb(0x1C));
        image.extend_from_slice(&[0x00, 0x00]);
        // Code 2: DW_TAG_base_type, no children.
        image.extend_from_slice(&[0x02, 0x24, 0x00]);
        image.extend_from_slice(&[0x03, 0x08]); // name, string
        image.extend_from_slice(&[0x0B, 0x0B]); // byte_size, data1
        image.extend_from_slice(&[0x00, 0x00]);
        // Table terminator.
        image.push(0x00);
        image
    }

    #[test]
    fn entries_are_parsed_on_demand_and_cached() {
        let mut table = AbbreviationTable::new(fixture());
        let base_type = table.get(0, 2).unwrap();
        assert_eq!(base_type.tag, Tag::BaseType);
        assert!(!base_type.has_children);
        assert_eq!(base_type.attributes.len(), 2);

        // The scan to code 2 already cached code 1.
        assert!(table.entries.contains_key(&(0, 1)));
        let compile_unit = table.get(0, 1).unwrap();
        assert_eq!(compile_unit.tag, Tag::CompileUnit);
        assert!(compile_unit.has_children);
    }

    #[test]
    fn implicit_const_values_are_stored_with_the_attribute() {
        let mut table = AbbreviationTable::new(fixture());
        let compile_unit = table.get(0, 1).unwrap();
        let language = &compile_unit.attributes[1];
        assert_eq!(language.form, AttributeForm::ImplicitConst);
        assert_eq!(language.implicit_const, Some(0x1C));
    }

    #[test]
    fn missing_codes_surface_the_numeric_value() {
        let mut table = AbbreviationTable::new(fixture());
        assert!(matches!(table.get(0, 9), Err(Error::UnknownAbbrev(9))));
        assert!(matches!(table.get(0, 0), Err(Error::UnknownAbbrev(0))));
    }

    #[test]
    fn unknown_tags_and_forms_are_preserved_as_integers() {
        let mut image = Vec::new();
        image.extend_from_slice(&[0x01]); // code 1
        image.extend_from_slice(&[0xFF, 0x7E]); // tag 0x3F7F (unregistered)
        image.push(0x00); // no children
        image.extend_from_slice(&[0x03]); // name
        image.extend_from_slice(&[0x7D]); // form 0x7D (unregistered)
        image.extend_from_slice(&[0x00, 0x00]);
        image.push(0x00);

        let mut table = AbbreviationTable::new(image);
        let entry = table.get(0, 1).unwrap();
        assert_eq!(entry.tag, Tag::Unknown(0x3F7F));
        assert_eq!(entry.attributes[0].form, AttributeForm::Unknown(0x7D));
    }
}
