use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dwarf::constants::{encoding_repr, AttributeEncoding};
use crate::dwarf::die::{AttributeValue, DebugInfo, Die, DieAttribute};
use crate::dwarf::expr::Expression;
use crate::header::ident::ElfEndian;

/// Attributes that describe where a declaration lives rather than what the type is; they are
/// dropped from resolved type records.
const STOP_LIST: &[AttributeEncoding] = &[
    AttributeEncoding::Sibling,
    AttributeEncoding::DeclFile,
    AttributeEncoding::DeclLine,
    AttributeEncoding::DeclColumn,
    AttributeEncoding::Declaration,
    AttributeEncoding::Specification,
    AttributeEncoding::AbstractOrigin,
];

/// Attributes whose payload is a DWARF expression; they render through the describe mode of the
/// expression machine.
const EXPRESSION_ATTRIBUTES: &[AttributeEncoding] = &[
    AttributeEncoding::Location,
    AttributeEncoding::DataMemberLocation,
    AttributeEncoding::FrameBase,
    AttributeEncoding::ReturnAddr,
];

/// This enum represents one attribute value of a resolved type record.
#[derive(Clone, PartialEq, Debug)]
pub enum TypeValue {
    Unsigned(u64),
    Signed(i64),
    Text(String),
    Bytes(Vec<u8>),

    /// The named enumerator of an enumerated attribute encoding (language, base-type encoding,
    /// virtuality and friends).
    Named(&'static str),

    /// A rendered DWARF expression (location-like attributes).
    Expression(String),

    /// A nested type reference, resolved recursively.
    Type(Rc<TypeNode>),
}

/// This structure represents one resolved type record: the tag name, the non-structural
/// attributes keyed by their encoding name, and the relevant children (members, enumerators,
/// subranges and the like).
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TypeRecord {
    pub tag: String,
    pub attributes: IndexMap<String, TypeValue>,
    pub children: Vec<TypeRecord>,
}

/// This enum represents the result of resolving a type reference: a full record, a marker for a
/// reference that is already being resolved further up the call chain, or a marker for an
/// offset with no DIE behind it.
#[derive(Clone, PartialEq, Debug)]
pub enum TypeNode {
    Record(TypeRecord),
    CircularReference { tag: String, name: String },
    Missing,
}

/// This structure is the stateful walker over a DIE tree. It memoises fully resolved type
/// records by absolute DIE offset and guards against reference cycles with a stack of offsets
/// currently being resolved. Both caches are per instance; the DIE arena they index is specific
/// to one parsed file.
pub struct TypeResolver<'a> {
    info: &'a DebugInfo,
    endian: ElfEndian,
    parsed_types: HashMap<u64, Rc<TypeNode>>,
    type_stack: HashSet<u64>,
}

impl<'a> TypeResolver<'a> {
    /// This function creates a resolver over the specified decoded debug information.
    pub fn new(info: &'a DebugInfo, endian: ElfEndian) -> Self {
        Self {
            info,
            endian,
            parsed_types: HashMap::new(),
            type_stack: HashSet::new(),
        }
    }

    /// This function resolves the type DIE at the specified absolute offset into a type record.
    /// Results are memoised, so a second call for the same offset returns the identical record.
    /// A self-referential type terminates with [TypeNode::CircularReference]; an offset without
    /// DIE yields [TypeNode::Missing].
    pub fn resolve_type(&mut self, offset: u64) -> Rc<TypeNode> {
        if self.type_stack.contains(&offset) {
            let (tag, name) = match self.info.die_at_offset(offset) {
                Some(die) => (die.tag.name(), die.name().unwrap_or("").to_string()),
                None => (String::new(), String::new()),
            };
            return Rc::new(TypeNode::CircularReference { tag, name });
        }
        if let Some(record) = self.parsed_types.get(&offset) {
            return Rc::clone(record);
        }
        let info = self.info;
        let Some(die) = info.die_at_offset(offset) else {
            return Rc::new(TypeNode::Missing);
        };

        self.type_stack.insert(offset);
        let mut record = TypeRecord {
            tag: die.tag.name(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        };
        self.parse_attributes(die, &mut record);
        for &child_id in &die.children {
            let child = info.die(child_id);
            let mut child_record = TypeRecord {
                tag: child.tag.name(),
                attributes: IndexMap::new(),
                children: Vec::new(),
            };
            self.parse_attributes(child, &mut child_record);
            record.children.push(child_record);
        }
        let node = Rc::new(TypeNode::Record(record));
        self.parsed_types.insert(offset, Rc::clone(&node));
        self.type_stack.remove(&offset);
        node
    }

    /// Copies the non-structural attributes of one DIE into the record, resolving nested type
    /// references, converting enumerated encodings to their names and rendering expression
    /// payloads.
    fn parse_attributes(&mut self, die: &Die, record: &mut TypeRecord) {
        let attributes: Vec<DieAttribute> = die.attributes.clone();
        for attribute in attributes {
            if STOP_LIST.contains(&attribute.encoding) {
                continue;
            }
            let key = attribute.encoding.name();
            if attribute.encoding == AttributeEncoding::Type {
                if let Some(target) = self.reference_target(die, &attribute) {
                    if target != die.offset {
                        let nested = self.resolve_type(target);
                        record.attributes.insert(key, TypeValue::Type(nested));
                        continue;
                    }
                }
            }
            if EXPRESSION_ATTRIBUTES.contains(&attribute.encoding) {
                if let AttributeValue::Bytes(bytes) = &attribute.value {
                    let address_size = self.address_size_of(die);
                    let expression = Expression::new(bytes, self.endian, address_size);
                    if let Ok(text) = expression.describe() {
                        record.attributes.insert(key, TypeValue::Expression(text));
                        continue;
                    }
                }
            }
            if let Some(number) = attribute.value.as_u64() {
                if let Some(named) = encoding_repr(attribute.encoding, number) {
                    record.attributes.insert(key, TypeValue::Named(named));
                    continue;
                }
            }
            let value = match attribute.value {
                AttributeValue::Unsigned(value) | AttributeValue::Reference(value) => {
                    TypeValue::Unsigned(value)
                }
                AttributeValue::Signed(value) => TypeValue::Signed(value),
                AttributeValue::Text(text) => TypeValue::Text(text),
                AttributeValue::Bytes(bytes) => TypeValue::Bytes(bytes),
            };
            record.attributes.insert(key, value);
        }
    }

    /// This function resolves a reference attribute to an absolute DIE offset, applying the
    /// CU-relative adjustment for the `ref1`/`ref2`/`ref4`/`ref8`/`ref_udata` forms. The form
    /// was retained on the attribute exactly for this correction.
    pub fn reference_target(&self, die: &Die, attribute: &DieAttribute) -> Option<u64> {
        let raw = attribute.value.as_u64()?;
        if attribute.form.is_cu_relative() {
            Some(raw + die.cu_start)
        } else {
            Some(raw)
        }
    }

    fn address_size_of(&self, die: &Die) -> u8 {
        self.info
            .units
            .iter()
            .find(|unit| unit.offset == die.cu_start)
            .map(|unit| unit.address_size)
            .unwrap_or(4)
    }

    /// This function renders the sub-tree below the specified DIE as indented text, one line
    /// per entry: the tag, the name, rendered location payloads and the absolute offset.
    /// Intended for inspection and debugging output.
    pub fn render_tree(&mut self, id: crate::dwarf::die::DieId) -> String {
        let mut out = String::new();
        self.render_die(id, 0, &mut out);
        out
    }

    fn render_die(&mut self, id: crate::dwarf::die::DieId, level: usize, out: &mut String) {
        use std::fmt::Write;

        let info = self.info;
        let die = info.die(id);
        let indent = "    ".repeat(level);
        let name = die.name().unwrap_or("");
        let _ = write!(out, "{indent}{} '{name}'", die.tag.name());
        for encoding in [AttributeEncoding::Location, AttributeEncoding::DataMemberLocation] {
            let Some(attribute) = die.attribute(encoding) else {
                continue;
            };
            if let AttributeValue::Bytes(bytes) = &attribute.value {
                let expression = Expression::new(bytes, self.endian, self.address_size_of(die));
                if let Ok(text) = expression.describe() {
                    let _ = write!(out, " [location={text}]");
                }
            }
        }
        let _ = writeln!(out, " [off=0x{:08x}]", die.offset);
        for &child in &die.children {
            self.render_die(child, level + 1, out);
        }
    }
}

/// This structure summarises one compilation unit through the attributes of its root DIE: the
/// source name, the producer and the language, next to the header facts a listing needs.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CompilationUnitSummary {
    pub offset: u64,
    pub version: u16,
    pub address_size: u8,
    pub name: String,
    pub producer: String,
    pub language: String,
}

/// This function summarises every compilation unit of the decoded debug information. Units
/// without a root DIE (or without the usual attributes) yield empty strings for the missing
/// parts.
pub fn compile_units_summary(info: &DebugInfo) -> Vec<CompilationUnitSummary> {
    info.units
        .iter()
        .map(|unit| {
            let root = unit.root.map(|id| info.die(id));
            let text_of = |encoding: AttributeEncoding| {
                root.and_then(|die| die.attribute(encoding))
                    .and_then(|attribute| attribute.value.as_text())
                    .unwrap_or("")
                    .to_string()
            };
            let language = root
                .and_then(|die| die.attribute(AttributeEncoding::Language))
                .and_then(|attribute| attribute.value.as_u64())
                .and_then(|value| encoding_repr(AttributeEncoding::Language, value))
                .unwrap_or("")
                .to_string();
            CompilationUnitSummary {
                offset: unit.offset,
                version: unit.version,
                address_size: unit.address_size,
                name: text_of(AttributeEncoding::Name),
                producer: text_of(AttributeEncoding::Producer),
                language,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwarf::constants::{AttributeForm, Tag};

    /// Builds a DebugInfo arena by hand: a base type, a pointer chain that loops back onto
    /// itself, a struct with one member carrying a data_member_location expression, and a
    /// variable typed through a CU-relative ref4.
    fn fixture() -> DebugInfo {
        let mut info = DebugInfo::default();
        info.units.push(crate::dwarf::die::CompilationUnit {
            offset: 0x1000,
            unit_length: 0x400,
            version: 4,
            unit_type: None,
            abbrev_offset: 0,
            address_size: 4,
            root: Some(0),
        });

        // 0: compile unit root at 0x100b
        info.push_die(Die {
            tag: Tag::CompileUnit,
            offset: 0x100B,
            cu_start: 0x1000,
            attributes: vec![DieAttribute {
                encoding: AttributeEncoding::Language,
                form: AttributeForm::Data1,
                value: AttributeValue::Unsigned(0x0C),
            }],
            children: vec![],
            parent: None,
        });
        // 1: base type "int" at 0x1040
        info.push_die(Die {
            tag: Tag::BaseType,
            offset: 0x1040,
            cu_start: 0x1000,
            attributes: vec![
                DieAttribute {
                    encoding: AttributeEncoding::Name,
                    form: AttributeForm::String,
                    value: AttributeValue::Text("int".to_string()),
                },
                DieAttribute {
                    encoding: AttributeEncoding::Encoding,
                    form: AttributeForm::Data1,
                    value: AttributeValue::Unsigned(0x05),
                },
                DieAttribute {
                    encoding: AttributeEncoding::ByteSize,
                    form: AttributeForm::Data1,
                    value: AttributeValue::Unsigned(4),
                },
            ],
            children: vec![],
            parent: Some(0),
        });
        // 2: struct "node" at 0x1060 with one member "next" at 0x1068
        info.push_die(Die {
            tag: Tag::StructureType,
            offset: 0x1060,
            cu_start: 0x1000,
            attributes: vec![DieAttribute {
                encoding: AttributeEncoding::Name,
                form: AttributeForm::String,
                value: AttributeValue::Text("node".to_string()),
            }],
            children: vec![],
            parent: Some(0),
        });
        info.push_die(Die {
            tag: Tag::Member,
            offset: 0x1068,
            cu_start: 0x1000,
            attributes: vec![
                DieAttribute {
                    encoding: AttributeEncoding::Name,
                    form: AttributeForm::String,
                    value: AttributeValue::Text("next".to_string()),
                },
                DieAttribute {
                    // Points back at the struct: a cycle once the member is resolved.
                    encoding: AttributeEncoding::Type,
                    form: AttributeForm::Ref4,
                    value: AttributeValue::Reference(0x60),
                },
                DieAttribute {
                    encoding: AttributeEncoding::DataMemberLocation,
                    form: AttributeForm::Block1,
                    value: AttributeValue::Bytes(vec![0x23, 0x10]),
                },
            ],
            children: vec![],
            parent: Some(2),
        });
        // 4: variable "counter" at 0x1080 typed via CU-relative ref4 0x40
        info.push_die(Die {
            tag: Tag::Variable,
            offset: 0x1080,
            cu_start: 0x1000,
            attributes: vec![
                DieAttribute {
                    encoding: AttributeEncoding::Name,
                    form: AttributeForm::String,
                    value: AttributeValue::Text("counter".to_string()),
                },
                DieAttribute {
                    encoding: AttributeEncoding::Type,
                    form: AttributeForm::Ref4,
                    value: AttributeValue::Reference(0x40),
                },
                DieAttribute {
                    encoding: AttributeEncoding::DeclFile,
                    form: AttributeForm::Data1,
                    value: AttributeValue::Unsigned(1),
                },
            ],
            children: vec![],
            parent: Some(0),
        });
        info
    }

    #[test]
    fn cu_relative_references_are_adjusted_when_followed() {
        let info = fixture();
        let resolver = TypeResolver::new(&info, ElfEndian::Little);
        let variable = info.die_at_offset(0x1080).unwrap();
        let attribute = variable.attribute(AttributeEncoding::Type).unwrap();
        assert_eq!(resolver.reference_target(variable, attribute), Some(0x1040));

        // ref_addr values are absolute and stay untouched.
        let absolute = DieAttribute {
            encoding: AttributeEncoding::Type,
            form: AttributeForm::RefAddr,
            value: AttributeValue::Reference(0x40),
        };
        assert_eq!(resolver.reference_target(variable, &absolute), Some(0x40));
    }

    #[test]
    fn resolve_type_builds_records_with_named_enumerators() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        let node = resolver.resolve_type(0x1040);
        let TypeNode::Record(record) = node.as_ref() else {
            panic!("expected a record");
        };
        assert_eq!(record.tag, "base_type");
        assert_eq!(record.attributes.get("name"), Some(&TypeValue::Text("int".to_string())));
        assert_eq!(record.attributes.get("encoding"), Some(&TypeValue::Named("signed")));
        assert_eq!(record.attributes.get("byte_size"), Some(&TypeValue::Unsigned(4)));
    }

    #[test]
    fn structural_attributes_are_dropped() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        let node = resolver.resolve_type(0x1080);
        let TypeNode::Record(record) = node.as_ref() else {
            panic!("expected a record");
        };
        assert!(record.attributes.get("decl_file").is_none());
        assert!(matches!(record.attributes.get("type"), Some(TypeValue::Type(_))));
    }

    #[test]
    fn member_location_expressions_render_through_describe() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        let node = resolver.resolve_type(0x1060);
        let TypeNode::Record(record) = node.as_ref() else {
            panic!("expected a record");
        };
        assert_eq!(record.children.len(), 1);
        let member = &record.children[0];
        assert_eq!(member.tag, "member");
        assert_eq!(
            member.attributes.get("data_member_location"),
            Some(&TypeValue::Expression("plus_uconst(0x10)".to_string()))
        );
    }

    #[test]
    fn self_referential_types_terminate_with_a_cycle_marker() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        let node = resolver.resolve_type(0x1060);
        let TypeNode::Record(record) = node.as_ref() else {
            panic!("expected a record");
        };
        let member = &record.children[0];
        match member.attributes.get("type") {
            Some(TypeValue::Type(nested)) => match nested.as_ref() {
                TypeNode::CircularReference { tag, name } => {
                    assert_eq!(tag, "structure_type");
                    assert_eq!(name, "node");
                }
                other => panic!("expected a cycle marker, got {other:?}"),
            },
            other => panic!("expected a nested type, got {other:?}"),
        }
    }

    #[test]
    fn resolve_type_is_idempotent_and_memoised() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        let first = resolver.resolve_type(0x1040);
        let second = resolver.resolve_type(0x1040);
        assert_eq!(first, second);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_offsets_yield_the_missing_marker() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        assert_eq!(*resolver.resolve_type(0xDEAD), TypeNode::Missing);
    }

    #[test]
    fn tree_rendering_is_indented_and_shows_offsets_and_locations() {
        let info = fixture();
        let mut resolver = TypeResolver::new(&info, ElfEndian::Little);
        let rendered = resolver.render_tree(0);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "compile_unit '' [off=0x0000100b]");
        assert!(lines.contains(&"    base_type 'int' [off=0x00001040]"));
        assert!(lines.contains(
            &"        member 'next' [location=plus_uconst(0x10)] [off=0x00001068]"
        ));
    }

    #[test]
    fn compile_units_summarise_through_their_root_die() {
        let info = fixture();
        let summaries = compile_units_summary(&info);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].offset, 0x1000);
        assert_eq!(summaries[0].version, 4);
        assert_eq!(summaries[0].address_size, 4);
        assert_eq!(summaries[0].language, "C99");
        assert_eq!(summaries[0].name, "");
        assert_eq!(summaries[0].producer, "");
    }
}
