use anyhow::Result;

use crate::dwarf::traverse::{TypeNode, TypeResolver, TypeValue};
use crate::dwarf::DwarfProcessor;
use crate::header::ident::{ElfClass, ElfEndian, ElfOsAbi, ElfVersion};
use crate::header::{FileType, TargetMachine};
use crate::query::{SectionFilter, SectionOrder, SymbolFilter};
use crate::section::SectionType;
use crate::symbol::{SectionIndex, SymbolBinding, SymbolType};
use crate::{cache, Error};
use crate::{segment, ElfParser};


use fixtures::{TestSection, TestSegment};

/// The standard fixture: a little-endian x86-64 executable with text, data, BSS, a comment, a
/// build-id note and a populated symbol table.
fn sample_elf() -> Vec<u8> {
    let mut note = Vec::new();
    note.extend_from_slice(&4u32.to_le_bytes()); // namesz ("GNU\0")
    note.extend_from_slice(&8u32.to_le_bytes()); // descsz
    note.extend_from_slice(&3u32.to_le_bytes()); // NT_GNU_BUILD_ID
    note.extend_from_slice(b"GNU\0");
    note.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x33, 0x44]);

    let sections = vec![
        TestSection::progbits(".text", 0x1000, vec![0x90; 16])
            .flags(0x2 | 0x4) // ALLOC | EXECINSTR
            .align(16),
        TestSection::progbits(".data", 0x2000, vec![1, 2, 3, 4, 5, 6, 7, 8])
            .flags(0x2 | 0x1) // ALLOC | WRITE
            .align(8),
        TestSection::nobits(".bss", 0x2008, 32).flags(0x2 | 0x1).align(8),
        TestSection::progbits(
            ".comment",
            0,
            b"GCC: (GNU) 11.2.0\0clang version 15.0.0\0".to_vec(),
        ),
        TestSection::new(".note.gnu.build-id", 7, 0x1800, Some(note)).flags(0x2),
    ];

    fixtures::Elf64Builder::new()
        .file_type(2) // ET_EXEC
        .machine(62) // EM_X86_64
        .entry(0x1000)
        .sections(sections)
        .symbols(vec![
            fixtures::TestSymbol::new("main", 0x1000, 16, 1, 2, fixtures::SymbolSection::Index(1)),
            fixtures::TestSymbol::new("counter", 0x2000, 4, 0, 1, fixtures::SymbolSection::Index(2)),
            fixtures::TestSymbol::new("_etext", 0x1010, 0, 1, 0, fixtures::SymbolSection::Abs),
            fixtures::TestSymbol::new("__bss_end__", 0x2028, 0, 1, 0, fixtures::SymbolSection::Abs),
        ])
        .segments(|offsets| {
            vec![
                TestSegment {
                    ty: 1, // PT_LOAD
                    flags: 0x4 | 0x1,
                    offset: offsets[".text"],
                    vaddr: 0x1000,
                    filesz: 16,
                    memsz: 16,
                    align: 0x1000,
                },
                TestSegment {
                    ty: 1, // PT_LOAD
                    flags: 0x4 | 0x2,
                    offset: offsets[".data"],
                    vaddr: 0x2000,
                    filesz: 8,
                    memsz: 0x28, // data + bss
                    align: 0x1000,
                },
            ]
        })
        .build()
}

#[test]
fn header_fields_decode() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    let header = parser.header();
    assert_eq!(header.ident.class, ElfClass::Class64);
    assert_eq!(header.ident.endian, ElfEndian::Little);
    assert_eq!(header.ident.version, ElfVersion::Current);
    assert_eq!(header.ident.os_abi, ElfOsAbi::Unspecified);
    assert_eq!(header.ty, FileType::Executable);
    assert_eq!(header.machine, TargetMachine::X86_64);
    assert_eq!(header.entry_address, Some(0x1000));
    Ok(())
}

#[test]
fn open_rejects_bad_magic_class_and_endianness() {
    let mut bytes = sample_elf();
    bytes[0] = 0x7E;
    assert!(matches!(ElfParser::from_bytes(&bytes), Err(Error::BadMagic)));

    let mut bytes = sample_elf();
    bytes[4] = 3;
    assert!(matches!(
        ElfParser::from_bytes(&bytes),
        Err(Error::UnsupportedClass(3))
    ));

    let mut bytes = sample_elf();
    bytes[5] = 0;
    assert!(matches!(
        ElfParser::from_bytes(&bytes),
        Err(Error::UnsupportedEndianness(0))
    ));

    let mut bytes = sample_elf();
    bytes[6] = 2;
    assert!(matches!(
        ElfParser::from_bytes(&bytes),
        Err(Error::UnsupportedVersion(2))
    ));
}

#[test]
fn sections_resolve_names_and_images() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    let text = parser.sections().get(".text").expect("missing .text");
    assert_eq!(text.ty, SectionType::ProgBits);
    assert_eq!(text.address, 0x1000);
    assert_eq!(text.size, 16);
    assert_eq!(text.image_bytes().len(), 16);

    // NOBITS sections carry a size but no image.
    let bss = parser.sections().get(".bss").expect("missing .bss");
    assert_eq!(bss.ty, SectionType::NoBits);
    assert_eq!(bss.size, 32);
    assert!(bss.image.is_none());

    for section in parser.sections_raw().iter().filter(|s| s.has_content()) {
        assert_eq!(section.image_bytes().len() as u64, section.size);
    }
    assert!(!text.is_dwo());
    assert!(parser.sections().get(".debug_info").is_none());
    Ok(())
}

#[test]
fn symbols_resolve_names_sections_and_access() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    let main = parser.symbols().get("main", None).expect("missing main");
    assert_eq!(main.binding, SymbolBinding::Global);
    assert_eq!(main.ty, SymbolType::Func);
    assert_eq!(main.section_name, ".text");
    assert_eq!(main.section_index, SectionIndex::Normal(1));
    // The owning section's flags are cached on the symbol.
    assert!(main.access.contains(crate::section::SectionFlags::EXECINSTR));

    let etext = parser.symbols().get("_etext", None).expect("missing _etext");
    assert_eq!(etext.section_index, SectionIndex::Abs);
    assert_eq!(etext.section_name, "ABS");
    assert!(parser.symbols().get("main", Some(".text")).is_some());
    assert!(parser.symbols().get("main", Some(".data")).is_none());
    Ok(())
}

#[test]
fn gcc_special_symbols_come_back_ordered_by_value() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    let special = parser.symbols().fetch_gcc_special();
    let names: Vec<&str> = special.iter().map(|symbol| symbol.name.as_str()).collect();
    assert_eq!(names, vec!["_etext", "__bss_end__"]);
    Ok(())
}

#[test]
fn comment_and_notes_decode() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    assert_eq!(parser.comment(), "GCC: (GNU) 11.2.0\nclang version 15.0.0");

    let notes = parser.notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].name, "GNU");
    assert_eq!(notes[0].ty, 3);
    assert_eq!(notes[0].descriptor.len(), 8);
    assert_eq!(notes[0].section_name, ".note.gnu.build-id");
    Ok(())
}

#[test]
fn section_to_segment_mapping_matches_the_predicate() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    let mapping = parser.section_to_segment_mapping();
    assert_eq!(mapping.len(), parser.segments().len());
    for (segment_index, section_indices) in mapping.iter().enumerate() {
        let segment = &parser.segments()[segment_index];
        for &section_index in section_indices {
            assert!(segment::section_in_segment(
                &parser.sections_raw()[section_index],
                segment
            ));
        }
    }

    let text = parser.sections().get(".text").unwrap();
    let bss = parser.sections().get(".bss").unwrap();
    assert!(mapping[0].contains(&text.index));
    assert!(!mapping[0].contains(&bss.index));
    assert!(mapping[1].contains(&bss.index));
    Ok(())
}

#[test]
fn opening_the_same_bytes_twice_yields_an_equal_model() -> Result<()> {
    let bytes = sample_elf();
    let first = ElfParser::from_bytes(&bytes)?;
    let second = ElfParser::from_bytes(&bytes)?;
    assert_eq!(first.header(), second.header());
    assert_eq!(first.sections_raw(), second.sections_raw());
    assert_eq!(first.symbols_raw(), second.symbols_raw());
    assert_eq!(first.segments(), second.segments());
    assert_eq!(first.file_hash(), second.file_hash());
    assert_eq!(first.image().map(<[u8]>::len), Some(bytes.len()));
    Ok(())
}

#[test]
fn queries_filter_and_order() -> Result<()> {
    let parser = ElfParser::from_bytes(&sample_elf())?;
    let allocated = parser
        .sections()
        .fetch(&SectionFilter {
            name_pattern: Some(r"^\."),
            flags: Some(crate::query::FlagMatch::Any(
                crate::section::SectionFlags::ALLOC,
            )),
            order: SectionOrder::ByAddress,
            ..Default::default()
        })?
        .iter()
        .map(|section| section.name.clone())
        .collect::<Vec<_>>();
    assert_eq!(allocated, vec![".text", ".note.gnu.build-id", ".data", ".bss"]);

    let grouped = parser.symbols().fetch_grouped(&SymbolFilter {
        types: Some(&[SymbolType::Func, SymbolType::Object]),
        ..Default::default()
    })?;
    let keys: Vec<&str> = grouped.keys().map(String::as_str).collect();
    assert_eq!(keys, vec![".data", ".text"]);
    Ok(())
}

#[test]
fn cache_is_created_reused_and_rebuilt_on_changed_bytes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let elf_path = dir.path().join("firmware.elf");
    let db_path = dir.path().join("firmware.prgdb");
    let bytes = sample_elf();
    std::fs::write(&elf_path, &bytes)?;

    // First open parses and populates the store.
    let first = ElfParser::from_path(&elf_path)?;
    assert!(db_path.exists());
    assert_eq!(first.file_hash(), cache::file_hash(&bytes));
    let stored_before = std::fs::read(&db_path)?;

    // Second open reuses the store without rewriting it.
    let second = ElfParser::from_path(&elf_path)?;
    assert_eq!(first.header(), second.header());
    assert_eq!(first.sections_raw(), second.sections_raw());
    assert_eq!(first.symbols_raw(), second.symbols_raw());
    let stored_after = std::fs::read(&db_path)?;
    assert_eq!(stored_before, stored_after);

    // Changing one byte of the input invalidates the hash and rebuilds the store.
    let mut changed = bytes.clone();
    let text_offset = first.sections().get(".text").unwrap().offset as usize;
    changed[text_offset] ^= 0xFF;
    std::fs::write(&elf_path, &changed)?;
    let third = ElfParser::from_path(&elf_path)?;
    assert_eq!(third.file_hash(), cache::file_hash(&changed));
    assert_ne!(third.file_hash(), first.file_hash());
    Ok(())
}

#[test]
fn corrupt_caches_are_rebuilt_not_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let elf_path = dir.path().join("firmware.elf");
    let db_path = dir.path().join("firmware.prgdb");
    let bytes = sample_elf();
    std::fs::write(&elf_path, &bytes)?;
    std::fs::write(&db_path, b"not a program database")?;

    let parser = ElfParser::from_path(&elf_path)?;
    assert_eq!(parser.file_hash(), cache::file_hash(&bytes));
    // The store was replaced with a valid one.
    let reloaded = cache::load(&db_path, parser.file_hash())?;
    assert_eq!(reloaded.sections, parser.sections_raw());
    Ok(())
}

/// The DWARF fixture: `compile_unit "demo.c" { base_type "int"; variable "counter": int }`,
/// names partly through `.debug_str`, the variable typed through a CU-relative `ref4`.
fn dwarf_elf() -> Vec<u8> {
    let mut abbrev = Vec::new();
    abbrev.extend_from_slice(&[0x01, 0x11, 0x01]); // compile_unit, children
    abbrev.extend_from_slice(&[0x03, 0x0E, 0x00, 0x00]); // name: strp
    abbrev.extend_from_slice(&[0x02, 0x24, 0x00]); // base_type, leaf
    abbrev.extend_from_slice(&[0x03, 0x0E, 0x0B, 0x0B, 0x00, 0x00]); // name: strp, byte_size: data1
    abbrev.extend_from_slice(&[0x03, 0x34, 0x00]); // variable, leaf
    abbrev.extend_from_slice(&[0x03, 0x08, 0x49, 0x13, 0x00, 0x00]); // name: string, type: ref4
    abbrev.push(0x00);

    let strings = b"\0demo.c\0int\0".to_vec();

    let mut body = Vec::new();
    body.push(0x01); // compile_unit
    body.extend_from_slice(&1u32.to_le_bytes()); // strp -> "demo.c"
    let base_type_offset = (11 + body.len()) as u32;
    body.push(0x02); // base_type
    body.extend_from_slice(&8u32.to_le_bytes()); // strp -> "int"
    body.push(4); // byte_size
    body.push(0x03); // variable
    body.extend_from_slice(b"counter\0");
    body.extend_from_slice(&base_type_offset.to_le_bytes()); // ref4, CU starts at 0
    body.push(0x00); // close compile_unit

    let mut info = Vec::new();
    info.extend_from_slice(&((body.len() + 7) as u32).to_le_bytes());
    info.extend_from_slice(&4u16.to_le_bytes());
    info.extend_from_slice(&0u32.to_le_bytes());
    info.push(8);
    info.extend_from_slice(&body);

    fixtures::Elf64Builder::new()
        .file_type(1) // ET_REL
        .machine(62)
        .sections(vec![
            TestSection::progbits(".debug_abbrev", 0, abbrev),
            TestSection::progbits(".debug_info", 0, info),
            TestSection::progbits(".debug_str", 0, strings),
        ])
        .build()
}

#[test]
fn the_dwarf_pipeline_runs_over_parsed_debug_sections() -> Result<()> {
    let parser = ElfParser::from_bytes(&dwarf_elf())?;
    let mut processor = DwarfProcessor::new(&parser)?;
    let info = processor.debug_info()?;

    assert_eq!(info.units.len(), 1);
    let root = info.die(info.units[0].root.expect("missing root"));
    assert_eq!(root.name(), Some("demo.c"));
    assert_eq!(root.children.len(), 2);

    let variable = info.die(root.children[1]);
    assert_eq!(variable.name(), Some("counter"));

    let mut resolver = TypeResolver::new(&info, parser.header().ident.endian);
    let attribute = variable
        .attribute(crate::dwarf::constants::AttributeEncoding::Type)
        .expect("missing type attribute");
    let target = resolver
        .reference_target(variable, attribute)
        .expect("unresolvable reference");
    let node = resolver.resolve_type(target);
    let TypeNode::Record(record) = node.as_ref() else {
        panic!("expected a record");
    };
    assert_eq!(record.tag, "base_type");
    assert_eq!(
        record.attributes.get("name"),
        Some(&TypeValue::Text("int".to_string()))
    );
    assert_eq!(record.attributes.get("byte_size"), Some(&TypeValue::Unsigned(4)));
    Ok(())
}

#[test]
fn decoded_dies_persist_into_the_store_and_come_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let elf_path = dir.path().join("debug.elf");
    std::fs::write(&elf_path, dwarf_elf())?;

    let mut parser = ElfParser::from_path(&elf_path)?;
    assert!(parser.debug_info().is_none());
    let mut processor = DwarfProcessor::new(&parser)?;
    let info = processor.debug_info()?;
    let die_count = info.dies.len();
    parser.store_debug_info(info)?;

    let reopened = ElfParser::from_path(&elf_path)?;
    let restored = reopened.debug_info().expect("missing restored debug info");
    assert_eq!(restored.dies.len(), die_count);
    assert_eq!(restored.units.len(), 1);
    let root = restored.die(restored.units[0].root.unwrap());
    assert_eq!(root.name(), Some("demo.c"));
    Ok(())
}

#[test]
fn schema_mismatches_trigger_a_rebuild() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let elf_path = dir.path().join("firmware.elf");
    let db_path = dir.path().join("firmware.prgdb");
    std::fs::write(&elf_path, sample_elf())?;

    let parser = ElfParser::from_path(&elf_path)?;
    let mut model = cache::load(&db_path, parser.file_hash())?;
    model.meta.schema_version += 1;
    cache::store(&db_path, &model)?;
    assert!(matches!(
        cache::load(&db_path, parser.file_hash()),
        Err(Error::CacheSchemaMismatch)
    ));

    // Opening through the parser replaces the stale store with a current one.
    let reopened = ElfParser::from_path(&elf_path)?;
    assert_eq!(reopened.sections_raw(), parser.sections_raw());
    let rebuilt = cache::load(&db_path, parser.file_hash())?;
    assert_eq!(rebuilt.meta.schema_version, cache::SCHEMA_VERSION);
    Ok(())
}

#[test]
fn arm_attributes_decode_through_the_parser() -> Result<()> {
    let mut attrs = Vec::new();
    attrs.push(6u8); // Tag_CPU_arch
    attrs.push(10u8); // ARM v7
    attrs.push(9u8); // Tag_THUMB_ISA_use
    attrs.push(2u8);
    let sub_size = 1 + 4 + attrs.len();
    let vendor = b"aeabi\0";
    let record_size = 4 + vendor.len() + sub_size;
    let mut blob = vec![0x41u8];
    blob.extend_from_slice(&(record_size as u32).to_le_bytes());
    blob.extend_from_slice(vendor);
    blob.push(1); // file scope
    blob.extend_from_slice(&(sub_size as u32).to_le_bytes());
    blob.extend_from_slice(&attrs);

    let image = fixtures::Elf64Builder::new()
        .machine(40) // EM_ARM
        .sections(vec![TestSection::new(".ARM.attributes", 0x70000003, 0, Some(blob))])
        .build();
    let parser = ElfParser::from_bytes(&image)?;
    assert_eq!(parser.header().machine, TargetMachine::ARM);

    let decoded = parser.arm_attributes().expect("section present")?;
    assert_eq!(decoded.vendors.len(), 1);
    assert_eq!(decoded.vendors[0].vendor, "aeabi");
    assert_eq!(decoded.vendors[0].attributes[0].name, Some("Tag_CPU_arch"));
    assert_eq!(decoded.vendors[0].attributes[0].description.as_deref(), Some("ARM v7"));
    Ok(())
}

#[test]
fn big_endian_32_bit_objects_parse_with_swapped_field_order() -> Result<()> {
    let bytes = fixtures::minimal_elf32_be();
    let parser = ElfParser::from_bytes(&bytes)?;
    assert_eq!(parser.header().ident.class, ElfClass::Class32);
    assert_eq!(parser.header().ident.endian, ElfEndian::Big);
    assert_eq!(parser.header().machine, TargetMachine::PowerPC);

    let data = parser.sections().get(".data").expect("missing .data");
    assert_eq!(data.address, 0x2000);
    assert_eq!(data.size, 4);

    let sym = parser.symbols().get("counter", None).expect("missing counter");
    assert_eq!(sym.value, 0x2000);
    assert_eq!(sym.ty, SymbolType::Object);
    assert_eq!(sym.section_name, ".data");
    Ok(())
}
