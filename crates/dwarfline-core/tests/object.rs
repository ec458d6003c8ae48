//! Loading sections out of real object files

mod common;

use common::{DwarfBuilder, Ops, Program};
use dwarfline_core::error::DwarfError;
use dwarfline_core::prelude::*;
use object::write;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};

fn elf_with_dwarf(architecture: Architecture, endian: Endianness) -> Vec<u8>
{
    let program = Program::new(Ops::new().set_address(0x40_1000).advance_line(41).copy().advance_pc(16).end_sequence())
        .file("main.rs", 0);
    let mut builder = DwarfBuilder::new(5, false);
    builder.unit_with_program("main.rs", &program);

    let mut obj = write::Object::new(BinaryFormat::Elf, architecture, endian);
    let mut names: Vec<_> = builder.build().into_iter().collect();
    names.sort();
    for (name, data) in names {
        let id = obj.add_section(Vec::new(), name.into_bytes(), SectionKind::Debug);
        obj.append_section_data(id, &data, 1);
    }
    obj.write().unwrap()
}

#[test]
fn test_resolve_through_elf()
{
    let sections = ObjectSections::parse(&elf_with_dwarf(Architecture::X86_64, Endianness::Little)).unwrap();
    let mut names: Vec<_> = sections.names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![".debug_abbrev", ".debug_info", ".debug_line", ".debug_line_str", ".debug_str"]
    );

    let lines = DwarfLines::load(&sections).unwrap();
    let location = lines.resolve_line(0x40_1008).unwrap();
    assert_eq!(location.file_path, "main.rs");
    assert_eq!(location.line, 42);
}

#[test]
fn test_big_endian_rejected()
{
    let result = ObjectSections::parse(&elf_with_dwarf(Architecture::PowerPc64, Endianness::Big));
    assert!(matches!(result, Err(DwarfError::UnsupportedFeature(_))));
}

#[test]
fn test_object_without_dwarf()
{
    let obj = write::Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let sections = ObjectSections::parse(&obj.write().unwrap()).unwrap();
    assert_eq!(sections.names().count(), 0);
    assert!(matches!(DwarfLines::load(&sections), Err(DwarfError::SectionMissing(_))));
}
