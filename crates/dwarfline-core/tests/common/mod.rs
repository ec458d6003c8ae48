//! Hand-assembled DWARF sections for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

pub const LINE_BASE: i8 = -5;
pub const LINE_RANGE: u8 = 14;
pub const OPCODE_BASE: u8 = 13;

/// Abbreviation code of a compile unit with a name and a line table.
const CU_WITH_LINES: u8 = 1;
/// Abbreviation code of a compile unit with only a name.
const CU_WITHOUT_LINES: u8 = 2;

pub fn uleb(mut value: u64, out: &mut Vec<u8>)
{
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn sleb(mut value: i64, out: &mut Vec<u8>)
{
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn offset(value: u64, is64: bool, out: &mut Vec<u8>)
{
    if is64 {
        out.extend_from_slice(&value.to_le_bytes());
    } else {
        out.extend_from_slice(&(value as u32).to_le_bytes());
    }
}

fn initial_length(length: usize, is64: bool, out: &mut Vec<u8>)
{
    if is64 {
        out.extend_from_slice(&[0xff; 4]);
        out.extend_from_slice(&(length as u64).to_le_bytes());
    } else {
        out.extend_from_slice(&(length as u32).to_le_bytes());
    }
}

/// Opcode stream of one line program.
#[derive(Default, Clone)]
pub struct Ops
{
    bytes: Vec<u8>,
}

impl Ops
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn set_address(mut self, address: u64) -> Self
    {
        self.bytes.extend_from_slice(&[0x00, 0x09, 0x02]);
        self.bytes.extend_from_slice(&address.to_le_bytes());
        self
    }

    pub fn copy(mut self) -> Self
    {
        self.bytes.push(0x01);
        self
    }

    pub fn advance_pc(mut self, delta: u64) -> Self
    {
        self.bytes.push(0x02);
        uleb(delta, &mut self.bytes);
        self
    }

    pub fn advance_line(mut self, delta: i64) -> Self
    {
        self.bytes.push(0x03);
        sleb(delta, &mut self.bytes);
        self
    }

    pub fn set_file(mut self, file: u64) -> Self
    {
        self.bytes.push(0x04);
        uleb(file, &mut self.bytes);
        self
    }

    pub fn set_column(mut self, column: u64) -> Self
    {
        self.bytes.push(0x05);
        uleb(column, &mut self.bytes);
        self
    }

    pub fn negate_stmt(mut self) -> Self
    {
        self.bytes.push(0x06);
        self
    }

    /// Special opcode advancing the address by `address` and the line by
    /// `line`, emitting a row.
    pub fn special(mut self, address: u8, line: i8) -> Self
    {
        let opcode = u32::from(OPCODE_BASE)
            + u32::from(LINE_RANGE) * u32::from(address)
            + u32::try_from(i32::from(line) - i32::from(LINE_BASE)).expect("line advance below line base");
        assert!(i32::from(line) - i32::from(LINE_BASE) < i32::from(LINE_RANGE));
        self.bytes.push(u8::try_from(opcode).expect("special opcode out of range"));
        self
    }

    pub fn end_sequence(mut self) -> Self
    {
        self.bytes.extend_from_slice(&[0x00, 0x01, 0x01]);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self
    {
        self.bytes.extend_from_slice(bytes);
        self
    }
}

/// A line program: directory and file tables plus its opcodes.
#[derive(Clone)]
pub struct Program
{
    pub directories: Vec<String>,
    /// (path, directory index)
    pub files: Vec<(String, u64)>,
    pub ops: Ops,
}

impl Program
{
    pub fn new(ops: Ops) -> Self
    {
        Self {
            directories: Vec::new(),
            files: Vec::new(),
            ops,
        }
    }

    pub fn directory(mut self, path: &str) -> Self
    {
        self.directories.push(path.to_string());
        self
    }

    pub fn file(mut self, path: &str, directory: u64) -> Self
    {
        self.files.push((path.to_string(), directory));
        self
    }
}

/// Builds `.debug_abbrev`, `.debug_info`, `.debug_line`, `.debug_str` and
/// `.debug_line_str` for a set of single-entry compile units.
pub struct DwarfBuilder
{
    version: u16,
    is64: bool,
    info: Vec<u8>,
    line: Vec<u8>,
    strings: Vec<u8>,
    line_strings: Vec<u8>,
}

impl DwarfBuilder
{
    pub fn new(version: u16, is64: bool) -> Self
    {
        Self {
            version,
            is64,
            info: Vec::new(),
            line: Vec::new(),
            // offset 0 is never handed out so a zero offset is obviously wrong
            strings: b"\0".to_vec(),
            line_strings: b"\0".to_vec(),
        }
    }

    fn string(&mut self, text: &str) -> u64
    {
        let at = self.strings.len() as u64;
        self.strings.extend_from_slice(text.as_bytes());
        self.strings.push(0);
        at
    }

    fn line_string(&mut self, text: &str) -> u64
    {
        let at = self.line_strings.len() as u64;
        self.line_strings.extend_from_slice(text.as_bytes());
        self.line_strings.push(0);
        at
    }

    fn stmt_list_form(&self) -> u8
    {
        if self.version >= 4 {
            0x17 // sec_offset
        } else if self.is64 {
            0x07 // data8
        } else {
            0x06 // data4
        }
    }

    fn abbreviations(&self) -> Vec<u8>
    {
        let mut bytes = vec![CU_WITH_LINES, 0x11, 0x00, 0x03, 0x0e, 0x10, self.stmt_list_form(), 0x00, 0x00];
        bytes.extend_from_slice(&[CU_WITHOUT_LINES, 0x11, 0x00, 0x03, 0x0e, 0x00, 0x00]);
        bytes.push(0x00);
        bytes
    }

    /// Append a line program and return its `.debug_line` offset.
    pub fn line_program(&mut self, program: &Program) -> u64
    {
        let is64 = self.is64;
        let mut tables = vec![1];
        if self.version >= 4 {
            tables.push(1);
        }
        tables.push(1);
        tables.push(LINE_BASE as u8);
        tables.push(LINE_RANGE);
        tables.push(OPCODE_BASE);
        tables.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);

        if self.version >= 5 {
            // directories: path as line_strp
            tables.extend_from_slice(&[1, 0x01, 0x1f]);
            uleb(program.directories.len() as u64, &mut tables);
            for directory in &program.directories {
                let at = self.line_string(directory);
                offset(at, is64, &mut tables);
            }
            // files: path as line_strp, directory index as udata
            tables.extend_from_slice(&[2, 0x01, 0x1f, 0x02, 0x0f]);
            uleb(program.files.len() as u64, &mut tables);
            for (path, directory) in &program.files {
                let at = self.line_string(path);
                offset(at, is64, &mut tables);
                uleb(*directory, &mut tables);
            }
        } else {
            for directory in &program.directories {
                tables.extend_from_slice(directory.as_bytes());
                tables.push(0);
            }
            tables.push(0);
            for (path, directory) in &program.files {
                tables.extend_from_slice(path.as_bytes());
                tables.push(0);
                uleb(*directory, &mut tables);
                tables.extend_from_slice(&[0, 0]);
            }
            tables.push(0);
        }

        let mut body = Vec::new();
        body.extend_from_slice(&self.version.to_le_bytes());
        if self.version >= 5 {
            body.extend_from_slice(&[8, 0]);
        }
        offset(tables.len() as u64, is64, &mut body);
        body.extend_from_slice(&tables);
        body.extend_from_slice(&program.ops.bytes);

        let at = self.line.len() as u64;
        initial_length(body.len(), is64, &mut self.line);
        self.line.extend_from_slice(&body);
        at
    }

    /// Append a compile unit named `name`, pointing at the line program at
    /// `stmt_list` if given. Returns the unit's `.debug_info` offset.
    pub fn unit(&mut self, name: &str, stmt_list: Option<u64>) -> usize
    {
        let is64 = self.is64;
        let name_at = self.string(name);

        let mut body = Vec::new();
        body.extend_from_slice(&self.version.to_le_bytes());
        if self.version >= 5 {
            body.extend_from_slice(&[0x01, 8]);
            offset(0, is64, &mut body);
        } else {
            offset(0, is64, &mut body);
            body.push(8);
        }

        match stmt_list {
            Some(line_offset) => {
                body.push(CU_WITH_LINES);
                offset(name_at, is64, &mut body);
                offset(line_offset, is64, &mut body);
            }
            None => {
                body.push(CU_WITHOUT_LINES);
                offset(name_at, is64, &mut body);
            }
        }

        let at = self.info.len();
        initial_length(body.len(), is64, &mut self.info);
        self.info.extend_from_slice(&body);
        at
    }

    /// Convenience: a program and a unit that uses it.
    pub fn unit_with_program(&mut self, name: &str, program: &Program) -> usize
    {
        let line_offset = self.line_program(program);
        self.unit(name, Some(line_offset))
    }

    pub fn build(&self) -> HashMap<String, Vec<u8>>
    {
        let mut sections = HashMap::new();
        sections.insert(".debug_abbrev".to_string(), self.abbreviations());
        sections.insert(".debug_info".to_string(), self.info.clone());
        sections.insert(".debug_line".to_string(), self.line.clone());
        sections.insert(".debug_str".to_string(), self.strings.clone());
        if self.version >= 5 {
            sections.insert(".debug_line_str".to_string(), self.line_strings.clone());
        }
        sections
    }
}
