//! Line number program header.
//!
//! Versions 2 through 4 list directories and files as null-terminated
//! records. Version 5 describes each table with a content-type/form format
//! first and then encodes every entry field by field.

use gimli::constants::{self, DwForm, DwLnct};
use tracing::debug;

use super::super::form;
use super::super::strings::StringTable;
use super::super::{Encoding, MAX_VERSION, MIN_VERSION};
use crate::error::{DwarfError, DwarfResult};
use crate::reader::{to_usize, ByteCursor, ULeb128};

/// A directory or file table entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry
{
    pub path: String,
    pub directory_index: u64,
    pub timestamp: u64,
    pub size: u64,
    pub md5: Option<[u8; 16]>,
}

impl FileEntry
{
    /// Pre-v5 file record: path, then directory, time and size as LEB128s.
    /// Also the operand layout of `DW_LNE_define_file`.
    pub(crate) fn decode_legacy(path: String, cursor: &mut ByteCursor<'_>) -> DwarfResult<Self>
    {
        Ok(FileEntry {
            path,
            directory_index: cursor.read_uleb128()?.to_u64("directory index")?,
            timestamp: cursor.read_uleb128()?.low,
            size: cursor.read_uleb128()?.low,
            md5: None,
        })
    }
}

/// One (content type, form) pair of a v5 entry format.
pub type EntryFormat = (DwLnct, DwForm);

/// Decoded line program header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineProgramHeader
{
    /// Offset of the program in `.debug_line`.
    pub offset: u64,
    pub unit_length: u64,
    pub is64: bool,
    pub version: u16,
    pub address_size: u8,
    pub segment_selector_size: u8,
    pub header_length: u64,
    pub minimum_instruction_length: u8,
    pub maximum_operations_per_instruction: u8,
    pub default_is_stmt: bool,
    pub line_base: i8,
    pub line_range: u8,
    pub opcode_base: u8,
    /// Operand counts of standard opcodes 1 through `opcode_base - 1`.
    pub standard_opcode_lengths: Vec<ULeb128>,
    pub directory_entry_format: Vec<EntryFormat>,
    pub file_entry_format: Vec<EntryFormat>,
    pub directories: Vec<FileEntry>,
    pub files: Vec<FileEntry>,
    /// Section offset of the first opcode.
    pub program_start: usize,
    /// Section offset one past the last opcode.
    pub program_end: usize,
}

/// String sections a v5 header may point into.
#[derive(Clone, Copy)]
pub struct HeaderStrings<'a>
{
    pub strings: &'a StringTable,
    pub line_strings: &'a StringTable,
}

impl LineProgramHeader
{
    /// Parse the header at `cursor`. On success the cursor sits on the first
    /// opcode.
    ///
    /// `unit_address_size` is the owning unit's address size, which pre-v5
    /// headers do not carry themselves.
    pub fn decode(cursor: &mut ByteCursor<'_>, unit_address_size: u8, strings: HeaderStrings<'_>) -> DwarfResult<Self>
    {
        let offset = cursor.offset() as u64;
        let (unit_length, is64) = cursor.read_initial_length()?;
        let unit_start = cursor.offset();
        let program_end = unit_start
            .checked_add(to_usize(unit_length, "line program length")?)
            .filter(|end| *end <= cursor.len())
            .ok_or(DwarfError::OutOfRange {
                offset: unit_start,
                wanted: usize::try_from(unit_length).unwrap_or(usize::MAX),
                len: cursor.len(),
            })?;

        let version = cursor.read_u16()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(DwarfError::UnsupportedFeature(format!(
                "line program version {version} at offset 0x{offset:x}"
            )));
        }

        let (address_size, segment_selector_size) = if version >= 5 {
            (cursor.read_u8()?, cursor.read_u8()?)
        } else {
            (unit_address_size, 0)
        };

        let header_length = cursor.read_offset(is64)?;
        let tables_end = cursor
            .offset()
            .checked_add(to_usize(header_length, "header length")?)
            .filter(|end| *end <= program_end)
            .ok_or_else(|| {
                DwarfError::Decoding(format!(
                    "line program at 0x{offset:x} declares header length 0x{header_length:x} past its end"
                ))
            })?;

        let minimum_instruction_length = cursor.read_u8()?;
        let maximum_operations_per_instruction = if version >= 4 { cursor.read_u8()? } else { 1 };
        if maximum_operations_per_instruction == 0 {
            return Err(DwarfError::Decoding(format!(
                "line program at 0x{offset:x} declares zero operations per instruction"
            )));
        }

        let default_is_stmt = cursor.read_u8()? != 0;
        let line_base = cursor.read_i8()?;
        let line_range = cursor.read_u8()?;
        if line_range == 0 {
            return Err(DwarfError::Decoding(format!(
                "line program at 0x{offset:x} declares a line range of zero"
            )));
        }
        let opcode_base = cursor.read_u8()?;

        let standard_opcode_lengths = (1..opcode_base)
            .map(|_| cursor.read_uleb128())
            .collect::<DwarfResult<Vec<_>>>()?;

        let mut header = LineProgramHeader {
            offset,
            unit_length,
            is64,
            version,
            address_size,
            segment_selector_size,
            header_length,
            minimum_instruction_length,
            maximum_operations_per_instruction,
            default_is_stmt,
            line_base,
            line_range,
            opcode_base,
            standard_opcode_lengths,
            directory_entry_format: Vec::new(),
            file_entry_format: Vec::new(),
            directories: Vec::new(),
            files: Vec::new(),
            program_start: tables_end,
            program_end,
        };

        if version >= 5 {
            header.decode_v5_tables(cursor, strings)?;
        } else {
            header.decode_legacy_tables(cursor)?;
        }

        if cursor.offset() > tables_end {
            return Err(DwarfError::Decoding(format!(
                "line program at 0x{offset:x}: tables overrun the declared header length by {} bytes",
                cursor.offset() - tables_end
            )));
        }
        // vendor padding between the tables and the first opcode is skipped
        cursor.set_offset(tables_end);

        debug!(
            offset,
            version,
            directories = header.directories.len(),
            files = header.files.len(),
            "decoded line program header"
        );
        Ok(header)
    }

    fn encoding(&self) -> Encoding
    {
        Encoding {
            is64: self.is64,
            version: self.version,
            address_size: self.address_size,
        }
    }

    fn decode_legacy_tables(&mut self, cursor: &mut ByteCursor<'_>) -> DwarfResult<()>
    {
        loop {
            let path = cursor.read_string()?;
            if path.is_empty() {
                break;
            }
            self.directories.push(FileEntry {
                path,
                ..FileEntry::default()
            });
        }

        loop {
            let path = cursor.read_string()?;
            if path.is_empty() {
                break;
            }
            self.files.push(FileEntry::decode_legacy(path, cursor)?);
        }
        Ok(())
    }

    fn decode_v5_tables(&mut self, cursor: &mut ByteCursor<'_>, strings: HeaderStrings<'_>) -> DwarfResult<()>
    {
        self.directory_entry_format = decode_entry_format(cursor)?;
        let count = cursor.read_uleb128()?.to_u64("directory count")?;
        for _ in 0..count {
            let entry = self.decode_v5_entry(cursor, &self.directory_entry_format, strings)?;
            self.directories.push(entry);
        }

        self.file_entry_format = decode_entry_format(cursor)?;
        let count = cursor.read_uleb128()?.to_u64("file count")?;
        for _ in 0..count {
            let entry = self.decode_v5_entry(cursor, &self.file_entry_format, strings)?;
            self.files.push(entry);
        }
        Ok(())
    }

    fn decode_v5_entry(
        &self,
        cursor: &mut ByteCursor<'_>,
        format: &[EntryFormat],
        strings: HeaderStrings<'_>,
    ) -> DwarfResult<FileEntry>
    {
        let mut entry = FileEntry::default();
        for (content, form) in format.iter().copied() {
            match content {
                constants::DW_LNCT_path => entry.path = self.read_path(cursor, form, strings)?,
                constants::DW_LNCT_directory_index => {
                    entry.directory_index = match form {
                        constants::DW_FORM_data1 => u64::from(cursor.read_u8()?),
                        constants::DW_FORM_data2 => u64::from(cursor.read_u16()?),
                        constants::DW_FORM_udata => cursor.read_uleb128()?.to_u64("directory index")?,
                        other => return Err(DwarfError::UnsupportedForm(other)),
                    };
                }
                constants::DW_LNCT_timestamp => {
                    entry.timestamp = match form {
                        constants::DW_FORM_udata => cursor.read_uleb128()?.low,
                        constants::DW_FORM_data4 => u64::from(cursor.read_u32()?),
                        constants::DW_FORM_data8 => cursor.read_u64()?,
                        constants::DW_FORM_block => {
                            // implementation-defined encoding, not interpreted
                            let length = cursor.read_uleb128()?.to_u64("timestamp block length")?;
                            cursor.skip(to_usize(length, "timestamp block length")?)?;
                            0
                        }
                        other => return Err(DwarfError::UnsupportedForm(other)),
                    };
                }
                constants::DW_LNCT_size => {
                    entry.size = match form {
                        constants::DW_FORM_data1 => u64::from(cursor.read_u8()?),
                        constants::DW_FORM_data2 => u64::from(cursor.read_u16()?),
                        constants::DW_FORM_data4 => u64::from(cursor.read_u32()?),
                        constants::DW_FORM_data8 => cursor.read_u64()?,
                        constants::DW_FORM_udata => cursor.read_uleb128()?.low,
                        other => return Err(DwarfError::UnsupportedForm(other)),
                    };
                }
                constants::DW_LNCT_MD5 => {
                    if form != constants::DW_FORM_data16 {
                        return Err(DwarfError::UnsupportedForm(form));
                    }
                    let mut digest = [0u8; 16];
                    digest.copy_from_slice(cursor.read_bytes(16)?);
                    entry.md5 = Some(digest);
                }
                _ => {
                    let length = form::size_of(form, *cursor, self.encoding())?;
                    cursor.skip(length)?;
                }
            }
        }
        Ok(entry)
    }

    fn read_path(&self, cursor: &mut ByteCursor<'_>, form: DwForm, strings: HeaderStrings<'_>) -> DwarfResult<String>
    {
        let (table, section) = match form {
            constants::DW_FORM_string => return cursor.read_string(),
            constants::DW_FORM_strp => (strings.strings, ".debug_str"),
            constants::DW_FORM_line_strp => (strings.line_strings, ".debug_line_str"),
            constants::DW_FORM_strp_sup | constants::DW_FORM_GNU_strp_alt => {
                return Err(DwarfError::UnsupportedFeature(
                    "DWARF split across multiple files is not supported".to_string(),
                ))
            }
            constants::DW_FORM_strx
            | constants::DW_FORM_strx1
            | constants::DW_FORM_strx2
            | constants::DW_FORM_strx3
            | constants::DW_FORM_strx4 => {
                return Err(DwarfError::UnsupportedFeature(format!(
                    "line table path uses {form}, which needs .debug_str_offsets"
                )))
            }
            other => return Err(DwarfError::UnsupportedForm(other)),
        };

        let offset = cursor.read_offset(self.is64)?;
        table
            .get(offset)
            .map(|text| text.to_string())
            .ok_or_else(|| DwarfError::Decoding(format!("no string at offset 0x{offset:x} in {section}")))
    }

    /// Path of file `file` (1-based, as stored in the `file` register).
    ///
    /// Joins the file's directory when its directory index is non-zero.
    /// Returns `None` for file 0 or an index past the table.
    pub fn file_path(&self, file: u64) -> Option<String>
    {
        let index = usize::try_from(file.checked_sub(1)?).ok()?;
        let entry = self.files.get(index)?;
        if entry.directory_index == 0 {
            return Some(entry.path.clone());
        }

        // pre-v5 tables leave out the compilation directory, so index 1 is
        // the first listed directory
        let directory = usize::try_from(entry.directory_index).ok().and_then(|dir| {
            if self.version >= 5 {
                self.directories.get(dir)
            } else {
                self.directories.get(dir - 1)
            }
        });
        match directory {
            Some(directory) => Some(format!("{}/{}", directory.path, entry.path)),
            None => Some(entry.path.clone()),
        }
    }
}

fn decode_entry_format(cursor: &mut ByteCursor<'_>) -> DwarfResult<Vec<EntryFormat>>
{
    let count = cursor.read_u8()?;
    (0..count)
        .map(|_| -> DwarfResult<EntryFormat> {
            let content = cursor.read_uleb128()?;
            let form = cursor.read_uleb128()?;
            let content = content
                .as_u64()
                .and_then(|raw| u16::try_from(raw).ok())
                .ok_or_else(|| DwarfError::Decoding(format!("content type {content} out of range")))?;
            let form = form
                .as_u64()
                .and_then(|raw| u16::try_from(raw).ok())
                .ok_or_else(|| DwarfError::Decoding(format!("entry form {form} out of range")))?;
            Ok((DwLnct(content), DwForm(form)))
        })
        .collect()
}
