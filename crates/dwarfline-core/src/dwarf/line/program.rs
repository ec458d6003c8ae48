//! Line number program state machine.

use gimli::constants;
use tracing::{debug, instrument, trace};

use super::header::{FileEntry, HeaderStrings, LineProgramHeader};
use super::row::{LineRow, LineRows};
use crate::error::{DwarfError, DwarfResult};
use crate::reader::{to_usize, ByteCursor};

/// A decoded line program: its header and the rows it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineProgram
{
    header: LineProgramHeader,
    rows: LineRows,
}

impl LineProgram
{
    /// Decode the header at `offset` in `.debug_line` and run its program.
    ///
    /// ## Errors
    ///
    /// Fails on a malformed header, a truncated opcode stream, or an extended
    /// opcode with a zero length.
    #[instrument(level = "debug", skip(data, strings))]
    pub fn decode(data: &[u8], offset: u64, unit_address_size: u8, strings: HeaderStrings<'_>) -> DwarfResult<Self>
    {
        let start = to_usize(offset, "line program offset")?;
        if start >= data.len() {
            return Err(DwarfError::Decoding(format!(
                "line program offset 0x{offset:x} is past the end of .debug_line (0x{:x} bytes)",
                data.len()
            )));
        }

        let mut cursor = ByteCursor::at(data, start);
        let mut header = LineProgramHeader::decode(&mut cursor, unit_address_size, strings)?;
        let end = header.program_end;

        let mut rows = LineRows::new();
        Interpreter::new(&mut header, &mut rows).run(&mut cursor, end)?;
        rows.sort();

        debug!(offset, rows = rows.len(), files = header.files.len(), "decoded line program");
        Ok(LineProgram { header, rows })
    }

    pub fn header(&self) -> &LineProgramHeader
    {
        &self.header
    }

    pub fn rows(&self) -> &LineRows
    {
        &self.rows
    }

    /// Path of the file a row's `file` register names. See
    /// [`LineProgramHeader::file_path`].
    pub fn file_path(&self, file: u64) -> Option<String>
    {
        self.header.file_path(file)
    }
}

struct Interpreter<'h>
{
    header: &'h mut LineProgramHeader,
    rows: &'h mut LineRows,
    state: LineRow,
}

impl<'h> Interpreter<'h>
{
    fn new(header: &'h mut LineProgramHeader, rows: &'h mut LineRows) -> Self
    {
        let state = LineRow::initial(header.default_is_stmt);
        Self { header, rows, state }
    }

    fn run(&mut self, cursor: &mut ByteCursor<'_>, end: usize) -> DwarfResult<()>
    {
        while cursor.offset() < end {
            let opcode = cursor.read_u8()?;
            if opcode >= self.header.opcode_base {
                self.special(opcode);
            } else if opcode == 0 {
                self.extended(cursor)?;
            } else {
                self.standard(opcode, cursor)?;
            }
        }
        Ok(())
    }

    /// Advance by `operation_advance` operations, carrying whole instructions
    /// into the address.
    fn advance(&mut self, operation_advance: u64)
    {
        let max_ops = u64::from(self.header.maximum_operations_per_instruction);
        let min_len = u64::from(self.header.minimum_instruction_length);
        let total = self.state.op_index.wrapping_add(operation_advance);
        self.state.address = self.state.address.wrapping_add(min_len.wrapping_mul(total / max_ops));
        self.state.op_index = total % max_ops;
    }

    fn emit(&mut self)
    {
        self.rows.push(self.state);
        self.state.clear_after_emit();
    }

    fn special(&mut self, opcode: u8)
    {
        let adjusted = opcode - self.header.opcode_base;
        let line_range = self.header.line_range;
        self.advance(u64::from(adjusted / line_range));
        let line_delta = i64::from(self.header.line_base) + i64::from(adjusted % line_range);
        self.state.line = self.state.line.wrapping_add(line_delta);
        trace!(opcode, address = self.state.address, line = self.state.line, "special opcode");
        self.emit();
    }

    fn extended(&mut self, cursor: &mut ByteCursor<'_>) -> DwarfResult<()>
    {
        let start = cursor.offset();
        let length = cursor.read_uleb128()?.to_u64("extended opcode length")?;
        if length == 0 {
            return Err(DwarfError::Decoding(format!(
                "extended opcode at 0x{start:x} has zero length"
            )));
        }
        let body = cursor.offset();
        let next = body
            .checked_add(to_usize(length, "extended opcode length")?)
            .filter(|next| *next <= cursor.len())
            .ok_or(DwarfError::OutOfRange {
                offset: body,
                wanted: usize::try_from(length).unwrap_or(usize::MAX),
                len: cursor.len(),
            })?;

        let sub_opcode = constants::DwLne(cursor.read_u8()?);
        match sub_opcode {
            constants::DW_LNE_end_sequence => {
                self.state.end_sequence = true;
                trace!(address = self.state.address, "end of sequence");
                self.rows.push(self.state);
                self.state = LineRow::initial(self.header.default_is_stmt);
            }
            constants::DW_LNE_set_address => {
                let width = self.header.address_size;
                if length - 1 < u64::from(width) {
                    return Err(DwarfError::Decoding(format!(
                        "set_address at 0x{start:x} has a {}-byte operand, shorter than the {width}-byte address size",
                        length - 1
                    )));
                }
                // any operand bytes past the address are padding
                self.state.address = cursor.read_address(width)?;
                self.state.op_index = 0;
            }
            constants::DW_LNE_define_file => {
                let path = cursor.read_string()?;
                let entry = FileEntry::decode_legacy(path, cursor)?;
                trace!(path = %entry.path, "define file");
                self.header.files.push(entry);
            }
            constants::DW_LNE_set_discriminator => {
                self.state.discriminator = cursor.read_uleb128()?;
            }
            other => {
                trace!(opcode = %other, length, "skipping unknown extended opcode");
            }
        }

        // the declared length wins over whatever the operands consumed
        cursor.set_offset(next);
        Ok(())
    }

    fn standard(&mut self, opcode: u8, cursor: &mut ByteCursor<'_>) -> DwarfResult<()>
    {
        match constants::DwLns(opcode) {
            constants::DW_LNS_copy => self.emit(),
            constants::DW_LNS_advance_pc => {
                let operand = cursor.read_uleb128()?.low;
                self.advance(operand);
            }
            constants::DW_LNS_advance_line => {
                let delta = cursor.read_sleb128()?.to_i64("line advance")?;
                self.state.line = self.state.line.wrapping_add(delta);
            }
            constants::DW_LNS_set_file => self.state.file = cursor.read_uleb128()?.to_u64("file index")?,
            constants::DW_LNS_set_column => self.state.column = cursor.read_uleb128()?.to_u64("column")?,
            constants::DW_LNS_negate_stmt => self.state.is_stmt = !self.state.is_stmt,
            constants::DW_LNS_set_basic_block => self.state.basic_block = true,
            constants::DW_LNS_const_add_pc => {
                let adjusted = 255 - self.header.opcode_base;
                self.advance(u64::from(adjusted / self.header.line_range));
            }
            constants::DW_LNS_fixed_advance_pc => {
                let delta = cursor.read_u16()?;
                self.state.address = self.state.address.wrapping_add(u64::from(delta));
                self.state.op_index = 0;
            }
            constants::DW_LNS_set_prologue_end => self.state.prologue_end = true,
            constants::DW_LNS_set_epilogue_begin => self.state.epilogue_begin = true,
            constants::DW_LNS_set_isa => self.state.isa = cursor.read_uleb128()?.to_u64("isa")?,
            _ => {
                let operands = self
                    .header
                    .standard_opcode_lengths
                    .get(usize::from(opcode) - 1)
                    .map_or(0, |count| count.low);
                trace!(opcode, operands, "skipping unknown standard opcode");
                for _ in 0..operands {
                    cursor.read_uleb128()?;
                }
            }
        }
        Ok(())
    }
}
