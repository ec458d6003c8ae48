//! Line table rows and the address-ordered row sequence.

use crate::reader::ULeb128;

/// One row of the line number matrix.
///
/// This is also the interpreter's register file: each emitted row is a
/// snapshot of the registers at the time of emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRow
{
    pub address: u64,
    pub op_index: u64,
    /// 1-based index into the file table; 0 means unknown.
    pub file: u64,
    /// Signed; `advance_line` may take it below 1 transiently.
    pub line: i64,
    /// 0 means the left edge of the line.
    pub column: u64,
    pub is_stmt: bool,
    pub basic_block: bool,
    pub end_sequence: bool,
    pub prologue_end: bool,
    pub epilogue_begin: bool,
    pub isa: u64,
    pub discriminator: ULeb128,
}

impl LineRow
{
    /// Register state at the start of every sequence.
    pub const fn initial(default_is_stmt: bool) -> Self
    {
        LineRow {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: default_is_stmt,
            basic_block: false,
            end_sequence: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: ULeb128::ZERO,
        }
    }

    /// Clear the registers that only describe the row just emitted.
    pub(crate) fn clear_after_emit(&mut self)
    {
        self.basic_block = false;
        self.prologue_end = false;
        self.epilogue_begin = false;
        self.discriminator = ULeb128::ZERO;
    }

    /// Zero-based file index, or `None` for the unknown file.
    pub fn file_index(&self) -> Option<u64>
    {
        self.file.checked_sub(1)
    }
}

/// Rows of one line program, kept in address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineRows
{
    rows: Vec<LineRow>,
}

impl LineRows
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append a row. A row at the same address as the last one replaces it.
    pub fn push(&mut self, row: LineRow)
    {
        match self.rows.last_mut() {
            Some(last) if last.address == row.address => *last = row,
            _ => self.rows.push(row),
        }
    }

    /// Restore address order if the program emitted sequences out of order.
    ///
    /// At a shared address, `end_sequence` rows sort before real rows, so a
    /// sequence starting where another one ends is the one
    /// [`LineRows::find_nearest`] returns. Otherwise emission order is kept.
    pub(crate) fn sort(&mut self)
    {
        let ordered = self
            .rows
            .windows(2)
            .all(|pair| (pair[0].address, !pair[0].end_sequence) <= (pair[1].address, !pair[1].end_sequence));
        if !ordered {
            self.rows.sort_by_key(|row| (row.address, !row.end_sequence));
        }
    }

    pub fn as_slice(&self) -> &[LineRow]
    {
        &self.rows
    }

    pub fn len(&self) -> usize
    {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineRow>
    {
        self.rows.iter()
    }

    /// Row covering `pc`: the row at exactly `pc`, or else the row with the
    /// greatest address below it. `None` if `pc` precedes every row.
    pub fn find_nearest(&self, pc: u64) -> Option<&LineRow>
    {
        let after = self.rows.partition_point(|row| row.address <= pc);
        after.checked_sub(1).map(|index| &self.rows[index])
    }
}

impl<'a> IntoIterator for &'a LineRows
{
    type Item = &'a LineRow;
    type IntoIter = std::slice::Iter<'a, LineRow>;

    fn into_iter(self) -> Self::IntoIter
    {
        self.rows.iter()
    }
}
