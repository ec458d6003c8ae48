//! # Line Number Programs
//!
//! Decoding of `.debug_line`: the program header with its directory and file
//! tables, the opcode interpreter that produces the line matrix, and a cache
//! of decoded programs keyed by section offset.

mod header;
mod program;
mod row;

use std::sync::Arc;

pub use header::{EntryFormat, FileEntry, HeaderStrings, LineProgramHeader};
pub use program::LineProgram;
pub use row::{LineRow, LineRows};

use super::strings::StringTable;
use crate::cache::MemoCache;
use crate::error::DwarfResult;

/// Line programs of one `.debug_line` section, decoded on demand.
///
/// Programs are keyed by offset because several units may share one. A
/// program that fails to decode is not cached, so the next request retries.
pub struct LineProgramCache
{
    data: Arc<[u8]>,
    strings: Arc<StringTable>,
    line_strings: Arc<StringTable>,
    programs: MemoCache<u64, Arc<LineProgram>>,
}

impl LineProgramCache
{
    pub fn new(data: Arc<[u8]>, strings: Arc<StringTable>, line_strings: Arc<StringTable>) -> Self
    {
        Self {
            data,
            strings,
            line_strings,
            programs: MemoCache::new(),
        }
    }

    /// The program at `offset`, decoding it on first use.
    ///
    /// `unit_address_size` is the owning unit's address size, needed by
    /// pre-v5 headers.
    ///
    /// ## Errors
    ///
    /// Returns the decode error of the program; nothing is cached then.
    pub fn get(&self, offset: u64, unit_address_size: u8) -> DwarfResult<Arc<LineProgram>>
    {
        self.programs.get_or_try_insert_with(offset, || {
            let strings = HeaderStrings {
                strings: &self.strings,
                line_strings: &self.line_strings,
            };
            LineProgram::decode(&self.data, offset, unit_address_size, strings).map(Arc::new)
        })
    }

    /// Number of programs decoded so far.
    pub fn cached(&self) -> usize
    {
        self.programs.len()
    }
}
