//! Index of every unit in `.debug_info`.

use std::sync::Arc;

use tracing::debug;

use super::abbrev::AbbreviationTable;
use super::line::LineProgramCache;
use super::unit::CompilationUnit;
use crate::error::DwarfResult;
use crate::reader::ByteCursor;

/// Units of `.debug_info` in section order.
#[derive(Debug, Default, Clone)]
pub struct DebugInfoIndex
{
    units: Vec<CompilationUnit>,
}

impl DebugInfoIndex
{
    /// Decode unit headers back to back from offset 0 until the section is
    /// exhausted.
    ///
    /// ## Errors
    ///
    /// The first unit that fails to decode aborts the whole walk, since the
    /// position of every later unit depends on it.
    pub fn decode(data: &[u8], abbreviations: &AbbreviationTable, line_programs: &Arc<LineProgramCache>) -> DwarfResult<Self>
    {
        let mut cursor = ByteCursor::new(data);
        let mut units = Vec::new();
        while !cursor.is_at_end() {
            units.push(CompilationUnit::decode(&mut cursor, abbreviations, line_programs)?);
        }

        debug!(units = units.len(), bytes = data.len(), "indexed .debug_info");
        Ok(Self { units })
    }

    pub fn units(&self) -> &[CompilationUnit]
    {
        &self.units
    }

    pub fn len(&self) -> usize
    {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.units.is_empty()
    }

    /// Unit whose header starts at `offset`.
    pub fn unit_at(&self, offset: usize) -> Option<&CompilationUnit>
    {
        self.units
            .binary_search_by_key(&offset, CompilationUnit::offset)
            .ok()
            .map(|index| &self.units[index])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompilationUnit>
    {
        self.units.iter()
    }
}
