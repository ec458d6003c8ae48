//! # Address-to-Line Resolution
//!
//! [`DwarfLines`] owns every decoded component of one object's debug
//! information and answers "which source line produced this address?".
//!
//! Loading is eager for unit headers and lazy for everything else: line
//! programs are decoded the first time a lookup needs them, and every lookup
//! result is memoized by address.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dwarfline_core::prelude::*;
//!
//! let sections = ObjectSections::open("target/debug/app")?;
//! let lines = DwarfLines::load(&sections)?;
//! if let Some(location) = lines.resolve_line(0x1_0000_3f40) {
//!     println!("{}:{}", location.file_path, location.line);
//! }
//! # Ok::<(), dwarfline_core::error::DwarfError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use gimli::constants::{self, DwAt};
use tracing::{debug, instrument, trace, warn};

use crate::cache::MemoCache;
use crate::dwarf::{AbbreviationTable, CompilationUnit, DebugInfoIndex, LineProgram, LineProgramCache, LineRow, StringTable};
use crate::error::{DwarfError, DwarfResult};
use crate::sections::SectionProvider;

/// Placeholder path for rows whose file register is 0.
pub const UNKNOWN_FILE: &str = "<unknown>";

/// Source position of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLocation
{
    /// Address of the matched row, which is at or below the queried address.
    pub address: u64,
    pub file_path: String,
    pub line: u64,
    pub column: u64,
    pub is_stmt: bool,
    pub end_sequence: bool,
    /// The full matched row.
    pub row: LineRow,
}

impl LineLocation
{
    fn from_row(program: &LineProgram, row: &LineRow) -> Self
    {
        LineLocation {
            address: row.address,
            file_path: program.file_path(row.file).unwrap_or_else(|| UNKNOWN_FILE.to_string()),
            line: u64::try_from(row.line).unwrap_or(0),
            column: row.column,
            is_stmt: row.is_stmt,
            end_sequence: row.end_sequence,
            row: *row,
        }
    }
}

impl fmt::Display for LineLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}:{}", self.file_path, self.line, self.column)
    }
}

/// Decoded debug information of one object, ready for line lookups.
///
/// `DwarfLines` is `Send + Sync`; share it behind an `Arc` to resolve from
/// several threads.
pub struct DwarfLines
{
    abbreviations: Arc<AbbreviationTable>,
    strings: Arc<StringTable>,
    line_strings: Arc<StringTable>,
    line_programs: Arc<LineProgramCache>,
    index: DebugInfoIndex,
    /// Line program each unit resolves against, by unit offset. `None` marks
    /// a unit that has no usable program, so it is reported and decoded once.
    unit_programs: MemoCache<usize, Option<Arc<LineProgram>>>,
    resolved: MemoCache<u64, Option<LineLocation>>,
}

fn required<P: SectionProvider + ?Sized>(provider: &P, name: &str) -> DwarfResult<Arc<[u8]>>
{
    match provider.section(name)? {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(DwarfError::SectionMissing(name.to_string())),
    }
}

impl DwarfLines
{
    /// Load the debug sections from `provider` and decode every unit header.
    ///
    /// ## Errors
    ///
    /// - [`DwarfError::SectionMissing`] if `.debug_abbrev`, `.debug_str`,
    ///   `.debug_line` or `.debug_info` is absent or empty
    /// - any error from decoding a unit header or its root entry
    #[instrument(level = "debug", skip_all)]
    pub fn load<P: SectionProvider + ?Sized>(provider: &P) -> DwarfResult<Self>
    {
        let abbrev = required(provider, ".debug_abbrev")?;
        let str_data = required(provider, ".debug_str")?;
        let line = required(provider, ".debug_line")?;
        let info = required(provider, ".debug_info")?;
        let line_str_data = provider.section(".debug_line_str")?;

        let abbreviations = Arc::new(AbbreviationTable::new(abbrev));
        let strings = Arc::new(StringTable::new(str_data));
        let line_strings = Arc::new(line_str_data.map_or_else(StringTable::empty, StringTable::new));
        let line_programs = Arc::new(LineProgramCache::new(line, Arc::clone(&strings), Arc::clone(&line_strings)));
        let index = DebugInfoIndex::decode(&info, &abbreviations, &line_programs)?;

        debug!(
            units = index.len(),
            strings = strings.len(),
            line_strings = line_strings.len(),
            "loaded DWARF"
        );

        Ok(Self {
            abbreviations,
            strings,
            line_strings,
            line_programs,
            index,
            unit_programs: MemoCache::new(),
            resolved: MemoCache::new(),
        })
    }

    /// Source position of `pc`.
    ///
    /// Every unit's rows are searched. A row exactly at `pc` wins at once;
    /// otherwise the row with the greatest address below `pc` across all units
    /// is returned. Units without a line program, or whose program fails to
    /// decode, are skipped; that outcome is remembered per unit.
    ///
    /// Results, including misses, are cached per address.
    pub fn resolve_line(&self, pc: u64) -> Option<LineLocation>
    {
        self.resolved.get_or_insert_with(pc, || self.search(pc))
    }

    fn search(&self, pc: u64) -> Option<LineLocation>
    {
        let mut best: Option<(Arc<LineProgram>, LineRow)> = None;
        for unit in self.index.iter() {
            let Some(program) = self.program_for(unit) else {
                continue;
            };
            let Some(row) = program.rows().find_nearest(pc).copied() else {
                continue;
            };

            if row.address == pc {
                trace!(pc, unit = unit.offset(), "exact row");
                return Some(LineLocation::from_row(&program, &row));
            }
            if best.as_ref().map_or(true, |(_, current)| row.address > current.address) {
                best = Some((program, row));
            }
        }

        let location = best.map(|(program, row)| LineLocation::from_row(&program, &row));
        trace!(pc, found = location.is_some(), "nearest row");
        location
    }

    fn program_for(&self, unit: &CompilationUnit) -> Option<Arc<LineProgram>>
    {
        self.unit_programs.get_or_insert_with(unit.offset(), || match unit.line_program() {
            Ok(Some(program)) => Some(program),
            Ok(None) => {
                warn!(unit = unit.offset(), "unit has no line program; skipping");
                None
            }
            Err(err) => {
                warn!(unit = unit.offset(), error = %err, "failed to decode line program; skipping");
                None
            }
        })
    }

    /// Units of `.debug_info` in section order.
    pub fn units(&self) -> &[CompilationUnit]
    {
        self.index.units()
    }

    /// Decoded line program of `unit`, or `None` without `DW_AT_stmt_list`.
    ///
    /// ## Errors
    ///
    /// Returns the program's decode error. Unlike [`DwarfLines::resolve_line`]
    /// this does not swallow failures.
    pub fn line_program(&self, unit: &CompilationUnit) -> DwarfResult<Option<Arc<LineProgram>>>
    {
        unit.line_program()
    }

    pub fn debug_str(&self) -> &StringTable
    {
        &self.strings
    }

    pub fn debug_line_str(&self) -> &StringTable
    {
        &self.line_strings
    }

    pub fn abbreviations(&self) -> &AbbreviationTable
    {
        &self.abbreviations
    }

    /// String attribute `name` of `unit`'s root entry.
    ///
    /// ## Errors
    ///
    /// Fails if the attribute uses a string form this crate cannot resolve.
    pub fn unit_string(&self, unit: &CompilationUnit, name: DwAt) -> DwarfResult<Option<Arc<str>>>
    {
        unit.root().string(name, &self.strings, &self.line_strings)
    }

    /// `DW_AT_name` of `unit`'s root entry, usually the primary source file.
    pub fn unit_name(&self, unit: &CompilationUnit) -> DwarfResult<Option<Arc<str>>>
    {
        self.unit_string(unit, constants::DW_AT_name)
    }

    /// Number of line programs decoded so far.
    pub fn decoded_programs(&self) -> usize
    {
        self.line_programs.cached()
    }

    /// Number of units that address lookups have found without a usable line
    /// program. Each is skipped without another decode attempt.
    pub fn skipped_units(&self) -> usize
    {
        self.index
            .iter()
            .filter(|unit| matches!(self.unit_programs.get(&unit.offset()), Some(None)))
            .count()
    }

    /// Number of addresses with a memoized lookup result.
    pub fn resolved_addresses(&self) -> usize
    {
        self.resolved.len()
    }
}

impl fmt::Debug for DwarfLines
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("DwarfLines")
            .field("units", &self.index.len())
            .field("decoded_programs", &self.line_programs.cached())
            .field("resolved", &self.resolved.len())
            .finish()
    }
}
