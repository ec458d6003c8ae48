//! # DWARF decoders
//!
//! Decoders for the `.debug_abbrev`, `.debug_info`, `.debug_line`,
//! `.debug_str` and `.debug_line_str` sections, versions 2 through 5.
//!
//! Format constants (forms, attributes, tags, opcodes) come from
//! `gimli::constants`; all decoding is done here.

pub mod abbrev;
pub mod entry;
pub mod form;
pub mod info;
pub mod line;
pub mod strings;
pub mod unit;

pub use abbrev::{AbbreviationDeclaration, AbbreviationTable, AttributeSpec};
pub use entry::{DebugInfoEntry, EntryContext};
pub use info::DebugInfoIndex;
pub use line::{FileEntry, LineProgram, LineProgramCache, LineProgramHeader, LineRow, LineRows};
pub use strings::StringTable;
pub use unit::CompilationUnit;

/// Layout parameters shared by every value in one unit or line program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding
{
    /// 64-bit DWARF (initial length escaped with `0xffffffff`).
    pub is64: bool,
    pub version: u16,
    /// Size of a target address in bytes.
    pub address_size: u8,
}

impl Encoding
{
    /// Size of a section offset in bytes.
    pub const fn offset_size(self) -> usize
    {
        if self.is64 {
            8
        } else {
            4
        }
    }

    /// Size of the initial-length field that introduced this unit.
    pub const fn initial_length_size(self) -> usize
    {
        if self.is64 {
            12
        } else {
            4
        }
    }
}

/// Oldest and newest DWARF versions this crate decodes.
pub const MIN_VERSION: u16 = 2;
pub const MAX_VERSION: u16 = 5;
