//! # dwarfline-core
//!
//! DWARF decoding and address-to-line resolution.
//!
//! This crate reads the `.debug_info`, `.debug_abbrev`, `.debug_line`,
//! `.debug_str` and `.debug_line_str` sections of an object file and maps
//! machine addresses back to source file, line and column. It handles DWARF
//! versions 2 through 5 in both the 32-bit and 64-bit formats.
//!
//! The decoders are written directly against the byte layout; `gimli` is used
//! only for its named constants and `object` only to pull sections out of
//! ELF, Mach-O and PE containers.
//!
//! ## Layout
//!
//! - [`reader`]: byte cursor and LEB128 decoding
//! - [`dwarf`]: abbreviations, units, entries, string tables and line programs
//! - [`cache`]: the at-most-once memoizing map behind every cache
//! - [`sections`]: where section bytes come from
//! - [`facade`]: [`DwarfLines`], the entry point most callers want
//!
//! ## Concurrency
//!
//! Decoding is synchronous. [`DwarfLines`] is `Send + Sync`, and every lazily
//! computed value is computed at most once even under contention.

pub mod cache;
pub mod dwarf;
pub mod error;
pub mod facade;
pub mod prelude;
pub mod reader;
pub mod sections;

pub use error::{DwarfError, DwarfResult};
pub use facade::{DwarfLines, LineLocation};
pub use sections::{ObjectSections, SectionProvider};
