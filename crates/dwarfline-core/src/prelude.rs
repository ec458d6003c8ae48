//! Common module for library exports

pub use crate::dwarf::{CompilationUnit, LineProgram, LineRow};
pub use crate::error::{DwarfError, DwarfResult};
pub use crate::facade::{DwarfLines, LineLocation};
pub use crate::sections::{ObjectSections, SectionProvider};
