//! # Error Types
//!
//! Error handling for DWARF decoding.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use gimli::constants::DwForm;
use thiserror::Error;

/// Main error type for DWARF decoding operations
///
/// Every decoder in this crate returns one of these. A failure aborts the
/// compilation unit or line program being decoded; nothing is retried.
///
/// ## Error Categories
///
/// 1. **Load errors**: SectionMissing, Object, Io
/// 2. **Malformed input**: Decoding, OutOfRange
/// 3. **Unimplemented encodings**: UnsupportedForm, UnsupportedWidth, UnsupportedFeature
#[derive(Error, Debug)]
pub enum DwarfError
{
    /// A required section is absent or empty
    ///
    /// `.debug_abbrev`, `.debug_str`, `.debug_line` and `.debug_info` must
    /// all be present with a non-zero size. `.debug_line_str` is optional.
    #[error("Required section '{0}' not found or empty")]
    SectionMissing(String),

    /// The input does not follow the DWARF grammar
    ///
    /// Examples:
    /// - An entry references an abbreviation code that is not declared
    /// - A line program declares a line range of zero
    /// - A reserved initial-length value
    #[error("DWARF decoding error: {0}")]
    Decoding(String),

    /// An attribute uses a form this decoder cannot measure or interpret
    #[error("Unsupported attribute form {0}")]
    UnsupportedForm(DwForm),

    /// The input uses a DWARF feature that is deliberately not handled
    ///
    /// Split DWARF and supplementary object files reference data in another
    /// file. These are rejected instead of being silently ignored.
    #[error("Unsupported DWARF feature: {0}")]
    UnsupportedFeature(String),

    /// An address or integer width other than the ones DWARF allows
    #[error("Unsupported value width: {0} bytes")]
    UnsupportedWidth(u8),

    /// A read ran past the end of the buffer
    #[error("Read of {wanted} bytes at offset 0x{offset:x} is out of range (buffer length {len})")]
    OutOfRange
    {
        /// Cursor position where the read started
        offset: usize,
        /// Number of bytes the read needed
        wanted: usize,
        /// Total length of the buffer
        len: usize,
    },

    /// The object-file container could not be parsed
    #[error("Object file error: {0}")]
    Object(String),

    /// I/O error while reading an object file from disk
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<object::Error> for DwarfError
{
    fn from(err: object::Error) -> Self
    {
        DwarfError::Object(err.to_string())
    }
}

/// Convenience type alias for `Result<T, DwarfError>`
///
/// ```rust
/// use dwarfline_core::error::DwarfResult;
/// fn foo() -> DwarfResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type DwarfResult<T> = std::result::Result<T, DwarfError>;
