//! # Section Providers
//!
//! The decoders never touch object files directly. They ask a
//! [`SectionProvider`] for section bytes by canonical ELF name
//! (`.debug_info`, `.debug_line`, ...).
//!
//! Two providers are included:
//! - `HashMap<String, Vec<u8>>`, for tests and callers that extract sections
//!   themselves
//! - [`ObjectSections`], which reads an ELF, Mach-O, PE or Wasm object with the
//!   `object` crate, maps Mach-O `__debug_*` names and decompresses
//!   compressed sections

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use object::{Object, ObjectSection};
use tracing::debug;

use crate::error::{DwarfError, DwarfResult};

/// Source of raw section bytes.
pub trait SectionProvider
{
    /// Bytes of the section called `name`, or `None` if the object has no
    /// such section.
    ///
    /// ## Errors
    ///
    /// Fails only when the section exists but cannot be read.
    fn section(&self, name: &str) -> DwarfResult<Option<Arc<[u8]>>>;
}

impl SectionProvider for HashMap<String, Vec<u8>>
{
    fn section(&self, name: &str) -> DwarfResult<Option<Arc<[u8]>>>
    {
        Ok(self.get(name).map(|bytes| Arc::from(bytes.as_slice())))
    }
}

impl<P: SectionProvider + ?Sized> SectionProvider for &P
{
    fn section(&self, name: &str) -> DwarfResult<Option<Arc<[u8]>>>
    {
        (**self).section(name)
    }
}

/// Canonical name and the names it appears under in each container format.
const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
];

/// DWARF sections extracted from an object file.
///
/// Sections are copied out and decompressed at parse time, so the provider
/// does not borrow the file's bytes.
#[derive(Debug, Clone, Default)]
pub struct ObjectSections
{
    sections: HashMap<&'static str, Arc<[u8]>>,
}

impl ObjectSections
{
    /// Read and parse the object file at `path`.
    ///
    /// ## Errors
    ///
    /// - [`DwarfError::Io`] if the file cannot be read
    /// - see [`ObjectSections::parse`]
    pub fn open(path: impl AsRef<Path>) -> DwarfResult<Self>
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "read object file");
        Self::parse(&bytes)
    }

    /// Parse an in-memory object file.
    ///
    /// ## Errors
    ///
    /// - [`DwarfError::Object`] if `object` cannot parse the container or a
    ///   section fails to decompress
    /// - [`DwarfError::UnsupportedFeature`] for big-endian objects
    pub fn parse(data: &[u8]) -> DwarfResult<Self>
    {
        let file = object::File::parse(data)?;
        if !file.is_little_endian() {
            return Err(DwarfError::UnsupportedFeature(format!(
                "big-endian {:?} object",
                file.architecture()
            )));
        }

        let mut sections = HashMap::new();
        for (canonical, aliases) in DWARF_SECTIONS {
            if let Some(bytes) = load_section_bytes(&file, aliases)? {
                debug!(section = canonical, bytes = bytes.len(), "loaded section");
                sections.insert(*canonical, bytes);
            }
        }

        Ok(Self { sections })
    }

    /// Canonical names of the sections found.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_
    {
        self.sections.keys().copied()
    }
}

impl SectionProvider for ObjectSections
{
    fn section(&self, name: &str) -> DwarfResult<Option<Arc<[u8]>>>
    {
        Ok(self.sections.get(name).cloned())
    }
}

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> DwarfResult<Option<Arc<[u8]>>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| DwarfError::Object(format!("failed to read {name}: {err}")))?;
            return Ok(Some(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
                Cow::Owned(vec) => vec.into(),
            }));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_map_provider()
    {
        let mut map = HashMap::new();
        map.insert(".debug_str".to_string(), b"abc\0".to_vec());
        assert_eq!(map.section(".debug_str").unwrap().as_deref(), Some(&b"abc\0"[..]));
        assert!(map.section(".debug_info").unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_not_an_object()
    {
        assert!(matches!(
            ObjectSections::parse(b"definitely not an object file"),
            Err(DwarfError::Object(_))
        ));
    }

    #[test]
    fn test_missing_file()
    {
        assert!(matches!(
            ObjectSections::open("/nonexistent/dwarfline/object"),
            Err(DwarfError::Io(_))
        ));
    }
}
