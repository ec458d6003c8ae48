//! String sections (`.debug_str`, `.debug_line_str`).
//!
//! Producers merge strings that are suffixes of one another, so a valid
//! offset may point into the middle of a recorded string. Lookups that miss
//! the recorded offsets fall back to the nearest string starting before the
//! query and take its suffix.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::cache::MemoCache;

/// Offset-indexed view of a string section.
///
/// Bytes that are not valid UTF-8 are replaced lossily, but only after a
/// string has been cut out of the section, so offsets always count raw bytes.
pub struct StringTable
{
    data: Arc<[u8]>,
    /// Start offset of every string, mapped to its length in bytes.
    recorded: BTreeMap<u64, usize>,
    strings: MemoCache<u64, Arc<str>>,
}

impl StringTable
{
    /// Scan the whole section once, recording every null-terminated run.
    pub fn new(data: Arc<[u8]>) -> Self
    {
        let mut recorded = BTreeMap::new();
        let mut start = 0usize;
        while start < data.len() {
            let rest = &data[start..];
            let len = rest.iter().position(|byte| *byte == 0).unwrap_or(rest.len());
            recorded.insert(start as u64, len);
            start += len + 1;
        }

        Self {
            data,
            recorded,
            strings: MemoCache::new(),
        }
    }

    /// An empty table, used when an optional section is absent.
    pub fn empty() -> Self
    {
        Self {
            data: Arc::from(Vec::new()),
            recorded: BTreeMap::new(),
            strings: MemoCache::new(),
        }
    }

    /// Number of strings found by the initial scan.
    pub fn len(&self) -> usize
    {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.recorded.is_empty()
    }

    /// String starting at `offset`.
    ///
    /// Every lookup, direct or suffix, is memoized under the queried offset.
    pub fn get(&self, offset: u64) -> Option<Arc<str>>
    {
        if let Some(text) = self.strings.get(&offset) {
            return Some(text);
        }

        let (base, len) = self.recorded.range(..=offset).next_back()?;
        let delta = usize::try_from(offset - base).ok()?;
        if delta > 0 && delta >= *len {
            return None;
        }
        let base = usize::try_from(*base).ok()?;
        let whole = self.data.get(base..base + len)?;
        // a delta inside a multi-byte character has no string of its own
        if std::str::from_utf8(whole).is_ok_and(|text| !text.is_char_boundary(delta)) {
            return None;
        }
        let bytes = &whole[delta..];

        if delta > 0 {
            trace!(offset, base, "string table suffix lookup");
        }
        let text = String::from_utf8_lossy(bytes);
        Some(self.strings.insert(offset, Arc::from(text.as_ref())))
    }

    /// Number of distinct offsets memoized so far.
    pub fn memoized(&self) -> usize
    {
        self.strings.len()
    }
}
