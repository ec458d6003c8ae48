//! # Memo Cache
//!
//! Compute-or-fetch map shared by every cache in this crate.
//!
//! The abbreviation table, the line program cache, the string tables and the
//! facade's pc-to-line cache all memoize on first access and never evict. They
//! all use [`MemoCache`], which guarantees that a value is computed at most once
//! per key even when several threads ask for the same key at the same time.
//!
//! ## Usage
//!
//! ```rust
//! use dwarfline_core::cache::MemoCache;
//!
//! let cache: MemoCache<u64, String> = MemoCache::new();
//! let value = cache.get_or_insert_with(7, || "seven".to_string());
//! assert_eq!(value, "seven");
//!
//! // Second access is served from the cache; the closure never runs.
//! let again = cache.get_or_insert_with(7, || unreachable!());
//! assert_eq!(again, "seven");
//! ```
//!
//! ## Thread Safety
//!
//! The map itself sits behind a `Mutex` that is held only long enough to find
//! or create the per-key cell. The value is then computed inside the cell's
//! `OnceCell::get_or_try_init`, so a slow computation for one key never blocks
//! lookups of another key, and racing callers for the same key wait for the
//! first one instead of computing twice.
//!
//! A computation that fails leaves the cell empty; the next caller retries.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;

/// Memoizing map with at-most-once computation per key.
pub struct MemoCache<K, V>
{
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for MemoCache<K, V>
{
    fn default() -> Self
    {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> fmt::Debug for MemoCache<K, V>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("MemoCache").field("entries", &self.lock().len()).finish()
    }
}

impl<K, V> MemoCache<K, V>
{
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>>
    {
        // a panic inside a computation never leaves the map itself inconsistent
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of keys holding a computed value.
    pub fn len(&self) -> usize
    {
        self.lock().values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn cell(&self, key: K) -> Arc<OnceCell<V>>
    {
        self.lock().entry(key).or_default().clone()
    }

    /// Cached value for `key`, if one has been computed.
    pub fn get(&self, key: &K) -> Option<V>
    {
        self.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Fetch the value for `key`, computing it with `init` on first access.
    ///
    /// ## Errors
    ///
    /// Returns whatever `init` returns. Failures are not cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.cell(key).get_or_try_init(init).cloned()
    }

    /// Fetch the value for `key`, computing it with `init` on first access.
    pub fn get_or_insert_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.cell(key).get_or_init(init).clone()
    }

    /// Store `value` unless the key already holds one. Returns the value that
    /// ends up cached.
    pub fn insert(&self, key: K, value: V) -> V
    {
        self.get_or_insert_with(key, || value)
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn test_memoizes_first_value()
    {
        let cache: MemoCache<u32, u32> = MemoCache::new();
        assert_eq!(cache.get_or_insert_with(1, || 10), 10);
        assert_eq!(cache.get_or_insert_with(1, || 20), 10);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached()
    {
        let cache: MemoCache<u32, u32> = MemoCache::new();
        let first: Result<u32, &str> = cache.get_or_try_insert_with(1, || Err("boom"));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<u32, &str> = cache.get_or_try_insert_with(1, || Ok(5));
        assert_eq!(second, Ok(5));
    }

    #[test]
    fn test_insert_keeps_existing()
    {
        let cache: MemoCache<&str, u8> = MemoCache::new();
        assert_eq!(cache.insert("a", 1), 1);
        assert_eq!(cache.insert("a", 2), 1);
    }

    #[test]
    fn test_computes_once_under_contention()
    {
        let cache: Arc<MemoCache<u32, u32>> = Arc::new(MemoCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache.get_or_insert_with(42, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        7
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
