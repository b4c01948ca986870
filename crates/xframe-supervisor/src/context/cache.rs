//! Result cache used to prime re-dispatched calls.

use std::collections::BTreeMap;

use xframe_protocol::{CacheKey, ResultCacheEntry};

/// Cached sub-call results, unique by composite key.
#[derive(Clone, Debug, Default)]
pub struct ResultCache {
    entries: BTreeMap<CacheKey, ResultCacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any entry with the same key.
    pub fn insert(&mut self, entry: ResultCacheEntry) {
        self.entries.insert(entry.key(), entry);
    }

    /// Entries that may be replayed to `service:plugin`.
    pub fn scoped_to(&self, service: &str, plugin: &str) -> Vec<ResultCacheEntry> {
        self.entries
            .values()
            .filter(|entry| entry.is_scoped_to(service, plugin))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
