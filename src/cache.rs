use chrono::{DateTime, Utc};
use log::debug;
use std::collections::BTreeMap;

pub const TRANSACTIONS_KEY: &str = "transactions";

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
}

/// Query results keyed by request path. Entries are never evicted by the
/// workflow, only marked stale so the next read refetches.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                fetched_at: Utc::now(),
                stale: false,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Fresh value for `key`, or `None` when missing or stale.
    pub fn fresh(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries
            .get(key)
            .filter(|entry| !entry.stale)
            .map(|entry| &entry.value)
    }

    pub fn is_stale(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.stale)
    }

    /// Mark every entry whose key starts with `prefix` as stale. Returns the
    /// number of entries touched.
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let mut touched = 0;
        for (key, entry) in self.entries.range_mut(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            entry.stale = true;
            touched += 1;
        }
        debug!("Invalidated {} cached queries under '{}'", touched, prefix);
        touched
    }
}
