use std::sync::Arc;
use dashmap::DashMap;
use tracing::debug;
use crate::metadata::types::{DataKind, NormalizedRecord};
use crate::utils::utils_time::current_time_ms;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub kind: DataKind,
    pub records: Arc<Vec<NormalizedRecord>>,
    pub fetched_at_ms: u64,
}

impl CacheEntry {
    /// Empty listings are never fresh, so they get re-fetched.
    pub fn is_fresh_at(&self, now_ms: u64, ttl_ms: u64) -> bool {
        !self.records.is_empty() && now_ms.saturating_sub(self.fetched_at_ms) < ttl_ms
    }
}

/// Per-kind store of the last fetched listing. Stale entries stay until the
/// next successful fetch overwrites them.
pub struct MetadataCache {
    ttl_ms: u64,
    entries: DashMap<DataKind, CacheEntry>,
}

impl MetadataCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            entries: DashMap::new(),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn get(&self, kind: DataKind) -> Option<CacheEntry> {
        self.entries.get(&kind).map(|e| e.value().clone())
    }

    /// The entry, only when still fresh.
    pub fn get_fresh(&self, kind: DataKind) -> Option<CacheEntry> {
        let now = current_time_ms();
        self.get(kind).filter(|e| e.is_fresh_at(now, self.ttl_ms))
    }

    pub fn is_fresh(&self, kind: DataKind) -> bool {
        self.get_fresh(kind).is_some()
    }

    pub fn put(&self, kind: DataKind, records: Vec<NormalizedRecord>) -> CacheEntry {
        let entry = CacheEntry {
            kind,
            records: Arc::new(records),
            fetched_at_ms: current_time_ms(),
        };
        debug!("Cached {} {} records", entry.records.len(), kind);
        self.entries.insert(kind, entry.clone());
        entry
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
