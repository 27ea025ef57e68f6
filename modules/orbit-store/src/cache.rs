use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::OnceCell;

/// Default freshness window for cached reads.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    value: Value,
    fetched_at: Instant,
}

/// Per-process read cache with a fixed TTL and an in-flight fetch registry.
///
/// The registry maps a path to the cell that the winning fetcher fills, so
/// concurrent misses for the same path share one backing fetch instead of
/// racing. Staleness up to the TTL is accepted; there is no cross-process
/// invalidation signal.
pub struct ReadCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<Option<Value>>>>>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value, if present and within the TTL. Stale entries are
    /// evicted on the way out.
    pub fn get_fresh(&self, path: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        match entries.get(path) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(path);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, path: &str, value: Value) {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.insert(
            path.to_string(),
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn evict(&self, path: &str) {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.remove(path);
    }

    /// The shared cell for an in-flight fetch of `path`, registering a new
    /// one if none is pending.
    pub fn inflight_cell(&self, path: &str) -> Arc<OnceCell<Option<Value>>> {
        let mut inflight = self.inflight.lock().expect("cache poisoned");
        inflight
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Drop the registry entry once its fetch has settled. Only the cell
    /// that was registered is removed — a later fetch may already have
    /// re-registered.
    pub fn clear_inflight(&self, path: &str, cell: &Arc<OnceCell<Option<Value>>>) {
        let mut inflight = self.inflight.lock().expect("cache poisoned");
        if let Some(current) = inflight.get(path) {
            if Arc::ptr_eq(current, cell) {
                inflight.remove(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_entry_served_until_ttl() {
        let cache = ReadCache::new(Duration::from_secs(60));
        cache.insert("a", json!({"k": 1}));
        assert_eq!(cache.get_fresh("a"), Some(json!({"k": 1})));
    }

    #[test]
    fn zero_ttl_never_serves() {
        let cache = ReadCache::new(Duration::ZERO);
        cache.insert("a", json!(1));
        assert_eq!(cache.get_fresh("a"), None);
    }

    #[test]
    fn evict_removes_entry() {
        let cache = ReadCache::new(Duration::from_secs(60));
        cache.insert("a", json!(1));
        cache.evict("a");
        assert_eq!(cache.get_fresh("a"), None);
    }

    #[test]
    fn inflight_cell_is_shared_then_cleared() {
        let cache = ReadCache::new(Duration::from_secs(60));
        let first = cache.inflight_cell("a");
        let second = cache.inflight_cell("a");
        assert!(Arc::ptr_eq(&first, &second));

        cache.clear_inflight("a", &first);
        let third = cache.inflight_cell("a");
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
