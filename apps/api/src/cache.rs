use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Process-wide TTL cache for header-discovery results, dropdown option
/// lists, and the poll short-circuit hash.
///
/// Staleness only delays reconciliation, never corrupts it: sync always
/// re-validates against the authoritative snapshot, so there is no
/// cross-instance coherence requirement.
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached value if present and fresh; evicts stale entries
    /// on access (there is no background sweeper).
    pub fn get(&self, key: &str) -> Option<Value> {
        let stale = match self.entries.get(key) {
            Some(entry) => {
                if entry.stored_at.elapsed() < self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => return None,
        };
        if stale {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: &str, value: Value) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_entry_is_returned() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("k", json!({"v": 1}));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));
    }

    #[test]
    fn test_stale_entry_is_evicted() {
        let cache = TtlCache::new(Duration::from_millis(1));
        cache.put("k", json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.entries.len(), 0);
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("k", json!(1));
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }
}
