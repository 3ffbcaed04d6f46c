//! In-memory TTL cache over raw sheet rows.
//!
//! Purely a latency optimization in front of the remote row store: entries
//! are rebuilt from the store after a restart and are never a source of
//! truth. The TTL class is derived from the key itself (`headers` carries
//! the long TTL, per-day keys `day:<N>` the short one), so the key-naming
//! convention is part of the cache contract.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Raw cell grid as returned by the remote row store. Rows may be ragged.
pub type SheetRows = Vec<Vec<String>>;

struct CacheEntry {
    rows: SheetRows,
    stored_at: Instant,
}

/// Process-wide row cache, injected through `AppState` rather than held as a
/// module-level singleton so tests can build isolated instances.
pub struct Cache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    headers_ttl: Duration,
    day_ttl: Duration,
}

pub const HEADERS_KEY: &str = "headers";

impl Cache {
    pub fn new(headers_ttl: Duration, day_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            headers_ttl,
            day_ttl,
        }
    }

    pub fn day_key(day: u8) -> String {
        format!("day:{day}")
    }

    fn ttl_for(&self, key: &str) -> Duration {
        if key.starts_with(HEADERS_KEY) {
            self.headers_ttl
        } else {
            self.day_ttl
        }
    }

    /// Returns the cached rows for `key`, or `None` if never set or the TTL
    /// has elapsed. Expired entries are evicted as a side effect of the read.
    pub fn get(&self, key: &str) -> Option<SheetRows> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let expired = match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl_for(key),
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.rows.clone())
    }

    /// Stores `rows` under `key`, overwriting any prior entry.
    pub fn set(&self, key: &str, rows: SheetRows) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                rows,
                stored_at: Instant::now(),
            },
        );
    }

    /// Removes every entry whose key contains `substring`. Day keys embed a
    /// unique day number, so `day:<N>` targets exactly one day.
    pub fn invalidate_prefix(&self, substring: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|key, _| !key.contains(substring));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(label: &str) -> SheetRows {
        vec![vec![label.to_string()]]
    }

    #[test]
    fn test_get_returns_what_was_set() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.set("day:3", rows("a"));
        assert_eq!(cache.get("day:3"), Some(rows("a")));
    }

    #[test]
    fn test_get_absent_key() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(cache.get("day:1"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.set("day:1", rows("old"));
        cache.set("day:1", rows("new"));
        assert_eq!(cache.get("day:1"), Some(rows("new")));
    }

    #[test]
    fn test_zero_ttl_expires_on_read() {
        let cache = Cache::new(Duration::from_secs(60), Duration::ZERO);
        cache.set("day:1", rows("a"));
        assert_eq!(cache.get("day:1"), None);
    }

    #[test]
    fn test_headers_key_uses_long_ttl() {
        // Day TTL of zero expires day entries immediately; the headers entry
        // survives because its TTL class comes from the key prefix.
        let cache = Cache::new(Duration::from_secs(60), Duration::ZERO);
        cache.set(HEADERS_KEY, rows("h"));
        cache.set("day:1", rows("d"));
        assert_eq!(cache.get(HEADERS_KEY), Some(rows("h")));
        assert_eq!(cache.get("day:1"), None);
    }

    #[test]
    fn test_invalidate_prefix_targets_one_day() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.set("day:1", rows("a"));
        cache.set("day:10", rows("b"));
        cache.set(HEADERS_KEY, rows("h"));
        cache.invalidate_prefix("day:10");
        assert_eq!(cache.get("day:1"), Some(rows("a")));
        assert_eq!(cache.get("day:10"), None);
        assert_eq!(cache.get(HEADERS_KEY), Some(rows("h")));
    }

    #[test]
    fn test_invalidate_prefix_matches_substring() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.set("day:2", rows("a"));
        cache.set(HEADERS_KEY, rows("h"));
        cache.invalidate_prefix("day:");
        assert_eq!(cache.get("day:2"), None);
        assert_eq!(cache.get(HEADERS_KEY), Some(rows("h")));
    }
}
