//! Generic TTL cache.
//!
//! Key-value store with per-entry expiry, used by the gateway for every
//! cacheable operation. Expiry is checked on read against the injected
//! clock; a read after the deadline behaves as a miss and drops the entry.
//! Background sweeping is an optimization, not a correctness requirement -
//! [`purge_expired`](TtlCache::purge_expired) exists for amortized cleanup
//! but `get` rechecks expiry regardless.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;

use crate::clock::Clock;

/// A single cached value with its expiry deadline.
///
/// Immutable once created; `set` replaces the entry wholesale.
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Thread-safe key-value cache with per-entry time-to-live.
///
/// Safe for concurrent readers and writers; all access serializes on an
/// internal mutex. The cache itself cannot fail - it only reports
/// presence or absence.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a stale or missing entry, which
    /// the expiry check already tolerates.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("TTL cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Look up a key, treating expired entries as absent.
    ///
    /// An expired entry is evicted on the spot; it is never returned.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock_entries();

        match entries.get(key) {
            Some(entry) if now > entry.expires_at => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store a value with the given time-to-live.
    ///
    /// Overwrites unconditionally - last write wins, no merge semantics.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::max_value());

        let mut entries = self.lock_entries();
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove a key regardless of expiry.
    pub fn delete(&self, key: &K) {
        let mut entries = self.lock_entries();
        entries.remove(key);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut entries = self.lock_entries();
        entries.clear();
    }

    /// Evict every expired entry, returning how many were dropped.
    ///
    /// Amortized cleanup for long-running processes; correctness does not
    /// depend on it being called.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    /// Number of entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ))
    }

    #[test]
    fn test_get_after_set_returns_value() {
        let clock = manual_clock();
        let cache: TtlCache<String, u32> = TtlCache::new(clock);

        cache.set("k".to_string(), 42, Duration::from_secs(60));
        assert_eq!(cache.get(&"k".to_string()), Some(42));
    }

    #[test]
    fn test_get_after_ttl_returns_absent() {
        let clock = manual_clock();
        let cache: TtlCache<String, u32> = TtlCache::new(clock.clone());

        cache.set("k".to_string(), 42, Duration::from_secs(60));
        clock.advance(chrono::Duration::seconds(61));

        assert_eq!(cache.get(&"k".to_string()), None);
        // Expired entry was evicted, not just hidden
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_exactly_at_ttl_still_fresh() {
        let clock = manual_clock();
        let cache: TtlCache<String, u32> = TtlCache::new(clock.clone());

        cache.set("k".to_string(), 42, Duration::from_secs(60));
        clock.advance(chrono::Duration::seconds(60));

        // Expiry is strict: now > expires_at
        assert_eq!(cache.get(&"k".to_string()), Some(42));
    }

    #[test]
    fn test_set_overwrites_unconditionally() {
        let clock = manual_clock();
        let cache: TtlCache<String, u32> = TtlCache::new(clock.clone());

        cache.set("k".to_string(), 1, Duration::from_secs(10));
        cache.set("k".to_string(), 2, Duration::from_secs(600));

        clock.advance(chrono::Duration::seconds(30));
        // The second write's TTL governs
        assert_eq!(cache.get(&"k".to_string()), Some(2));
    }

    #[test]
    fn test_delete_and_clear() {
        let clock = manual_clock();
        let cache: TtlCache<String, u32> = TtlCache::new(clock);

        cache.set("a".to_string(), 1, Duration::from_secs(60));
        cache.set("b".to_string(), 2, Duration::from_secs(60));

        cache.delete(&"a".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired_drops_only_expired() {
        let clock = manual_clock();
        let cache: TtlCache<String, u32> = TtlCache::new(clock.clone());

        cache.set("short".to_string(), 1, Duration::from_secs(10));
        cache.set("long".to_string(), 2, Duration::from_secs(600));

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"long".to_string()), Some(2));
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ));
        let cache: Arc<TtlCache<u32, u32>> = Arc::new(TtlCache::new(clock));

        let mut handles = Vec::new();
        for t in 0..4u32 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100u32 {
                    cache.set(i, t, Duration::from_secs(60));
                    let _ = cache.get(&i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every key was written by some thread and is readable
        assert_eq!(cache.len(), 100);
    }
}
