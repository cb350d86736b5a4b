//! Byte-bounded in-memory LRU store
//!
//! Holds at most `capacity` bytes of values. Inserting past the budget evicts
//! least-recently-used entries until the new value fits. A single value
//! larger than the whole budget is still accepted and ends up alone in the
//! store.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::common::utils::format_bytes;

/// One cached blob
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    size: u64,
    /// Recency stamp, also the key into `Inner::order`
    tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// tick -> key, oldest first. Ticks are unique and strictly increasing,
    /// so ties in recency resolve by insertion order.
    order: BTreeMap<u64, String>,
    next_tick: u64,
    bytes: u64,
    evictions: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        self.bytes -= entry.size;
        Some(entry)
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.order.pop_first() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.bytes -= entry.size;
            self.evictions += 1;
            tracing::debug!(key = %key, size = entry.size, "evicted");
        }
        true
    }
}

/// Thread-safe LRU keyed by wire key
#[derive(Debug)]
pub struct LocalStore {
    capacity: i64,
    inner: Mutex<Inner>,
}

impl LocalStore {
    /// Create a store with a byte budget.
    ///
    /// A budget of zero or less disables caching: every `get` misses and
    /// `set` drops the value.
    pub fn new(capacity: i64) -> Self {
        if capacity <= 0 {
            tracing::warn!(
                capacity,
                "cache capacity is not positive, caching disabled; every request loads"
            );
        } else {
            tracing::debug!("local store budget {}", format_bytes(capacity as u64));
        }
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation keeps `Inner` consistent before it can panic, so a
        // poisoned lock still guards valid data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Look a key up, marking it most recently used on a hit
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if !self.is_enabled() {
            return None;
        }
        let mut inner = self.lock();
        let tick = inner.bump();
        let entry = inner.entries.get_mut(key)?;
        let old_tick = std::mem::replace(&mut entry.tick, tick);
        let value = entry.value.clone();
        inner.order.remove(&old_tick);
        inner.order.insert(tick, key.to_string());
        Some(value)
    }

    /// Insert or overwrite a key, marking it most recently used
    pub fn set(&self, key: &str, value: Bytes) {
        if !self.is_enabled() {
            return;
        }
        let size = value.len() as u64;
        let capacity = self.capacity as u64;

        let mut inner = self.lock();
        inner.remove(key);
        while inner.bytes + size > capacity {
            if !inner.evict_oldest() {
                break;
            }
        }
        if size > capacity {
            tracing::warn!(
                key = %key,
                size = %format_bytes(size),
                capacity = %format_bytes(capacity),
                "value larger than the whole cache budget"
            );
        }

        let tick = inner.bump();
        inner.order.insert(tick, key.to_string());
        inner.entries.insert(key.to_string(), CacheEntry { value, size, tick });
        inner.bytes += size;
    }

    /// Whether a key is present, without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of stored value sizes
    pub fn bytes(&self) -> u64 {
        self.lock().bytes
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Entries dropped to make room since construction
    pub fn evictions(&self) -> u64 {
        self.lock().evictions
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn blob(size: usize) -> Bytes {
        Bytes::from(vec![0u8; size])
    }

    #[test]
    fn test_set_get() {
        let store = LocalStore::new(1024);
        store.set("a", Bytes::from_static(b"hello"));
        assert_eq!(store.get("a").unwrap(), Bytes::from_static(b"hello"));
        assert!(store.get("b").is_none());
        assert_eq!(store.bytes(), 5);
    }

    #[test]
    fn test_eviction_sequence() {
        let store = LocalStore::new(100);

        store.set("A", blob(60));
        assert_eq!(store.keys(), vec!["A"]);

        store.set("B", blob(60));
        assert_eq!(store.keys(), vec!["B"]);
        assert!(!store.contains("A"));

        store.set("C", blob(30));
        assert_eq!(store.keys(), vec!["B", "C"]);
        assert_eq!(store.bytes(), 90);
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let store = LocalStore::new(100);
        store.set("A", blob(40));
        store.set("B", blob(40));
        store.get("A");

        store.set("C", blob(40));
        assert!(store.contains("A"));
        assert!(!store.contains("B"));
        assert!(store.contains("C"));
    }

    #[test]
    fn test_overwrite_updates_size() {
        let store = LocalStore::new(100);
        store.set("A", blob(80));
        store.set("A", blob(10));
        assert_eq!(store.bytes(), 10);
        assert_eq!(store.len(), 1);
        assert_eq!(store.evictions(), 0);
    }

    #[test]
    fn test_oversized_entry_evicts_everything() {
        let store = LocalStore::new(100);
        store.set("A", blob(30));
        store.set("B", blob(30));
        store.set("huge", blob(250));

        assert_eq!(store.keys(), vec!["huge"]);
        assert_eq!(store.bytes(), 250);

        // the next insert pushes the oversized value out again
        store.set("C", blob(10));
        assert_eq!(store.keys(), vec!["C"]);
    }

    #[test]
    fn test_disabled_store() {
        for capacity in [0, -5] {
            let store = LocalStore::new(capacity);
            store.set("A", blob(1));
            assert!(store.get("A").is_none());
            assert!(store.is_empty());
        }
    }

    #[test]
    fn test_budget_holds_under_concurrency() {
        let store = Arc::new(LocalStore::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k-{}", (t * 7 + i) % 50);
                        store.set(&key, blob(10 + (i % 90)));
                        store.get(&format!("k-{}", i % 50));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(store.bytes() <= 1000);
        assert_eq!(store.len(), store.keys().len());
    }
}
