//! # Byte-Bounded LRU Cache
//!
//! Couples [`RobinHoodMap`] (key -> list node) with [`CircularList`] (recency
//! order, holding the actual entry) to give O(1) lookup-with-promotion and
//! O(1) tail eviction, bounded by total entry size rather than entry count.
//! This mirrors `cache.c`'s `cache_t`, which wires the same two structures
//! together by hand.
//!
//! Unlike `cache.c`, the hit path is split into [`Cache::peek`] (no
//! mutation) and [`Cache::touch`] (recency bump only). The original performs
//! both in one call while holding a single lock; here the caller is expected
//! to `peek` under the read-admission phase of an
//! [`crate::admission::AdmissionQueue`] to serve the response body, then
//! `touch` under a short write-admission phase once the response has been
//! written. See `SPEC_FULL.md` for why the two are no longer fused.

use std::collections::HashSet;

use crate::hashmap::RobinHoodMap;
use crate::list::{CircularList, NodeId};

struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
}

/// A byte-bounded, duplicate-rejecting LRU cache.
pub struct Cache {
    map: RobinHoodMap<NodeId>,
    list: CircularList<Entry>,
    size: usize,
    max_size: usize,
}

impl Cache {
    /// Creates a cache that holds at most `max_size` bytes across all
    /// stored values. A cache with `max_size == 0` accepts no entries.
    pub fn new(max_size: usize) -> Self {
        Cache {
            map: RobinHoodMap::new(1),
            list: CircularList::new(),
            size: 0,
            max_size,
        }
    }

    /// Total bytes currently held across all values.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Looks up `key` without affecting recency order. Returns a copy of the
    /// cached bytes, since the lock guarding the cache is expected to be
    /// released before the caller streams them to a client.
    pub fn peek(&self, key: &[u8]) -> Option<Vec<u8>> {
        let node = *self.map.get(key)?;
        Some(self.list.get(node).value.clone())
    }

    /// Returns true if `key` is present, without affecting recency order.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.get(key).is_some()
    }

    /// Promotes `key` to most-recently-used. No-op if `key` is absent (it
    /// may have been evicted between a `peek` and the matching `touch`).
    pub fn touch(&mut self, key: &[u8]) {
        if let Some(&node) = self.map.get(key) {
            self.list.move_to_head(node);
        }
    }

    /// Inserts `key` -> `value`, evicting least-recently-used entries as
    /// needed to stay within `max_size`. A duplicate key is a no-op: the
    /// specification's scenario S6 (re-inserting an already-cached URI)
    /// leaves the existing entry, and its position, untouched. Returns
    /// `true` if the value was stored.
    ///
    /// Values larger than `max_size` can never fit and are rejected even
    /// after evicting everything else.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> bool {
        if self.max_size == 0 || value.len() > self.max_size {
            return false;
        }
        if self.map.get(key).is_some() {
            return false;
        }

        while self.size + value.len() > self.max_size {
            match self.evict_one() {
                Some(_) => {}
                None => return false,
            }
        }

        self.size += value.len();
        let node = self.list.insert(Entry {
            key: key.to_vec(),
            value,
        });
        self.map
            .insert(key, node)
            .expect("bounded by evictions above, never exceeds hashmap's own limit");
        true
    }

    /// Removes `key` entirely, returning its value if present.
    pub fn delete(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let node = self.map.remove(key)?;
        let entry = self.list.delete(node);
        self.size -= entry.value.len();
        Some(entry.value)
    }

    /// Returns the key set as seen through the map (a full bin scan) and
    /// through the list (one head-to-tail walk). The two are expected to
    /// always agree; exposed so tests outside this module can check that
    /// directly instead of re-deriving it from `peek`/`contains`.
    pub fn map_and_list_keys(&self) -> (HashSet<Vec<u8>>, HashSet<Vec<u8>>) {
        let mut map_keys = HashSet::new();
        for i in 0..self.map.capacity() {
            if let Some((_, key, _)) = self.map.bin_at(i) {
                map_keys.insert(key.to_vec());
            }
        }
        let list_keys = self.list.iter().map(|entry| entry.key.clone()).collect();
        (map_keys, list_keys)
    }

    /// Evicts the least-recently-used entry. Returns its key, or `None` if
    /// the cache is empty.
    fn evict_one(&mut self) -> Option<Vec<u8>> {
        let tail = self.list.tail()?;
        let entry = self.list.delete(tail);
        self.map.remove(&entry.key);
        self.size -= entry.value.len();
        Some(entry.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_peek_round_trip() {
        let mut cache = Cache::new(1024);
        assert!(cache.insert(b"/a", b"hello".to_vec()));
        assert_eq!(cache.peek(b"/a"), Some(b"hello".to_vec()));
        assert_eq!(cache.size(), 5);
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        // S6: re-inserting an already-cached key must not change its value
        // or its recency position.
        let mut cache = Cache::new(1024);
        cache.insert(b"/a", b"first".to_vec());
        cache.insert(b"/b", b"second".to_vec());

        let inserted = cache.insert(b"/a", b"replacement".to_vec());
        assert!(!inserted);
        assert_eq!(cache.peek(b"/a"), Some(b"first".to_vec()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn eviction_respects_max_size_and_lru_order() {
        let mut cache = Cache::new(10);
        assert!(cache.insert(b"/a", b"aaaaa".to_vec())); // 5 bytes
        assert!(cache.insert(b"/b", b"bbbbb".to_vec())); // 5 bytes, now full

        // Touch /a so /b becomes the eviction candidate.
        cache.touch(b"/a");
        assert!(cache.insert(b"/c", b"ccccc".to_vec()));

        assert_eq!(cache.peek(b"/b"), None, "/b should have been evicted");
        assert_eq!(cache.peek(b"/a"), Some(b"aaaaa".to_vec()));
        assert_eq!(cache.peek(b"/c"), Some(b"ccccc".to_vec()));
        assert_eq!(cache.size(), 10);
    }

    #[test]
    fn value_larger_than_max_size_is_rejected() {
        let mut cache = Cache::new(4);
        assert!(!cache.insert(b"/big", b"12345".to_vec()));
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_size_cache_accepts_nothing() {
        let mut cache = Cache::new(0);
        assert!(!cache.insert(b"/a", Vec::new()));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn delete_frees_space_for_later_inserts() {
        let mut cache = Cache::new(5);
        cache.insert(b"/a", b"aaaaa".to_vec());
        assert_eq!(cache.delete(b"/a"), Some(b"aaaaa".to_vec()));
        assert_eq!(cache.size(), 0);
        assert!(cache.insert(b"/b", b"bbbbb".to_vec()));
    }

    #[test]
    fn touch_on_absent_key_is_harmless() {
        let mut cache = Cache::new(1024);
        cache.touch(b"/missing");
    }
}
