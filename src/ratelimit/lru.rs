//! Bounded least-recently-used map with per-entry time-to-live.
//!
//! Entries live in a `Vec` and are threaded onto an index-linked recency
//! list; a `HashMap` maps keys to their slot. Removal uses `swap_remove`,
//! so the node that moves into the freed slot has its neighbours and map
//! entry patched up. The head of the list is the most recently used entry
//! and the tail is the eviction candidate.

use std::collections::HashMap;
use std::hash::Hash;

struct Node<K, V> {
    key: K,
    value: V,
    /// Epoch milliseconds at which this entry stops being visible
    expires_at: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A fixed-capacity LRU map whose entries expire `ttl_ms` after they were
/// last written.
///
/// Expiry is checked at read time, so an expired entry that has not yet been
/// evicted or purged is still reported as absent.
pub struct LruCache<K, V> {
    map: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    ttl_ms: u64,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
            ttl_ms,
        }
    }

    /// Look up a live entry and mark it most recently used.
    ///
    /// An expired entry is dropped and `None` is returned.
    pub fn get(&mut self, key: &K, now: u64) -> Option<&V> {
        let idx = *self.map.get(key)?;
        if self.nodes[idx].expires_at <= now {
            self.remove_at(idx);
            return None;
        }
        self.touch(idx);
        Some(&self.nodes[idx].value)
    }

    /// Look up a live entry without touching recency.
    pub fn peek(&self, key: &K, now: u64) -> Option<&V> {
        let idx = *self.map.get(key)?;
        let node = &self.nodes[idx];
        (node.expires_at > now).then_some(&node.value)
    }

    /// Insert or replace an entry, restarting its time-to-live and marking it
    /// most recently used.
    ///
    /// When a new key arrives at capacity, the least recently used entry is
    /// removed first and handed back.
    pub fn insert(&mut self, key: K, value: V, now: u64) -> Option<(K, V)> {
        let expires_at = now.saturating_add(self.ttl_ms);

        if let Some(&idx) = self.map.get(&key) {
            let node = &mut self.nodes[idx];
            node.value = value;
            node.expires_at = expires_at;
            self.touch(idx);
            return None;
        }

        let evicted = match self.tail {
            Some(lru) if self.nodes.len() >= self.capacity => Some(self.remove_at(lru)),
            _ => None,
        };

        let idx = self.nodes.len();
        self.nodes.push(Node {
            key: key.clone(),
            value,
            expires_at,
            prev: None,
            next: None,
        });
        self.map.insert(key, idx);
        self.push_front(idx);

        evicted
    }

    /// Remove an entry regardless of its expiry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = *self.map.get(key)?;
        Some(self.remove_at(idx).1)
    }

    /// Drop every entry whose time-to-live has elapsed. Returns how many
    /// entries were removed.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let expired: Vec<K> = self
            .nodes
            .iter()
            .filter(|node| node.expires_at <= now)
            .map(|node| node.key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Number of physically held entries, expired or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;

        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(idx);
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn remove_at(&mut self, idx: usize) -> (K, V) {
        self.unlink(idx);
        let node = self.nodes.swap_remove(idx);
        self.map.remove(&node.key);

        // The former last node now occupies `idx`
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.map.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }

        (node.key, node.value)
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    fn keys_by_recency(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.nodes[idx].key.clone());
            cursor = self.nodes[idx].next;
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = LruCache::new(4, 1000);
        cache.insert("a", 1, 0);

        assert_eq!(cache.get(&"a", 10), Some(&1));
        assert_eq!(cache.get(&"b", 10), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(2, 1000);
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 0);

        let evicted = cache.insert("c", 3, 0);

        assert_eq!(evicted, Some(("a", 1)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys_by_recency(), vec!["c", "b"]);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(2, 1000);
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 0);

        // "a" becomes most recently used, so "b" is evicted instead
        cache.get(&"a", 1);
        let evicted = cache.insert("c", 3, 1);

        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(cache.keys_by_recency(), vec!["c", "a"]);
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let mut cache = LruCache::new(2, 1000);
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 0);

        assert_eq!(cache.peek(&"a", 1), Some(&1));
        let evicted = cache.insert("c", 3, 1);

        assert_eq!(evicted, Some(("a", 1)));
    }

    #[test]
    fn test_replace_existing_key_does_not_evict() {
        let mut cache = LruCache::new(2, 1000);
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 0);

        assert_eq!(cache.insert("a", 10, 5), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&"a", 5), Some(&10));
        assert_eq!(cache.keys_by_recency(), vec!["a", "b"]);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let mut cache = LruCache::new(4, 100);
        cache.insert("a", 1, 0);

        assert_eq!(cache.peek(&"a", 99), Some(&1));
        assert_eq!(cache.peek(&"a", 100), None);
        // Still physically present until a mutable read drops it
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a", 100), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_restarts_ttl() {
        let mut cache = LruCache::new(4, 100);
        cache.insert("a", 1, 0);
        cache.insert("a", 2, 80);

        assert_eq!(cache.peek(&"a", 150), Some(&2));
        assert_eq!(cache.peek(&"a", 180), None);
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = LruCache::new(8, 100);
        cache.insert("old1", 1, 0);
        cache.insert("old2", 2, 10);
        cache.insert("fresh", 3, 90);

        let purged = cache.purge_expired(150);

        assert_eq!(purged, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek(&"fresh", 150), Some(&3));
        assert_eq!(cache.keys_by_recency(), vec!["fresh"]);
    }

    #[test]
    fn test_remove_keeps_links_consistent() {
        let mut cache = LruCache::new(8, 1000);
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            cache.insert(*key, i, 0);
        }

        // Removing from the middle moves the last slot into the hole
        assert_eq!(cache.remove(&"b"), Some(1));
        assert_eq!(cache.remove(&"b"), None);
        assert_eq!(cache.keys_by_recency(), vec!["e", "d", "c", "a"]);

        cache.get(&"a", 1);
        assert_eq!(cache.keys_by_recency(), vec!["a", "e", "d", "c"]);

        assert_eq!(cache.remove(&"c"), Some(2));
        assert_eq!(cache.remove(&"a"), Some(0));
        assert_eq!(cache.keys_by_recency(), vec!["e", "d"]);
        assert_eq!(cache.get(&"d", 1), Some(&3));
        assert_eq!(cache.get(&"e", 1), Some(&4));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = LruCache::new(0, 1000);
        assert_eq!(cache.capacity(), 1);

        cache.insert("a", 1, 0);
        let evicted = cache.insert("b", 2, 0);

        assert_eq!(evicted, Some(("a", 1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = LruCache::new(4, 1000);
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 0);

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a", 0), None);
        cache.insert("c", 3, 0);
        assert_eq!(cache.keys_by_recency(), vec!["c"]);
    }
}
