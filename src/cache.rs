//! Bounded, per-entry-TTL, LRU-evicted cache (spec §4.C).
//!
//! Built the same way the pack's `caching_layers` example builds its
//! from-scratch `LruCache<K, V>`: a `HashMap` for O(1) lookup plus a
//! `VecDeque` recency queue, rather than reaching for `dashmap` — the
//! single-writer-at-a-time critical section in spec §5 needs the LRU touch
//! and the expiry check to happen under one lock, which a plain concurrent
//! map can't give for free. The whole thing lives behind a single
//! `std::sync::Mutex`, matching the teacher's choice of `std::sync::Mutex`
//! over `parking_lot` for its own bounded in-memory state.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlLruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    capacity: usize,
    ttl: Duration,
    map: HashMap<K, Entry<V>>,
    order: VecDeque<K>,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                ttl,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// A miss is returned for both an absent key and a key whose TTL has
    /// lapsed — spec §4.C: "stale entries return a miss," not an error.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let hit = match inner.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if hit.is_some() {
            inner.touch(key);
        } else {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
        }
        hit
    }

    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap();
        inner.evict_if_full(&key);
        let expires_at = Instant::now() + inner.ttl;
        inner.map.insert(key.clone(), Entry { value, expires_at });
        inner.touch(&key);
    }

    pub fn invalidate(&self, key: &K) {
        let mut inner = self.inner.lock().unwrap();
        inner.map.remove(key);
        inner.order.retain(|k| k != key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn touch(&mut self, key: &K) {
        self.order.retain(|k| k != key);
        self.order.push_front(key.clone());
    }

    fn evict_if_full(&mut self, incoming: &K) {
        if self.map.contains_key(incoming) {
            return;
        }
        while self.map.len() >= self.capacity {
            match self.order.pop_back() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_miss() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(4, Duration::from_millis(10));
        cache.put("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(2, Duration::from_secs(60));
        cache.put("a", 1);
        cache.put("b", 2);
        // touch "a" so "b" becomes the least-recently-used entry
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn invalidate_forces_a_miss() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(4, Duration::from_secs(60));
        cache.put("a", 1);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
    }
}
