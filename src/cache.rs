//! Bounded, in-process caches shared by the verification engine.
//!
//! Both the Result Cache (address -> verdict) and the MX Cache
//! (domain -> MX records) are instances of the same [`BoundedCache`],
//! guarded by a single mutex per instance and backed by a periodic
//! full-flush timer. This mirrors the habit of wrapping a shared store
//! behind a small `Clone`-able handle (`RedisCache` previously), now
//! generalized to an in-process structure since nothing here needs to
//! survive a restart.
//!
//! Capacity eviction is FIFO by insertion order. Duplicate keys are
//! coalesced on insert (the value is replaced in place, the original
//! FIFO position is kept) rather than appended as a second entry; see
//! DESIGN.md for the reasoning.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Inner<V> {
    order: VecDeque<String>,
    entries: HashMap<String, V>,
    max_size: usize,
}

impl<V> Inner<V> {
    fn put(&mut self, key: String, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }

        if self.max_size == 0 {
            return;
        }

        if self.order.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    fn flush(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

/// A bounded, FIFO-evicting cache guarded by a single mutex.
///
/// Cloning a `BoundedCache` clones the handle, not the data: all clones
/// share the same backing store, matching how `RedisCache` is cloned
/// into each actix-web worker in the teacher.
#[derive(Clone)]
pub struct BoundedCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V: Clone + Send + 'static> BoundedCache<V> {
    /// Creates a cache with the given capacity. If `gc_frequency` is
    /// `Some` and non-zero, a background task is spawned that calls
    /// [`BoundedCache::flush_all`] on every tick for the lifetime of the
    /// process (it holds a strong clone of the handle, so the task never
    /// stops on its own).
    pub fn new(max_size: usize, gc_frequency: Option<Duration>) -> Self {
        let cache = Self {
            inner: Arc::new(Mutex::new(Inner {
                order: VecDeque::with_capacity(max_size.min(1024)),
                entries: HashMap::with_capacity(max_size.min(1024)),
                max_size,
            })),
        };

        if let Some(period) = gc_frequency {
            if !period.is_zero() {
                let flusher = cache.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.tick().await; // first tick fires immediately; skip it
                    loop {
                        ticker.tick().await;
                        flusher.flush_all();
                    }
                });
            }
        }

        cache
    }

    /// Returns a clone of the cached value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.get(key).cloned()
    }

    /// Inserts or replaces the entry for `key`, evicting the
    /// oldest-inserted entry if the cache is at capacity.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.put(key.into(), value);
    }

    /// Removes every entry.
    pub fn flush_all(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.flush();
    }

    /// Current number of entries. Exposed for tests that assert the
    /// capacity invariant.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_put_roundtrip() {
        let cache: BoundedCache<String> = BoundedCache::new(10, None);
        assert!(cache.get("a@x.test").is_none());
        cache.put("a@x.test", "OK".to_string());
        assert_eq!(cache.get("a@x.test"), Some("OK".to_string()));
    }

    #[test]
    fn fifo_eviction_at_capacity() {
        let cache: BoundedCache<i32> = BoundedCache::new(2, None);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest entry should be evicted");
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn duplicate_keys_are_coalesced() {
        let cache: BoundedCache<i32> = BoundedCache::new(2, None);
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn capacity_invariant_holds_after_many_inserts() {
        let cache: BoundedCache<i32> = BoundedCache::new(5, None);
        for i in 0..100 {
            cache.put(format!("key-{i}"), i);
            assert!(cache.len() <= 5);
        }
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn flush_all_clears_every_entry() {
        let cache: BoundedCache<i32> = BoundedCache::new(5, None);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.flush_all();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[tokio::test]
    async fn zero_frequency_timer_never_flushes() {
        let cache: BoundedCache<i32> = BoundedCache::new(5, Some(Duration::from_secs(0)));
        cache.put("a", 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_timer_flushes_on_schedule() {
        let cache: BoundedCache<i32> = BoundedCache::new(5, Some(Duration::from_secs(10)));
        cache.put("a", 1);
        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert!(cache.get("a").is_none());
    }
}
