//! Bounded memo of rendered math spans

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// SHA-256 of a span body.
pub type CacheKey = [u8; 32];

pub fn cache_key(body: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

/// Least-recently-used cache from span body to rendered SVG.
///
/// Safe to share between threads. The lock is never held while rendering, so
/// two threads missing on the same key both render and the last insert wins.
#[derive(Debug)]
pub struct RenderCache {
    capacity: usize,
    entries: Mutex<IndexMap<CacheKey, Arc<str>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RenderCache {
    /// A cache holding at most `capacity` entries. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // poisoning is ignored: every update leaves the map consistent
    fn lock(&self) -> MutexGuard<'_, IndexMap<CacheKey, Arc<str>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry and mark it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        let mut entries = self.lock();
        let found = match entries.get_index_of(key) {
            Some(idx) => {
                let last = entries.len() - 1;
                entries.move_index(idx, last);
                entries.get_index(last).map(|(_, v)| Arc::clone(v))
            }
            None => None,
        };
        drop(entries);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert or replace an entry, evicting the least recently used one when
    /// full.
    pub fn insert(&self, key: CacheKey, value: Arc<str>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        entries.shift_remove(&key);
        while entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value);
    }

    /// Return the cached value for `body`, or render and cache it.
    ///
    /// Failures are not cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        body: &str,
        render: impl FnOnce() -> Result<String, E>,
    ) -> Result<Arc<str>, E> {
        let key = cache_key(body);
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value: Arc<str> = Arc::from(render()?);
        self.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn keys_are_stable() {
        assert_eq!(cache_key("x^2"), cache_key("x^2"));
        assert_ne!(cache_key("x^2"), cache_key("x^3"));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = RenderCache::new(2);
        cache.insert(cache_key("a"), value("A"));
        cache.insert(cache_key("b"), value("B"));
        // touch a so b is the oldest
        assert!(cache.get(&cache_key("a")).is_some());
        cache.insert(cache_key("c"), value("C"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&cache_key("b")).is_none());
        assert_eq!(cache.get(&cache_key("a")).as_deref(), Some("A"));
        assert_eq!(cache.get(&cache_key("c")).as_deref(), Some("C"));
    }

    #[test]
    fn render_runs_once_per_key() {
        let cache = RenderCache::new(8);
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with("x", || {
                    calls += 1;
                    Ok::<_, ()>("<svg/>".to_string())
                })
                .unwrap();
            assert_eq!(&*v, "<svg/>");
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1, len: 1 });
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = RenderCache::new(8);
        let r = cache.get_or_try_insert_with("bad", || Err::<String, _>("nope"));
        assert_eq!(r, Err("nope"));
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = RenderCache::new(0);
        cache.insert(cache_key("a"), value("A"));
        assert!(cache.is_empty());
    }
}
