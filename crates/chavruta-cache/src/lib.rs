#![allow(clippy::must_use_candidate)]

//! In-memory TTL + LRU keyed store
//!
//! Backs the shared tool-response cache and the web fetch cache.
//! Entries carry an absolute expiry; `get` purges expired entries
//! before answering, and `set` evicts the oldest entries while the
//! store is over capacity. The fetch-cache variant refreshes an
//! entry's position on every hit, yielding strict LRU on read; the
//! response cache keeps plain insertion order.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Shared tool-response cache: JSON payloads keyed by tool + args
pub type ResponseCache = TtlLruCache<serde_json::Value>;

/// Bounded keyed store with per-entry TTL
pub struct TtlLruCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    refresh_on_get: bool,
}

struct Inner<V> {
    /// Eviction order, oldest first
    order: VecDeque<String>,
    entries: HashMap<String, Entry<V>>,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V: Clone> TtlLruCache<V> {
    /// Insertion-order eviction (response cache behavior)
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, false)
    }

    /// Hits move the entry to the back of the order (fetch cache behavior)
    pub fn with_read_refresh(capacity: usize) -> Self {
        Self::build(capacity, true)
    }

    fn build(capacity: usize, refresh_on_get: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
            capacity: capacity.max(1),
            refresh_on_get,
        }
    }

    /// Look up a live entry
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.purge_expired(Instant::now());

        if !inner.entries.contains_key(key) {
            return None;
        }
        if self.refresh_on_get {
            inner.touch(key);
        }
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// Insert a value with the given TTL, evicting while over capacity
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        let replaced = inner
            .entries
            .insert(
                key.to_owned(),
                Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            )
            .is_some();

        if replaced {
            inner.touch(key);
        } else {
            inner.order.push_back(key.to_owned());
        }

        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Number of live entries (expired entries are purged first)
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.purge_expired(Instant::now());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Inner<V> {
    fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|_, e| e.expires_at > now);
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).expect("position just found");
            self.order.push_back(k);
        }
    }
}
