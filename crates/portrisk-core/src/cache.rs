//! Time-bounded cache component.
//!
//! The analytics engines compute every result fresh per request. Layers above
//! the core that want caching inject a [`TtlCache`] and own its invalidation
//! policy; the cache is a standalone value store, decoupled from computation.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Configuration for a [`TtlCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry stays valid after insertion.
    pub ttl: Duration,
    /// Maximum number of live entries; inserting beyond this evicts the
    /// oldest entry first.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1024,
        }
    }
}

/// Key → (value, inserted-at) cache with TTL expiry and bounded capacity.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    config: CacheConfig,
    entries: HashMap<K, (V, Instant)>,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    /// Create a cache with the given policy.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// The active policy.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Number of entries, including any not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a value, evicting the oldest entry if at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Fetch a live value; an expired entry is removed and treated as a miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    /// Remove an entry, returning its value when present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(v, _)| v)
    }

    /// Drop every expired entry.
    pub fn purge_expired(&mut self) {
        let ttl = self.config.ttl;
        let now = Instant::now();
        self.entries
            .retain(|_, (_, inserted)| now.duration_since(*inserted) <= ttl);
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert_at(&mut self, key: K, value: V, now: Instant) {
        if self.entries.len() >= self.config.capacity && !self.entries.contains_key(&key) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, inserted))| *inserted)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (value, now));
    }

    fn get_at(&mut self, key: &K, now: Instant) -> Option<&V> {
        let expired = match self.entries.get(key) {
            Some((_, inserted)) => now.duration_since(*inserted) > self.config.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|(v, _)| v)
    }
}
