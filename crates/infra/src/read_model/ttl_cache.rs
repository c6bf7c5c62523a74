use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;

/// Entries kept per cache before the least useful ones are evicted.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Invalidation count observed before a value was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

/// Bounded in-memory cache whose entries expire a fixed time after insertion.
///
/// A zero TTL disables caching entirely.
pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Option<Cache<K, V>>,
    invalidations: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, max_capacity: u64) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build()
        });
        Self {
            ttl,
            inner,
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.as_ref()?.get(key)
    }

    pub fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value);
        }
    }

    /// Take before reading the state a value is computed from.
    pub fn ticket(&self) -> FillTicket {
        FillTicket(self.invalidations.load(Ordering::SeqCst))
    }

    /// Cache a value computed after `ticket` was taken.
    ///
    /// If any invalidation ran since, the value may predate the write that
    /// caused it and is dropped again. Returns whether the value stayed cached.
    pub fn insert_unless_invalidated(&self, ticket: FillTicket, key: K, value: V) -> bool {
        let Some(cache) = &self.inner else {
            return false;
        };
        cache.insert(key.clone(), value);
        if self.invalidations.load(Ordering::SeqCst) != ticket.0 {
            cache.invalidate(&key);
            return false;
        }
        true
    }

    pub fn invalidate(&self, key: &K) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.inner {
            cache.invalidate(key);
        }
    }

    pub fn clear(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }

    /// Live entries, after pending evictions have run.
    pub fn len(&self) -> u64 {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count()
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("enabled", &self.inner.is_some())
            .finish_non_exhaustive()
    }
}
