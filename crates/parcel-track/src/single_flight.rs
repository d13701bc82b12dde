//! Single-flight resolution cache.
//!
//! Concurrent callers asking for the same key share one in-flight lookup.
//! Successful lookups stay cached for later callers; failed ones are dropped
//! so the next caller starts fresh.
//!
//! ## Retention
//!
//! The cache holds at most `capacity` settled entries. Every insertion is
//! followed by eviction of the least-recently-inserted settled entries until
//! the bound holds; a lookup still in flight is kept until it settles.
//! An optional TTL makes resolved entries stale; a stale entry is replaced
//! on the next request for its key.

use crate::error::TrackResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

type SharedLookup<V> = Shared<BoxFuture<'static, TrackResult<V>>>;

struct Entry<V: Clone> {
    /// Distinguishes this entry from later ones under the same key.
    id: u64,
    lookup: SharedLookup<V>,
    inserted_at: Instant,
}

impl<V: Clone> Entry<V> {
    /// Whether new callers may join this entry.
    fn is_usable(&self, ttl: Option<Duration>) -> bool {
        match self.lookup.peek() {
            None => true,
            Some(Err(_)) => false,
            Some(Ok(_)) => ttl.map_or(true, |ttl| self.inserted_at.elapsed() < ttl),
        }
    }
}

struct Inner<K, V: Clone> {
    entries: HashMap<K, Entry<V>>,
    /// Insertion order, oldest first. Mirrors `entries` exactly.
    order: VecDeque<(K, u64)>,
    next_id: u64,
}

/// Bounded cache that de-duplicates concurrent lookups per key.
pub struct SingleFlightCache<K, V: Clone> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Option<Duration>,
}

/// Result of claiming an entry for a key.
struct Claim<V: Clone> {
    id: u64,
    lookup: SharedLookup<V>,
    /// True when the lookup was started by another caller.
    joined: bool,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_id: 0,
            }),
            capacity: capacity.max(1),
            ttl: None,
        }
    }

    /// Treat resolved entries older than `ttl` as absent.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Resolve `key`, sharing any lookup already in flight for it.
    ///
    /// `resolver` is only called when no usable entry exists. If a shared
    /// lookup started by someone else fails, this caller evicts it and tries
    /// once more with a fresh entry; that retry is itself shared with any
    /// other caller retrying at the same time.
    pub async fn resolve<F, Fut>(&self, key: &K, resolver: F) -> TrackResult<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = TrackResult<V>> + Send + 'static,
    {
        let claim = self.claim(key, &resolver);
        match claim.lookup.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.forget(key, claim.id);
                if !claim.joined {
                    return Err(e);
                }
                tracing::debug!(?key, error = %e, "shared lookup failed, retrying");
                let retry = self.claim(key, &resolver);
                let result = retry.lookup.await;
                if result.is_err() {
                    self.forget(key, retry.id);
                }
                result
            }
        }
    }

    /// Store an already-known value for `key` unless a usable entry exists.
    ///
    /// Returns whether the value was stored.
    pub fn insert_resolved(&self, key: K, value: V) -> bool {
        let mut inner = self.lock();
        if inner
            .entries
            .get(&key)
            .is_some_and(|entry| entry.is_usable(self.ttl))
        {
            return false;
        }
        let lookup = futures::future::ready(Ok(value)).boxed().shared();
        // Drive it to completion so the entry counts as settled for eviction.
        let _ = lookup.clone().now_or_never();
        self.insert(&mut inner, key, lookup);
        true
    }

    /// Number of entries, pending or resolved.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Atomic check-and-insert: join a usable entry or create a new one.
    fn claim<F, Fut>(&self, key: &K, resolver: &F) -> Claim<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = TrackResult<V>> + Send + 'static,
    {
        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get(key) {
            if entry.is_usable(self.ttl) {
                tracing::trace!(?key, "joining cached lookup");
                return Claim {
                    id: entry.id,
                    lookup: entry.lookup.clone(),
                    joined: true,
                };
            }
        }

        tracing::trace!(?key, "starting lookup");
        let lookup = resolver().boxed().shared();
        let id = self.insert(&mut inner, key.clone(), lookup.clone());
        Claim {
            id,
            lookup,
            joined: false,
        }
    }

    /// Insert (or replace) the entry for `key`, then enforce the capacity.
    fn insert(&self, inner: &mut Inner<K, V>, key: K, lookup: SharedLookup<V>) -> u64 {
        let id = inner.next_id;
        inner.next_id += 1;

        if let Some(old) = inner.entries.remove(&key) {
            inner.order.retain(|(_, oid)| *oid != old.id);
        }
        inner.entries.insert(
            key.clone(),
            Entry {
                id,
                lookup,
                inserted_at: Instant::now(),
            },
        );
        inner.order.push_back((key, id));

        // Lookups still in flight are never evicted; the cache may run over
        // capacity until they settle.
        while inner.entries.len() > self.capacity {
            let settled = inner.order.iter().position(|(key, _)| {
                inner
                    .entries
                    .get(key)
                    .is_some_and(|entry| entry.lookup.peek().is_some())
            });
            let Some((oldest, _)) = settled.and_then(|i| inner.order.remove(i)) else {
                break;
            };
            tracing::debug!(key = ?oldest, "evicting resolution cache entry");
            inner.entries.remove(&oldest);
        }

        id
    }

    /// Remove the entry for `key` if it is still the one identified by `id`.
    fn forget(&self, key: &K, id: u64) {
        let mut inner = self.lock();
        if inner.entries.get(key).is_some_and(|entry| entry.id == id) {
            inner.entries.remove(key);
            inner.order.retain(|(_, oid)| *oid != id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn counting_resolver(
        calls: &Arc<AtomicUsize>,
        value: TrackResult<u32>,
    ) -> impl Fn() -> BoxFuture<'static, TrackResult<u32>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                value
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_lookup() {
        let cache = SingleFlightCache::<String, u32>::new(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = counting_resolver(&calls, Ok(42));
        let key = "1Z".to_string();

        let results = futures::future::join_all((0..5).map(|_| cache.resolve(&key, &resolver))).await;

        assert!(results.iter().all(|r| *r == Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_is_reused() {
        let cache = SingleFlightCache::<String, u32>::new(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = counting_resolver(&calls, Ok(1));
        let key = "k".to_string();

        cache.resolve(&key, &resolver).await.unwrap();
        cache.resolve(&key, &resolver).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_evicted_and_retried_once() {
        let cache = SingleFlightCache::<String, u32>::new(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let err = TrackError::Fetch("down".into());
        let resolver = counting_resolver(&calls, Err(err.clone()));
        let key = "k".to_string();

        let results = futures::future::join_all((0..4).map(|_| cache.resolve(&key, &resolver))).await;

        assert!(results.iter().all(|r| *r == Err(err.clone())));
        // The first lookup plus one shared retry by the joiners.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.contains(&key));

        let _ = cache.resolve(&key, &resolver).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_does_not_leak_new_error_type() {
        let cache = SingleFlightCache::<String, u32>::new(10);
        let resolver = || async {
            Err(TrackError::HttpStatus {
                status: 500,
                url: "http://ups.test".into(),
            })
        };
        let err = cache.resolve(&"k".to_string(), resolver).await.unwrap_err();
        assert_eq!(err.kind(), "fetch");
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_insert() {
        let cache = SingleFlightCache::<String, u32>::new(3);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            let value = i as u32;
            cache
                .resolve(&key.to_string(), move || async move { Ok(value) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&"a".to_string()));
        assert!(cache.contains(&"b".to_string()));
        assert!(cache.contains(&"d".to_string()));
    }

    #[tokio::test]
    async fn test_in_flight_lookup_is_not_evicted() {
        let cache = SingleFlightCache::<String, u32>::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let slow = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok::<u32, TrackError>(1)
                }
                .boxed()
            }
        };
        let a = "a".to_string();

        let mut first = task::spawn(cache.resolve(&a, &slow));
        assert_pending!(first.poll());

        cache.resolve(&"b".to_string(), || async { Ok(2) }).await.unwrap();
        assert!(cache.contains(&a));

        let mut second = task::spawn(cache.resolve(&a, &slow));
        assert_pending!(second.poll());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.notify_waiters();
        assert_ready_eq!(first.poll(), Ok(1));
        assert_ready_eq!(second.poll(), Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_seeded_entries_take_part_in_eviction() {
        let cache = SingleFlightCache::<String, u32>::new(2);
        for key in ["a", "b", "c"] {
            cache.resolve(&key.to_string(), || async { Ok(0) }).await.unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.insert_resolved("d".to_string(), 3));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&"b".to_string()));
        assert!(cache.contains(&"d".to_string()));
    }

    #[tokio::test]
    async fn test_seeded_value_skips_lookup() {
        let cache = SingleFlightCache::<String, u32>::new(5);
        assert!(cache.insert_resolved("sibling".to_string(), 9));
        assert!(!cache.insert_resolved("sibling".to_string(), 10));

        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = counting_resolver(&calls, Ok(0));
        assert_eq!(cache.resolve(&"sibling".to_string(), &resolver).await, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaced() {
        let cache = SingleFlightCache::<String, u32>::new(5).with_ttl(Duration::from_millis(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = counting_resolver(&calls, Ok(5));
        let key = "k".to_string();

        cache.resolve(&key, &resolver).await.unwrap();
        cache.resolve(&key, &resolver).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }
}
