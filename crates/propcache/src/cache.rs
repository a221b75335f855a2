//! The property-invalidated cache itself.
//!
//! [`PropertyCache`] is a bounded LRU keyed by query, self-synchronizing,
//! that never holds a lock across data fetches. Every query reads the nonce
//! bound to the cache's property name; a nonce that differs from the last
//! one seen drops all entries before any lookup, and the sentinel nonces
//! (`UNSET`, `DISABLED`) put the cache in bypass, where it calls straight
//! through to the recompute callable and stores nothing.
//!
//! # Consistency
//!
//! The instance lock is only ever held for constant-time map work. Both
//! `recompute` and `refresh` run unlocked and may block; after they return,
//! the nonce is checked again under the lock, so a value whose provenance
//! has been invalidated mid-fetch is returned to the one caller that fetched
//! it but never persisted. The retry loop exists for nonce races only: fetch
//! failures propagate to the caller untouched.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use propcache_common::{Nonce, PropcacheResult};
use propcache_registry::NonceHandle;

use crate::coordinator::InvalidationCoordinator;
use crate::stats::CacheStats;

/// Compile-time kill switch. When off, every query bypasses the cache.
const ENABLE: bool = true;

type RecomputeFn<Q, V> = Box<dyn Fn(&Q) -> PropcacheResult<Option<V>> + Send + Sync>;
type RefreshFn<Q, V> = Box<dyn Fn(&V, &Q) -> PropcacheResult<Refresh<V>> + Send + Sync>;
type CompareFn<V> = Box<dyn Fn(&V, &V) -> bool + Send + Sync>;
type LabelFn<Q> = Box<dyn Fn(&Q) -> String + Send + Sync>;

/// Outcome of a refresh over a cached value.
///
/// `Unchanged` is the "nothing to do" signal: the query returns the cached
/// value with no further nonce read. `Updated` and `Evict` mutate the entry,
/// which forces a nonce re-check before anything is persisted.
#[derive(Debug)]
pub enum Refresh<V> {
    /// Keep the cached value as is
    Unchanged,
    /// Replace the cached value and return the replacement
    Updated(V),
    /// Remove the entry; the query returns `None`
    Evict,
}

struct CacheState<Q, V>
where
    Q: Hash + Eq,
{
    entries: LruCache<Q, V>,
    /// The last registry nonce this instance observed. Entries are only
    /// valid for as long as the registry still holds this value.
    last_seen_nonce: Nonce,
}

/// LRU cache invalidated when the nonce under its property name changes.
///
/// The intended use is caching frequently-read, seldom-changed information
/// normally retrieved over IPC: the owner supplies a `recompute` callable
/// that performs the authoritative fetch, and the producer of truth calls
/// [`InvalidationCoordinator::invalidate`] (or the instance's
/// [`invalidate_cache`](PropertyCache::invalidate_cache)) whenever the
/// backing state changes. All caches bound to the same property name, in
/// every process sharing the registry, discover the change on their next
/// query.
///
/// Instances are assembled with [`PropertyCache::builder`].
pub struct PropertyCache<Q, V>
where
    Q: Hash + Eq + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    property_name: String,
    cache_name: Option<String>,
    coordinator: Arc<InvalidationCoordinator>,
    nonce: NonceHandle,
    state: Mutex<CacheState<Q, V>>,
    /// Raced deliberately: disabling is monotonic and a query that misses
    /// the flag by a hair behaves like one that ran just before it was set.
    disabled: AtomicBool,
    stats: Arc<CacheStats>,
    recompute: RecomputeFn<Q, V>,
    refresh: Option<RefreshFn<Q, V>>,
    verify: Option<CompareFn<V>>,
    query_label: Option<LabelFn<Q>>,
}

impl<Q, V> PropertyCache<Q, V>
where
    Q: Hash + Eq + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Start building a cache bound to `property_name`, holding at most
    /// `max_entries` values, fetching through `recompute`.
    ///
    /// `recompute` is called without any lock held and may block. A
    /// `Ok(None)` result is returned to the caller but never cached (there
    /// is no negative cache); an `Err` propagates with the cache untouched.
    pub fn builder<F>(
        property_name: impl Into<String>,
        max_entries: NonZeroUsize,
        recompute: F,
    ) -> PropertyCacheBuilder<Q, V>
    where
        F: Fn(&Q) -> PropcacheResult<Option<V>> + Send + Sync + 'static,
    {
        PropertyCacheBuilder {
            property_name: property_name.into(),
            max_entries,
            cache_name: None,
            coordinator: None,
            recompute: Box::new(recompute),
            refresh: None,
            verify: None,
            query_label: None,
        }
    }

    /// Get a value from the cache or recompute it.
    pub fn query(&self, query: &Q) -> PropcacheResult<Option<V>> {
        let mut nonce = if ENABLE && !self.disabled.load(Ordering::Relaxed) {
            self.nonce.read()
        } else {
            Nonce::DISABLED
        };
        loop {
            if !nonce.is_live() {
                trace!(
                    cache = %self.cache_name(),
                    state = if nonce.is_disabled() { "disabled" } else { "unset" },
                    query = %self.query_label(query),
                    "bypassing cache"
                );
                self.stats.record_bypass();
                return self.run_recompute(query);
            }

            let cached = {
                let mut state = self.state.lock();
                if nonce == state.last_seen_nonce {
                    state.entries.get(query).cloned()
                } else {
                    debug!(
                        cache = %self.cache_name(),
                        old = %state.last_seen_nonce,
                        new = %nonce,
                        "nonce changed, clearing cache"
                    );
                    state.entries.clear();
                    state.last_seen_nonce = nonce;
                    None
                }
            };

            if let Some(cached) = cached {
                self.stats.record_hit();
                if let Some(refresh) = &self.refresh {
                    // A hit may still need augmentation before it is
                    // returned. Refresh runs unlocked; if it replaces or
                    // evicts the value, the nonce is read again so output
                    // computed against invalidated state is never persisted.
                    let refreshed = match refresh(&cached, query)? {
                        Refresh::Unchanged => {
                            trace!(
                                cache = %self.cache_name(),
                                query = %self.query_label(query),
                                "cache hit"
                            );
                            return self.maybe_check_consistency(query, Some(cached));
                        }
                        Refresh::Updated(value) => Some(value),
                        Refresh::Evict => None,
                    };
                    trace!(
                        cache = %self.cache_name(),
                        query = %self.query_label(query),
                        "cache refresh"
                    );
                    let observed = self.nonce.read();
                    if observed != nonce {
                        debug!(
                            cache = %self.cache_name(),
                            query = %self.query_label(query),
                            "nonce changed during refresh, restarting"
                        );
                        nonce = observed;
                        continue;
                    }
                    {
                        let mut state = self.state.lock();
                        if state.last_seen_nonce != nonce {
                            // Already out of date; return the refreshed
                            // value without persisting it. Nothing keeps the
                            // entries valid past this return anyway.
                        } else {
                            match &refreshed {
                                Some(value) => {
                                    state.entries.put(query.clone(), value.clone());
                                }
                                None => {
                                    state.entries.pop(query);
                                }
                            }
                        }
                    }
                    return self.maybe_check_consistency(query, refreshed);
                }
                trace!(
                    cache = %self.cache_name(),
                    query = %self.query_label(query),
                    "cache hit"
                );
                return self.maybe_check_consistency(query, Some(cached));
            }

            // Cache miss: make the value from scratch.
            self.stats.record_miss();
            trace!(
                cache = %self.cache_name(),
                query = %self.query_label(query),
                "cache miss"
            );
            let fetched = self.run_recompute(query)?;
            {
                let mut state = self.state.lock();
                // Someone else may have invalidated the cache while the
                // fetch ran; never persist a potentially stale result.
                if state.last_seen_nonce == nonce {
                    if let Some(value) = &fetched {
                        if let Some((evicted, _)) =
                            state.entries.push(query.clone(), value.clone())
                        {
                            if evicted != *query {
                                self.stats.record_eviction();
                                trace!(
                                    cache = %self.cache_name(),
                                    "evicted least-recently-used entry"
                                );
                            }
                        }
                    }
                }
            }
            return self.maybe_check_consistency(query, fetched);
        }
    }

    /// Forget all cached values. The nonce session and the local disable
    /// flag are unaffected.
    pub fn clear(&self) {
        debug!(cache = %self.cache_name(), "forgetting all cached values");
        self.state.lock().entries.clear();
    }

    /// Disable the use of this cache in this process. Idempotent and
    /// permanent for the lifetime of the instance; other processes' caches
    /// bound to the same property name are unaffected.
    pub fn disable_local(&self) {
        let mut state = self.state.lock();
        self.disabled.store(true, Ordering::Relaxed);
        state.entries.clear();
    }

    /// Return whether the cache is disabled in this process.
    pub fn is_disabled_local(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Invalidate every cache bound to this instance's property name, in
    /// all processes sharing the registry.
    ///
    /// Convenience for the single-cache-per-property case; when several
    /// caches share one property name, invalidating through one of them
    /// reads confusingly and [`InvalidationCoordinator::invalidate`] is the
    /// clearer call.
    pub fn invalidate_cache(&self) -> PropcacheResult<()> {
        self.coordinator.invalidate(&self.property_name)
    }

    /// Disable every cache bound to this instance's property name,
    /// system-wide. See [`InvalidationCoordinator::disable_system_wide`].
    pub fn disable_system_wide(&self) -> PropcacheResult<()> {
        self.coordinator.disable_system_wide(&self.property_name)
    }

    /// The nonce key this cache is bound to.
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// The name of the cache, for debug messages. Falls back to the
    /// property name when no explicit label was configured.
    pub fn cache_name(&self) -> &str {
        self.cache_name.as_deref().unwrap_or(&self.property_name)
    }

    /// Render a query for debug messages.
    pub fn query_label(&self, query: &Q) -> String {
        match &self.query_label {
            Some(label) => label(query),
            None => format!("{query:?}"),
        }
    }

    /// Number of currently cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Statistics for this instance.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn run_recompute(&self, query: &Q) -> PropcacheResult<Option<V>> {
        self.stats.record_recompute();
        (self.recompute)(query)
    }

    /// In verification builds every non-bypass result is recomputed and
    /// compared; divergence under an unchanged nonce is a caching bug, not
    /// a recoverable condition.
    fn maybe_check_consistency(
        &self,
        query: &Q,
        proposed: Option<V>,
    ) -> PropcacheResult<Option<V>> {
        let Some(compare) = &self.verify else {
            return Ok(proposed);
        };
        // Unlocked, like any other fetch. A failed or empty verification
        // fetch matches anything: a crashed backend does not indict the
        // cached value.
        let fetched = self.run_recompute(query).ok().flatten();
        let matches = match (&proposed, &fetched) {
            (_, None) => true,
            (Some(have), Some(want)) => compare(have, want),
            (None, Some(_)) => false,
        };
        let nonce_changed = self.nonce.read() != self.state.lock().last_seen_nonce;
        if !nonce_changed && !matches {
            panic!(
                "cache {} returned out of date response for {}",
                self.cache_name(),
                self.query_label(query)
            );
        }
        Ok(proposed)
    }
}

/// Assembles a [`PropertyCache`]. Created by [`PropertyCache::builder`].
pub struct PropertyCacheBuilder<Q, V>
where
    Q: Hash + Eq + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    property_name: String,
    max_entries: NonZeroUsize,
    cache_name: Option<String>,
    coordinator: Option<Arc<InvalidationCoordinator>>,
    recompute: RecomputeFn<Q, V>,
    refresh: Option<RefreshFn<Q, V>>,
    verify: Option<CompareFn<V>>,
    query_label: Option<LabelFn<Q>>,
}

impl<Q, V> PropertyCacheBuilder<Q, V>
where
    Q: Hash + Eq + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Use a specific coordinator (and through it, a specific registry).
    /// Defaults to the process-global coordinator.
    pub fn coordinator(mut self, coordinator: Arc<InvalidationCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Label used in debug messages instead of the property name.
    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = Some(name.into());
        self
    }

    /// Make results up-to-date on cache hits.
    ///
    /// Called unlocked and may block. Returning [`Refresh::Unchanged`]
    /// keeps the entry; [`Refresh::Updated`] replaces it (guarded by a
    /// nonce re-check); [`Refresh::Evict`] removes it and makes the query
    /// return `None`.
    pub fn refresh<F>(mut self, refresh: F) -> Self
    where
        F: Fn(&V, &Q) -> PropcacheResult<Refresh<V>> + Send + Sync + 'static,
    {
        self.refresh = Some(Box::new(refresh));
        self
    }

    /// Enable verification mode with a caller-supplied equivalence
    /// predicate: every non-bypass result is recomputed and compared, and a
    /// mismatch under an unchanged nonce panics. For debug builds of cache
    /// owners; not meant for production configurations.
    pub fn verify_with<F>(mut self, compare: F) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        self.verify = Some(Box::new(compare));
        self
    }

    /// Render queries for debug messages (e.g. to redact sensitive keys).
    pub fn query_label<F>(mut self, label: F) -> Self
    where
        F: Fn(&Q) -> String + Send + Sync + 'static,
    {
        self.query_label = Some(Box::new(label));
        self
    }

    pub fn build(self) -> PropertyCache<Q, V> {
        let coordinator = self
            .coordinator
            .unwrap_or_else(InvalidationCoordinator::global);
        let nonce = NonceHandle::new(coordinator.registry(), self.property_name.clone());
        PropertyCache {
            property_name: self.property_name,
            cache_name: self.cache_name,
            coordinator,
            nonce,
            state: Mutex::new(CacheState {
                entries: LruCache::new(self.max_entries),
                last_seen_nonce: Nonce::UNSET,
            }),
            disabled: AtomicBool::new(false),
            stats: Arc::new(CacheStats::default()),
            recompute: self.recompute,
            refresh: self.refresh,
            verify: self.verify,
            query_label: self.query_label,
        }
    }
}

impl<Q, V> PropertyCacheBuilder<Q, V>
where
    Q: Hash + Eq + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + PartialEq + 'static,
{
    /// Enable verification mode with structural equality.
    pub fn verify(self) -> Self {
        self.verify_with(|cached, fetched| cached == fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propcache_registry::InMemoryRegistry;

    fn test_cache(max: usize) -> (Arc<InvalidationCoordinator>, PropertyCache<u32, String>) {
        let coordinator = Arc::new(InvalidationCoordinator::new(Arc::new(
            InMemoryRegistry::new(),
        )));
        let cache = PropertyCache::builder(
            "cache_key.test",
            NonZeroUsize::new(max).unwrap(),
            |q: &u32| Ok(Some(format!("value-{q}"))),
        )
        .coordinator(coordinator.clone())
        .build();
        (coordinator, cache)
    }

    #[test]
    fn test_cache_name_falls_back_to_property_name() {
        let (_c, cache) = test_cache(4);
        assert_eq!(cache.cache_name(), "cache_key.test");
        assert_eq!(cache.property_name(), "cache_key.test");
    }

    #[test]
    fn test_explicit_cache_name_and_query_label() {
        let coordinator = Arc::new(InvalidationCoordinator::new(Arc::new(
            InMemoryRegistry::new(),
        )));
        let cache = PropertyCache::builder(
            "cache_key.test",
            NonZeroUsize::new(4).unwrap(),
            |q: &u32| Ok(Some(*q * 2)),
        )
        .coordinator(coordinator)
        .cache_name("doubler")
        .query_label(|q| format!("q={q}"))
        .build();

        assert_eq!(cache.cache_name(), "doubler");
        assert_eq!(cache.query_label(&7), "q=7");
    }

    #[test]
    fn test_default_query_label_uses_debug() {
        let (_c, cache) = test_cache(4);
        assert_eq!(cache.query_label(&42), "42");
    }

    #[test]
    fn test_bypass_before_first_invalidation() {
        let (_c, cache) = test_cache(4);

        // No nonce published yet: every query recomputes, nothing cached.
        assert_eq!(cache.query(&1).unwrap(), Some("value-1".to_string()));
        assert_eq!(cache.query(&1).unwrap(), Some("value-1".to_string()));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().snapshot().bypasses, 2);
        assert_eq!(cache.stats().snapshot().recomputes, 2);
    }

    #[test]
    fn test_caches_under_live_nonce() {
        let (coordinator, cache) = test_cache(4);
        coordinator.invalidate("cache_key.test").unwrap();

        assert_eq!(cache.query(&1).unwrap(), Some("value-1".to_string()));
        assert_eq!(cache.query(&1).unwrap(), Some("value-1".to_string()));
        assert_eq!(cache.len(), 1);

        let snap = cache.stats().snapshot();
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.recomputes, 1);
    }

    #[test]
    fn test_disable_local_is_idempotent_and_sticky() {
        let (coordinator, cache) = test_cache(4);
        coordinator.invalidate("cache_key.test").unwrap();
        cache.query(&1).unwrap();
        assert_eq!(cache.len(), 1);

        cache.disable_local();
        cache.disable_local();
        assert!(cache.is_disabled_local());
        assert!(cache.is_empty());

        // Invalidation re-enables other processes, not this instance.
        coordinator.invalidate("cache_key.test").unwrap();
        cache.query(&1).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_preserves_session() {
        let (coordinator, cache) = test_cache(4);
        coordinator.invalidate("cache_key.test").unwrap();

        cache.query(&1).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_disabled_local());

        // Still the same nonce session: the next query misses but caches.
        cache.query(&1).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
