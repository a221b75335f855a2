//! Property-invalidated LRU cache
//!
//! A client-side memoization primitive for values that are expensive to
//! obtain (typically over IPC), read far more often than they change, and
//! whose authoritative state lives in another process. Staleness is
//! signalled through a shared 64-bit **nonce** kept in a process-external
//! registry: each cache is bound to one nonce key, and whenever the value it
//! observes differs from the one it last saw, it drops its entries before
//! serving anything.
//!
//! There is no broadcast and no subscription; the design is pull-only. A
//! producer of truth publishes a fresh nonce with one registry write, and
//! every cache bound to that key, in every process, discovers the change on
//! its next query.
//!
//! # Example
//!
//! Suppose a `birthdayd` service answers `get_user_birthday(user_id)` over
//! IPC, and birthdays change rarely. The client side caches the answers:
//!
//! ```
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! use propcache::{InMemoryRegistry, InvalidationCoordinator, PropertyCache};
//!
//! let registry = Arc::new(InMemoryRegistry::new());
//! let coordinator = Arc::new(InvalidationCoordinator::new(registry));
//!
//! // Open the first cache session.
//! coordinator.invalidate("cache_key.birthdays").unwrap();
//!
//! let birthdays = PropertyCache::builder(
//!     "cache_key.birthdays",
//!     NonZeroUsize::new(8).unwrap(),
//!     // The authoritative fetch; in production this is the IPC call.
//!     |user_id: &u32| Ok(Some(format!("birthday of {user_id}"))),
//! )
//! .coordinator(coordinator.clone())
//! .build();
//!
//! // First query fetches, second is served from the cache.
//! assert_eq!(
//!     birthdays.query(&1).unwrap(),
//!     Some("birthday of 1".to_string())
//! );
//! assert_eq!(birthdays.stats().snapshot().recomputes, 1);
//! birthdays.query(&1).unwrap();
//! assert_eq!(birthdays.stats().snapshot().recomputes, 1);
//!
//! // The server publishes a fresh nonce when a birthday changes; the next
//! // query refetches.
//! coordinator.invalidate("cache_key.birthdays").unwrap();
//! birthdays.query(&1).unwrap();
//! assert_eq!(birthdays.stats().snapshot().recomputes, 2);
//! ```
//!
//! # Module Organization
//!
//! - [`cache`]: [`PropertyCache`], its builder, and the query protocol
//! - [`coordinator`]: [`InvalidationCoordinator`] — invalidate, cork,
//!   uncork, system-wide disable
//! - [`stats`]: Per-cache hit/miss counters
//!
//! The registry contract and implementations live in `propcache-registry`;
//! the nonce type in `propcache-common`. Both are re-exported here.

pub mod cache;
pub mod coordinator;
pub mod stats;

pub use cache::{PropertyCache, PropertyCacheBuilder, Refresh};
pub use coordinator::{
    cork, disable_system_wide, invalidate, uncork, InvalidationCoordinator,
};
pub use stats::{CacheStats, CacheStatsSnapshot};

// Re-export the collaborator crates' surface for convenience.
pub use propcache_common::{next_live_nonce, Nonce, PropcacheError, PropcacheResult};
pub use propcache_registry::{
    InMemoryRegistry, NonceHandle, NonceRegistry, RegistryError, RegistryHandle,
};
