//! Per-key lazy nonce accessor.
//!
//! The cache query hot path reads the nonce before taking any lock, so the
//! resolved registry handle is published through a `OnceLock`: a single-word
//! release store on resolution, an acquire load on every read afterwards.

use std::sync::{Arc, OnceLock};

use propcache_common::Nonce;
use tracing::trace;

use crate::{NonceRegistry, RegistryHandle};

/// Lazy accessor for one nonce key.
///
/// Resolution is deferred until the key exists in the registry: while the
/// key is absent, [`read`](NonceHandle::read) returns [`Nonce::UNSET`] and
/// the handle stays unresolved so a later appearance is picked up. Once
/// resolved, the handle is reused for the lifetime of the owner.
pub struct NonceHandle {
    name: String,
    registry: Arc<dyn NonceRegistry>,
    resolved: OnceLock<Arc<dyn RegistryHandle>>,
}

impl NonceHandle {
    pub fn new(registry: Arc<dyn NonceRegistry>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry,
            resolved: OnceLock::new(),
        }
    }

    /// The nonce key this handle is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the current nonce. Undecodable or absent content reads as
    /// [`Nonce::UNSET`].
    pub fn read(&self) -> Nonce {
        let handle = match self.resolved.get() {
            Some(handle) => handle,
            None => match self.registry.find(&self.name) {
                // Racing resolvers may both find the key; first publication
                // wins and both read through the published handle.
                Some(found) => {
                    trace!(name = %self.name, "nonce key resolved");
                    self.resolved.get_or_init(|| found)
                }
                None => return Nonce::UNSET,
            },
        };
        Nonce::from_raw(handle.get_long(Nonce::UNSET.as_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRegistry;

    #[test]
    fn test_unresolved_while_key_absent() {
        let registry = Arc::new(InMemoryRegistry::new());
        let handle = NonceHandle::new(registry.clone(), "cache_key.k");

        assert_eq!(handle.read(), Nonce::UNSET);
        assert_eq!(handle.read(), Nonce::UNSET);
    }

    #[test]
    fn test_late_key_appearance_is_picked_up() {
        let registry = Arc::new(InMemoryRegistry::new());
        let handle = NonceHandle::new(registry.clone(), "cache_key.k");

        assert_eq!(handle.read(), Nonce::UNSET);

        registry.set("cache_key.k", "99").unwrap();
        assert_eq!(handle.read(), Nonce::from_raw(99));
    }

    #[test]
    fn test_resolved_handle_tracks_changes() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set("cache_key.k", "7").unwrap();

        let handle = NonceHandle::new(registry.clone(), "cache_key.k");
        assert_eq!(handle.read(), Nonce::from_raw(7));

        registry.set("cache_key.k", "8").unwrap();
        assert_eq!(handle.read(), Nonce::from_raw(8));

        registry.set("cache_key.k", "-1").unwrap();
        assert!(handle.read().is_disabled());
    }
}
