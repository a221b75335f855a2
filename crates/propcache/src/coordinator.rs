//! Invalidation coordination: nonce publication, corking, kill switch.
//!
//! The coordinator owns the process-wide cork table. While a key is corked,
//! invalidations under it are suppressed and the registry holds `UNSET`, so
//! every cache bound to the key bypasses and talks to its backing service
//! directly; the final uncork publishes a fresh nonce, snapping all caches
//! into a clean session. This makes corking correctness-preserving even when
//! taken outside whatever lock guards the backing state.
//!
//! One coordinator per registry per process. Producers that use the
//! process-global registry can use the free functions at the bottom of this
//! module instead of carrying a coordinator handle around.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use propcache_common::{next_live_nonce, Nonce, PropcacheError, PropcacheResult};
use propcache_registry::NonceRegistry;

/// Serializes `invalidate`, `cork`, and `uncork` for one registry.
///
/// The cork mutex is held for the whole of each operation so an
/// `invalidate` racing a `cork` cannot clobber the cork-written `UNSET`
/// with a nonce computed before the cork. Registries serialize writers
/// anyway, so the lock costs no concurrency; contention here means the
/// producer is invalidating too often.
pub struct InvalidationCoordinator {
    registry: Arc<dyn NonceRegistry>,
    corks: Mutex<HashMap<String, u32>>,
}

impl InvalidationCoordinator {
    /// Create a coordinator over the given registry.
    pub fn new(registry: Arc<dyn NonceRegistry>) -> Self {
        Self {
            registry,
            corks: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide coordinator over the globally installed registry.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceCell<Arc<InvalidationCoordinator>> = OnceCell::new();
        GLOBAL
            .get_or_init(|| Arc::new(Self::new(propcache_registry::global())))
            .clone()
    }

    /// The registry this coordinator writes through.
    pub fn registry(&self) -> Arc<dyn NonceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Invalidate every cache bound to `name`, in all processes, by
    /// publishing a fresh live nonce. Synchronous: caches are invalidated
    /// upon return. No-op while `name` is corked or disabled.
    pub fn invalidate(&self, name: &str) -> PropcacheResult<()> {
        let corks = self.corks.lock();
        if corks.get(name).copied().unwrap_or(0) > 0 {
            debug!(name = name, "ignoring invalidation due to cork");
            return Ok(());
        }
        self.invalidate_locked(name)
    }

    /// Temporarily put `name` in the unset state and keep invalidations
    /// from moving it out of that state. Callers must pair every `cork`
    /// with an [`uncork`](Self::uncork).
    pub fn cork(&self, name: &str) -> PropcacheResult<()> {
        let mut corks = self.corks.lock();
        let count = corks.get(name).copied().unwrap_or(0);
        // First cork: downgrade a live nonce to unset so existing caches
        // talk directly to their services while updates are suppressed.
        // Never clobber a disabled value.
        if count == 0 {
            let current = self.read_nonce(name);
            if current.is_live() {
                self.write_nonce(name, Nonce::UNSET)?;
            }
        }
        corks.insert(name.to_string(), count + 1);
        trace!(name = name, corks = count + 1, "corked");
        Ok(())
    }

    /// Undo one cork. Removing the last cork on `name` invalidates it by
    /// side effect, returning caches to normal operation (unless disabled
    /// system-wide).
    ///
    /// # Panics
    ///
    /// Panics on cork underflow: an `uncork` with no matching `cork` is a
    /// programming error and is never silently ignored.
    pub fn uncork(&self, name: &str) -> PropcacheResult<()> {
        let mut corks = self.corks.lock();
        let count = corks.get(name).copied().unwrap_or(0);
        assert!(count >= 1, "cork underflow: {name}");
        if count == 1 {
            corks.remove(name);
            self.invalidate_locked(name)?;
            trace!(name = name, "uncorked");
        } else {
            corks.insert(name.to_string(), count - 1);
        }
        Ok(())
    }

    /// Write the disabled sentinel under `name`, turning off every cache
    /// bound to it system-wide. Invalidation never undoes this.
    ///
    /// Deliberately not gated by the cork lock: this is an administrative
    /// kill switch and must work even when the corking machinery is wedged.
    pub fn disable_system_wide(&self, name: &str) -> PropcacheResult<()> {
        warn!(name = name, "disabling caches system-wide");
        self.write_nonce(name, Nonce::DISABLED)
    }

    /// Outstanding corks for `name`.
    pub fn cork_count(&self, name: &str) -> u32 {
        self.corks.lock().get(name).copied().unwrap_or(0)
    }

    fn invalidate_locked(&self, name: &str) -> PropcacheResult<()> {
        let current = self.read_nonce(name);
        if current.is_disabled() {
            debug!(name = name, "refusing to invalidate disabled cache");
            return Ok(());
        }
        // Values need not increase across writers; each only has to be
        // unique within one registry session.
        let fresh = next_live_nonce();
        debug!(name = name, old = %current, new = %fresh, "invalidating cache");
        self.write_nonce(name, fresh)
    }

    fn read_nonce(&self, name: &str) -> Nonce {
        Nonce::from_raw(self.registry.get_long(name, Nonce::UNSET.as_raw()))
    }

    fn write_nonce(&self, name: &str, value: Nonce) -> PropcacheResult<()> {
        self.registry
            .set(name, &value.to_string())
            .map_err(|err| PropcacheError::Registry {
                name: name.to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            })
    }
}

/// Invalidate `name` through the process-global coordinator.
pub fn invalidate(name: &str) -> PropcacheResult<()> {
    InvalidationCoordinator::global().invalidate(name)
}

/// Cork `name` through the process-global coordinator.
pub fn cork(name: &str) -> PropcacheResult<()> {
    InvalidationCoordinator::global().cork(name)
}

/// Uncork `name` through the process-global coordinator.
pub fn uncork(name: &str) -> PropcacheResult<()> {
    InvalidationCoordinator::global().uncork(name)
}

/// Disable all caches bound to `name` through the process-global
/// coordinator.
pub fn disable_system_wide(name: &str) -> PropcacheResult<()> {
    InvalidationCoordinator::global().disable_system_wide(name)
}
