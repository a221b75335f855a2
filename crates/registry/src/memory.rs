//! In-memory nonce registry.
//!
//! Backs single-process deployments and tests. Slots are allocated on first
//! write and never removed, matching the registry lifetime model: a key that
//! has appeared stays resolvable for the rest of the session.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::{NonceRegistry, RegistryError, RegistryHandle};

/// One registry slot. Handles returned by `find` hold the slot directly, so
/// repeated reads skip the name lookup.
struct PropertySlot {
    value: RwLock<String>,
}

impl PropertySlot {
    fn new(value: String) -> Arc<Self> {
        Arc::new(Self {
            value: RwLock::new(value),
        })
    }

    fn read_long(&self, default: i64) -> i64 {
        self.value.read().trim().parse::<i64>().unwrap_or(default)
    }
}

impl RegistryHandle for PropertySlot {
    fn get_long(&self, default: i64) -> i64 {
        self.read_long(default)
    }
}

/// Process-local registry over a concurrent map.
///
/// Suitable wherever all producers and consumers share one process; a
/// cross-process deployment supplies its own [`NonceRegistry`] over shared
/// memory, a property service, or similar.
pub struct InMemoryRegistry {
    slots: DashMap<String, Arc<PropertySlot>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Number of keys that have been written at least once.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceRegistry for InMemoryRegistry {
    fn get_long(&self, name: &str, default: i64) -> i64 {
        match self.slots.get(name) {
            Some(slot) => slot.read_long(default),
            None => default,
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| PropertySlot::new(String::new()))
            .clone();
        *slot.value.write() = value.to_string();
        trace!(name = name, value = value, "registry write");
        Ok(())
    }

    fn find(&self, name: &str) -> Option<Arc<dyn RegistryHandle>> {
        self.slots
            .get(name)
            .map(|slot| Arc::clone(slot.value()) as Arc<dyn RegistryHandle>)
    }
}
