//! Nonce registry contract and implementations for propcache
//!
//! The registry is the process-external map from nonce key to 64-bit value
//! that every cache instance polls on its query hot path. The cache core
//! never assumes a particular registry implementation; it talks to the two
//! traits defined here.
//!
//! # Module Organization
//!
//! - [`memory`]: In-memory registry for single-process deployments and tests
//! - [`handle`]: Per-key lazy accessor used by the cache query fast path
//! - [`global`]: Process-wide default registry, installed once
//!
//! Values are stored as base-10 decimal strings; the strings `"0"` and
//! `"-1"` encode the `UNSET` and `DISABLED` sentinels. Registries typically
//! serialize writers globally; readers are unsynchronized.

use std::sync::Arc;

use thiserror::Error;

pub mod global;
pub mod handle;
pub mod memory;

pub use global::{global, install_global, GlobalAlreadyInstalled};
pub use handle::NonceHandle;
pub use memory::InMemoryRegistry;

/// Error from a registry write.
///
/// Reads never fail: an absent or undecodable key reads as the caller's
/// default, which the cache layer treats as `UNSET` (bypass).
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The backing store rejected the write
    #[error("registry write failed for {name}: {message}")]
    WriteFailed { name: String, message: String },
}

/// The process-external nonce store.
///
/// One writer (the producer of truth) mutates values; many reader processes
/// poll them. Implementations must be safe to read concurrently with a
/// write, but need not order concurrent writers beyond their own contract.
pub trait NonceRegistry: Send + Sync {
    /// Read the current value under `name`, or `default` if the key is
    /// absent or its content does not decode as a decimal 64-bit integer.
    fn get_long(&self, name: &str, default: i64) -> i64;

    /// Overwrite the value under `name` with a decimal string.
    fn set(&self, name: &str, value: &str) -> Result<(), RegistryError>;

    /// Resolve a key once. The returned handle re-reads current state
    /// without rehashing the name. Returns `None` if the key does not exist
    /// yet; callers retry resolution on a later read.
    fn find(&self, name: &str) -> Option<Arc<dyn RegistryHandle>>;
}

/// A resolved registry slot for one key.
pub trait RegistryHandle: Send + Sync {
    /// Read the slot's current value, or `default` if it does not decode.
    fn get_long(&self, default: i64) -> i64;
}
