//! Common utilities and shared types for propcache
//!
//! This crate provides the pieces shared by every propcache component: the
//! nonce value type and its generator, error types, and tracing bootstrap.
//!
//! # Module Organization
//!
//! - [`nonce`]: The 64-bit invalidation nonce, its reserved sentinels, and
//!   the process-global live-nonce generator
//! - [`errors`]: Error types and result alias
//! - [`observability`]: Tracing/logging initialization

pub mod errors;
pub mod nonce;
pub mod observability;

// Re-export commonly used items at the crate root
pub use errors::{PropcacheError, PropcacheResult};
pub use nonce::{next_live_nonce, Nonce};
pub use observability::init_tracing;
