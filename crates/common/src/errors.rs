//! Error types for propcache
//!
//! This module defines the error types surfaced by cache queries and
//! coordinator operations, with a focus on clear failure modes.
//!
//! Fetch failures (`Recompute`, `Refresh`) are caller errors: the cache
//! propagates them untouched and persists nothing. Registry write failures
//! surface from coordinator operations. Programming errors (cork underflow,
//! verification mismatch) are not represented here at all: those panic.

use thiserror::Error;

/// Main error type for propcache operations
#[derive(Error, Debug)]
pub enum PropcacheError {
    /// The user-supplied recompute callable failed
    #[error("recompute failed: {message}")]
    Recompute {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The user-supplied refresh callable failed
    #[error("refresh failed: {message}")]
    Refresh {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A nonce registry write failed
    #[error("registry error for {name}: {message}")]
    Registry {
        name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for propcache operations
pub type PropcacheResult<T> = Result<T, PropcacheError>;

impl PropcacheError {
    /// Create a recompute error from a message
    pub fn recompute(message: impl Into<String>) -> Self {
        Self::Recompute {
            message: message.into(),
            source: None,
        }
    }

    /// Create a recompute error wrapping an underlying failure
    pub fn recompute_with(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Recompute {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a refresh error from a message
    pub fn refresh(message: impl Into<String>) -> Self {
        Self::Refresh {
            message: message.into(),
            source: None,
        }
    }

    /// Create a refresh error wrapping an underlying failure
    pub fn refresh_with(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Refresh {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a registry error for the given nonce key
    pub fn registry(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registry {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// True if the failure came from a user-supplied callable rather than
    /// from propcache itself
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Recompute { .. } | Self::Refresh { .. })
    }
}
