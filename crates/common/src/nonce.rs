//! The invalidation nonce: an opaque 64-bit scalar stored in a shared
//! registry. Changing the nonce under a key tells every cache bound to that
//! key that its contents are stale.
//!
//! Two values are reserved and never used as live nonces:
//!
//! - [`Nonce::UNSET`] (0): the key is absent or freshly corked; caches
//!   bypass and store nothing
//! - [`Nonce::DISABLED`] (-1): caching is administratively off system-wide;
//!   invalidation never re-enables it
//!
//! Live nonces are drawn from a process-global counter seeded with a random
//! value. Uniqueness within one registry session is the only requirement;
//! values are not monotonic across processes.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// An invalidation nonce as stored in the registry.
///
/// On the wire a nonce is a base-10 decimal string; `"0"` and `"-1"` encode
/// the two sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(i64);

impl Nonce {
    /// Key absent or corked: caches bypass and cache nothing.
    pub const UNSET: Nonce = Nonce(0);

    /// Caching turned off system-wide; never overwritten by invalidation.
    pub const DISABLED: Nonce = Nonce(-1);

    /// Wrap a raw registry value.
    pub const fn from_raw(raw: i64) -> Self {
        Nonce(raw)
    }

    /// The raw 64-bit value.
    pub const fn as_raw(self) -> i64 {
        self.0
    }

    /// True for any value other than the two sentinels.
    pub fn is_live(self) -> bool {
        self != Self::UNSET && self != Self::DISABLED
    }

    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }

    pub fn is_disabled(self) -> bool {
        self == Self::DISABLED
    }

    /// Decode the registry wire form. Returns `None` for anything that is
    /// not a decimal 64-bit integer; callers treat that as [`Nonce::UNSET`].
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<i64>().ok().map(Nonce)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-global nonce source. Seeded lazily so processes that never
/// invalidate anything never touch the RNG.
static NEXT_NONCE: Lazy<AtomicI64> = Lazy::new(|| AtomicI64::new(rand::random::<i64>()));

/// Draw the next live nonce.
///
/// Increments the process-global counter and skips the reserved sentinels.
/// The random seed makes collisions between independent writers unlikely;
/// the registry only requires uniqueness within one of its sessions.
pub fn next_live_nonce() -> Nonce {
    loop {
        let candidate = Nonce(NEXT_NONCE.fetch_add(1, Ordering::Relaxed));
        if candidate.is_live() {
            return candidate;
        }
    }
}
