//! Process-wide default registry.
//!
//! Embedders that talk to a real external registry install it once at
//! startup; everything that asks for the global registry afterwards gets
//! that instance. If nothing is installed by first use, an in-memory
//! registry is created, which confines invalidation to this process.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::debug;

use crate::{InMemoryRegistry, NonceRegistry};

static GLOBAL_REGISTRY: OnceCell<Arc<dyn NonceRegistry>> = OnceCell::new();

/// Returned by [`install_global`] when the slot is already occupied.
#[derive(Error, Debug)]
#[error("a global nonce registry is already installed")]
pub struct GlobalAlreadyInstalled;

/// Install the process-wide registry. First install wins; anything after
/// that (including the implicit in-memory default, once `global` has run)
/// is rejected.
pub fn install_global(registry: Arc<dyn NonceRegistry>) -> Result<(), GlobalAlreadyInstalled> {
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| GlobalAlreadyInstalled)?;
    debug!("global nonce registry installed");
    Ok(())
}

/// The process-wide registry, creating an in-memory one on first use if
/// nothing was installed.
pub fn global() -> Arc<dyn NonceRegistry> {
    GLOBAL_REGISTRY
        .get_or_init(|| Arc::new(InMemoryRegistry::new()))
        .clone()
}
