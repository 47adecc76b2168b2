//! Active database registry
//!
//! Holds the one handle lookups are served from. Publishing swaps the
//! pointer atomically; readers take their own `Arc` and never block.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwapOption;
use tracing::{debug, info};

use super::handle::DatabaseHandle;

static GLOBAL_REGISTRY: LazyLock<Arc<ActiveDatabaseRegistry>> =
    LazyLock::new(|| Arc::new(ActiveDatabaseRegistry::new()));

/// Process-wide registry used by the binary.
pub fn global_registry() -> Arc<ActiveDatabaseRegistry> {
    GLOBAL_REGISTRY.clone()
}

#[derive(Default)]
pub struct ActiveDatabaseRegistry {
    slot: ArcSwapOption<DatabaseHandle>,
}

impl ActiveDatabaseRegistry {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::new(None),
        }
    }

    /// Make `handle` the one visible to lookups.
    ///
    /// Returns the superseded handle. It stays alive until the last
    /// in-flight lookup holding it drops its reference.
    pub fn publish(&self, handle: Arc<DatabaseHandle>) -> Option<Arc<DatabaseHandle>> {
        let generation = handle.generation();
        let previous = self.slot.swap(Some(handle));

        match &previous {
            Some(old) => info!(
                "GeoIP database published: generation {} replaces {}",
                generation,
                old.generation()
            ),
            None => info!("GeoIP database published: generation {}", generation),
        }

        previous
    }

    /// The active handle, or `None` while no database has ever been loaded.
    pub fn current(&self) -> Option<Arc<DatabaseHandle>> {
        let current = self.slot.load_full();
        if current.is_none() {
            debug!("GeoIP registry queried before any database was published");
        }
        current
    }

    pub fn is_available(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Generation of the active handle, if any.
    pub fn generation(&self) -> Option<u64> {
        (*self.slot.load()).as_ref().map(|h| h.generation())
    }
}

impl std::fmt::Debug for ActiveDatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveDatabaseRegistry")
            .field("generation", &self.generation())
            .finish()
    }
}
