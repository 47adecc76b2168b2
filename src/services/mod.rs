//! Service layer
//!
//! - `geoip`: database handles, the active-database registry and lookups
//! - `refresh`: download, extraction, installation and scheduling of new databases

pub mod geoip;
pub mod refresh;

pub use geoip::{ActiveDatabaseRegistry, GeoRecord, LookupService, global_registry};
pub use refresh::{RefreshCoordinator, RefreshScheduler, TriggerReason};
