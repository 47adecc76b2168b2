//! GeoIP database refresh
//!
//! One cycle downloads the remote archive, unpacks it, installs the data file
//! at the canonical path and publishes a new handle. The scheduler runs one
//! cycle at startup and then once a week; at most one cycle runs at a time.

mod coordinator;
mod extractor;
mod fetcher;
mod installer;
mod scheduler;
mod types;

pub use coordinator::{CycleGuard, RefreshCoordinator};
pub use extractor::{ArchiveExtractor, ExtractedPayload};
pub use fetcher::{ArchiveSource, HttpArchiveFetcher};
pub use installer::DatabaseInstaller;
pub use scheduler::{
    ChannelTrigger, RefreshScheduler, SchedulerHandle, TriggerSource, WeeklySchedule,
    WeeklyTrigger,
};
pub use types::{RefreshEvent, RefreshReport, RefreshStage, RefreshStatus, TriggerReason};
