//! Refresh type definitions
//!
//! This module defines the types used by the refresh pipeline:
//! - `RefreshStage`: Which step of a cycle is running (or failed)
//! - `TriggerReason`: Why a cycle was requested
//! - `RefreshReport`: Result of one cycle
//! - `RefreshEvent`: Events emitted during a cycle
//! - `RefreshStatus`: Current coordinator status

use chrono::{DateTime, Utc};

/// Refresh pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshStage {
    /// Creating the cycle's private work directory
    Prepare,
    /// Downloading the remote archive
    Fetch,
    /// Unpacking the archive and locating the data file
    Extract,
    /// Moving the data file onto the canonical path and opening it
    Install,
}

impl std::fmt::Display for RefreshStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshStage::Prepare => write!(f, "prepare"),
            RefreshStage::Fetch => write!(f, "fetch"),
            RefreshStage::Extract => write!(f, "extract"),
            RefreshStage::Install => write!(f, "install"),
        }
    }
}

/// Why a refresh cycle was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerReason {
    /// Process start
    Startup,
    /// Weekly schedule
    Schedule,
    /// Explicit request (CLI `refresh`, tests)
    Manual,
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerReason::Startup => write!(f, "startup"),
            TriggerReason::Schedule => write!(f, "schedule"),
            TriggerReason::Manual => write!(f, "manual"),
        }
    }
}

/// Result of one refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub reason: TriggerReason,
    /// Whether a new database was published
    pub success: bool,
    /// Stage that failed, if any
    pub failed_stage: Option<RefreshStage>,
    /// Error code of the failure (`E001`...)
    pub error_code: Option<&'static str>,
    /// Error message if failed
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    pub bytes_downloaded: u64,
    /// Generation of the published handle
    pub generation: Option<u64>,
}

impl RefreshReport {
    /// Create a successful refresh report
    pub fn success(
        reason: TriggerReason,
        started_at: DateTime<Utc>,
        bytes_downloaded: u64,
        generation: u64,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            reason,
            success: true,
            failed_stage: None,
            error_code: None,
            message: None,
            started_at,
            finished_at,
            duration_ms,
            bytes_downloaded,
            generation: Some(generation),
        }
    }

    /// Create a failed refresh report
    pub fn failure(
        reason: TriggerReason,
        started_at: DateTime<Utc>,
        stage: RefreshStage,
        error: &crate::errors::IpResolverError,
        bytes_downloaded: u64,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            reason,
            success: false,
            failed_stage: Some(stage),
            error_code: Some(error.code()),
            message: Some(error.to_string()),
            started_at,
            finished_at,
            duration_ms,
            bytes_downloaded,
            generation: None,
        }
    }
}

/// Events emitted during refresh cycles
///
/// These events can be subscribed to for monitoring refresh progress.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// Cycle started
    Started { reason: TriggerReason },
    /// A new database was published
    Completed { report: RefreshReport },
    /// Cycle aborted; the previous database keeps serving
    Failed { report: RefreshReport },
    /// Trigger ignored because a cycle was already running
    Skipped { reason: TriggerReason },
}

/// Current status of the refresh coordinator
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    /// Whether a cycle is currently in progress
    pub is_refreshing: bool,
    /// Stage of the running cycle
    pub current_stage: Option<RefreshStage>,
    /// When the running cycle started
    pub started_at: Option<DateTime<Utc>>,
    /// Last finished cycle
    pub last_result: Option<RefreshReport>,
    /// Last time a cycle published a database
    pub last_success_at: Option<DateTime<Utc>>,
    /// Number of triggers skipped because a cycle was running
    pub skipped_triggers: u64,
}
