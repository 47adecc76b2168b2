//! RefreshCoordinator
//!
//! Drives one refresh cycle: fetch → extract → install → publish.
//! A failure at any stage leaves the registry and the canonical file alone.
//! The cycle's work directory is removed on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::extractor::ArchiveExtractor;
use super::fetcher::{ArchiveSource, HttpArchiveFetcher};
use super::installer::{DatabaseInstaller, STAGING_PREFIX};
use super::types::{RefreshEvent, RefreshReport, RefreshStage, RefreshStatus, TriggerReason};
use crate::config::{LookupConfig, UpdaterConfig};
use crate::errors::{IpResolverError, Result};
use crate::services::geoip::{ActiveDatabaseRegistry, DatabaseHandle, MaxMindOpener};

/// File name of the downloaded archive inside the work directory.
const ARCHIVE_FILE_NAME: &str = "download.tar.gz";

/// Prefix of per-cycle work directories under the data directory.
const WORK_DIR_PREFIX: &str = ".refresh-";

struct StageFailure {
    stage: RefreshStage,
    error: IpResolverError,
    bytes_downloaded: u64,
}

/// Held for the duration of a cycle; releases the single-flight flag on drop.
///
/// Under `panic = "abort"` nothing is dropped, so a crashed cycle's files are
/// left for [`RefreshCoordinator::sweep_stale_work`] on the next start.
pub struct CycleGuard {
    coordinator: Arc<RefreshCoordinator>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        {
            let mut status = self.coordinator.status.write();
            status.is_refreshing = false;
            status.current_stage = None;
            status.started_at = None;
        }
        self.coordinator.busy.store(false, Ordering::Release);
    }
}

pub struct RefreshCoordinator {
    source: Arc<dyn ArchiveSource>,
    extractor: ArchiveExtractor,
    installer: DatabaseInstaller,
    registry: Arc<ActiveDatabaseRegistry>,
    work_root: PathBuf,
    busy: AtomicBool,
    status: RwLock<RefreshStatus>,
    event_sender: broadcast::Sender<RefreshEvent>,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn ArchiveSource>,
        extractor: ArchiveExtractor,
        installer: DatabaseInstaller,
        registry: Arc<ActiveDatabaseRegistry>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            source,
            extractor,
            installer,
            registry,
            work_root: work_root.into(),
            busy: AtomicBool::new(false),
            status: RwLock::new(RefreshStatus::default()),
            event_sender: sender,
        }
    }

    /// Production wiring: HTTP fetcher + MaxMind opener, paths from config.
    pub fn from_config(
        updater: &UpdaterConfig,
        lookup: &LookupConfig,
        registry: Arc<ActiveDatabaseRegistry>,
    ) -> Self {
        let source = Arc::new(HttpArchiveFetcher::new(
            updater.download_url.clone(),
            Duration::from_secs(updater.fetch_timeout_secs),
        ));
        let installer = DatabaseInstaller::new(
            updater.database_path(),
            Arc::new(MaxMindOpener),
            lookup.cache_capacity,
        );

        Self::new(
            source,
            ArchiveExtractor::new(&updater.data_file_extension),
            installer,
            registry,
            &updater.data_dir,
        )
    }

    pub fn registry(&self) -> &Arc<ActiveDatabaseRegistry> {
        &self.registry
    }

    pub fn canonical_path(&self) -> &Path {
        self.installer.canonical_path()
    }

    /// Current coordinator status
    pub fn status(&self) -> RefreshStatus {
        self.status.read().clone()
    }

    /// Subscribe to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_sender.subscribe()
    }

    /// Publish the database left on disk by a previous run, if any.
    ///
    /// Returns whether a handle was published.
    pub fn load_existing(&self) -> Result<bool> {
        match self.installer.open_existing()? {
            Some(handle) => {
                self.registry.publish(handle);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove work directories and staged files left by a process that died
    /// mid-cycle.
    ///
    /// Only call this while no cycle can be running against the same data
    /// directory. Returns the number of entries removed.
    pub fn sweep_stale_work(&self) -> usize {
        let mut removed = 0;
        removed += sweep_prefixed(&self.work_root, WORK_DIR_PREFIX);
        removed += sweep_prefixed(self.installer.canonical_dir(), STAGING_PREFIX);
        if removed > 0 {
            info!("Removed {} leftover(s) of interrupted refresh cycles", removed);
        }
        removed
    }

    /// Claim the single-flight slot.
    ///
    /// Returns `None` when a cycle is already running; the trigger is dropped,
    /// not queued.
    pub fn try_begin(self: &Arc<Self>, reason: TriggerReason) -> Option<CycleGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let running_since = {
                let mut status = self.status.write();
                status.skipped_triggers += 1;
                status.started_at
            };
            warn!(
                "Refresh trigger ({}) skipped: a cycle is already running since {:?}",
                reason, running_since
            );
            let _ = self.event_sender.send(RefreshEvent::Skipped { reason });
            return None;
        }

        {
            let mut status = self.status.write();
            status.is_refreshing = true;
            status.current_stage = Some(RefreshStage::Prepare);
            status.started_at = Some(Utc::now());
        }

        Some(CycleGuard {
            coordinator: self.clone(),
        })
    }

    /// Run one cycle unless another one is in flight.
    pub async fn run_cycle(self: &Arc<Self>, reason: TriggerReason) -> Option<RefreshReport> {
        let guard = self.try_begin(reason)?;
        Some(self.run_guarded(guard, reason).await)
    }

    /// Run a cycle whose slot was already claimed with [`try_begin`](Self::try_begin).
    ///
    /// The pipeline runs on the blocking pool so lookups are never delayed.
    pub async fn run_guarded(
        self: &Arc<Self>,
        guard: CycleGuard,
        reason: TriggerReason,
    ) -> RefreshReport {
        let this = self.clone();
        let started_at = Utc::now();

        let joined = tokio::task::spawn_blocking(move || {
            let report = this.execute_cycle(reason);
            // 先释放单飞标志再广播结果，订阅者收到结果后即可触发下一轮
            drop(guard);
            this.record(&report);
            report
        })
        .await;

        match joined {
            Ok(report) => report,
            Err(e) => {
                // 阻塞任务 panic 且展开：工作目录已随 TempDir 的 drop 删除
                let error = IpResolverError::install(format!("refresh task aborted: {}", e));
                error!("Refresh cycle ({}) aborted: {}", reason, e);
                let report =
                    RefreshReport::failure(reason, started_at, RefreshStage::Install, &error, 0);
                self.record(&report);
                report
            }
        }
    }

    fn execute_cycle(&self, reason: TriggerReason) -> RefreshReport {
        let started_at = Utc::now();
        info!(
            "Refresh cycle started ({}) from {}",
            reason,
            self.source.describe()
        );
        let _ = self.event_sender.send(RefreshEvent::Started { reason });

        let report = match self.create_work_dir() {
            Ok(work_dir) => {
                let outcome = self.run_stages(work_dir.path());

                let report = match outcome {
                    Ok((handle, bytes)) => {
                        let generation = handle.generation();
                        if let Some(previous) = self.registry.publish(handle) {
                            debug!(
                                "Generation {} superseded, released once in-flight lookups finish",
                                previous.generation()
                            );
                        }
                        RefreshReport::success(reason, started_at, bytes, generation)
                    }
                    Err(failure) => {
                        self.log_failure(&failure);
                        RefreshReport::failure(
                            reason,
                            started_at,
                            failure.stage,
                            &failure.error,
                            failure.bytes_downloaded,
                        )
                    }
                };

                // 清理无条件执行，失败只记录日志
                let work_path = work_dir.path().to_path_buf();
                match work_dir.close() {
                    Ok(()) => debug!("Removed work directory {}", work_path.display()),
                    Err(e) => warn!(
                        "Failed to remove work directory {}: {}",
                        work_path.display(),
                        e
                    ),
                }

                report
            }
            Err(error) => {
                let failure = StageFailure {
                    stage: RefreshStage::Prepare,
                    error,
                    bytes_downloaded: 0,
                };
                self.log_failure(&failure);
                RefreshReport::failure(reason, started_at, failure.stage, &failure.error, 0)
            }
        };

        if report.success {
            info!(
                "Refresh cycle finished in {} ms: {} bytes, generation {:?}",
                report.duration_ms, report.bytes_downloaded, report.generation
            );
        }
        report
    }

    fn create_work_dir(&self) -> Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.work_root).map_err(|e| {
            IpResolverError::file_operation(format!(
                "cannot create data directory {}: {}",
                self.work_root.display(),
                e
            ))
        })?;

        tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(&self.work_root)
            .map_err(|e| {
                IpResolverError::file_operation(format!(
                    "cannot create work directory in {}: {}",
                    self.work_root.display(),
                    e
                ))
            })
    }

    fn run_stages(
        &self,
        work_dir: &Path,
    ) -> std::result::Result<(Arc<DatabaseHandle>, u64), StageFailure> {
        let fail = |stage: RefreshStage, bytes_downloaded: u64| {
            move |error: IpResolverError| StageFailure {
                stage,
                error,
                bytes_downloaded,
            }
        };

        let archive_path = work_dir.join(ARCHIVE_FILE_NAME);

        self.enter(RefreshStage::Fetch);
        let bytes = self
            .source
            .fetch(&archive_path)
            .map_err(fail(RefreshStage::Fetch, 0))?;

        self.enter(RefreshStage::Extract);
        let payload = self
            .extractor
            .extract(&archive_path, work_dir)
            .map_err(fail(RefreshStage::Extract, bytes))?;
        debug!("Found data file {}", payload.data_file.display());

        // 压缩包已无用，提前释放磁盘空间；失败时留给目录清理
        if let Err(e) = std::fs::remove_file(&archive_path) {
            debug!("Archive {} not removed early: {}", archive_path.display(), e);
        }

        self.enter(RefreshStage::Install);
        let handle = self
            .installer
            .install(&payload.data_file)
            .map_err(fail(RefreshStage::Install, bytes))?;

        Ok((handle, bytes))
    }

    fn enter(&self, stage: RefreshStage) {
        debug!("Refresh stage: {}", stage);
        self.status.write().current_stage = Some(stage);
    }

    fn log_failure(&self, failure: &StageFailure) {
        error!(
            stage = %failure.stage,
            code = failure.error.code(),
            "Refresh cycle failed during {}: {}. Keeping the current database (generation {:?})",
            failure.stage,
            failure.error,
            self.registry.generation()
        );
    }

    fn record(&self, report: &RefreshReport) {
        {
            let mut status = self.status.write();
            if report.success {
                status.last_success_at = Some(report.finished_at);
            }
            status.last_result = Some(report.clone());
        }

        let event = if report.success {
            RefreshEvent::Completed {
                report: report.clone(),
            }
        } else {
            RefreshEvent::Failed {
                report: report.clone(),
            }
        };
        let _ = self.event_sender.send(event);
    }
}

fn sweep_prefixed(dir: &Path, prefix: &str) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Cannot scan {} for leftovers: {}", dir.display(), e);
            }
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }

        let path = entry.path();
        let result = match entry.file_type() {
            Ok(t) if t.is_dir() => std::fs::remove_dir_all(&path),
            _ => std::fs::remove_file(&path),
        };
        match result {
            Ok(()) => {
                debug!("Removed leftover {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove leftover {}: {}", path.display(), e),
        }
    }
    removed
}
