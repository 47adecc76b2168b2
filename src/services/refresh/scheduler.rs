//! Refresh scheduler
//!
//! Loads whatever database is already on disk, fires one cycle at startup and
//! then one per trigger from a [`TriggerSource`]. Triggers arriving while a
//! cycle runs are skipped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{
    DateTime, Datelike, Days, Local, LocalResult, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
    Weekday,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::coordinator::RefreshCoordinator;
use super::types::TriggerReason;
use crate::config::UpdaterConfig;
use crate::errors::{IpResolverError, Result};

/// Upper bound of one sleep while waiting for the next weekly instant, so wall
/// clock changes (suspend, NTP steps) are picked up.
const MAX_SLEEP: Duration = Duration::from_secs(60 * 60);

/// A fixed weekly instant in some time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    weekday: Weekday,
    time: NaiveTime,
}

impl WeeklySchedule {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            IpResolverError::config(format!("invalid schedule time {:02}:{:02}", hour, minute))
        })?;
        Ok(Self { weekday, time })
    }

    pub fn from_config(updater: &UpdaterConfig) -> Result<Self> {
        Self::new(
            updater.schedule_weekday,
            updater.schedule_hour,
            updater.schedule_minute,
        )
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First scheduled instant strictly after `now`, in `now`'s time zone.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.naive_local().date();
        let days_ahead = (7 + self.weekday.num_days_from_monday()
            - today.weekday().num_days_from_monday())
            % 7;
        let mut date = today + Days::new(u64::from(days_ahead));

        loop {
            if let Some(candidate) = resolve_local(&tz, date.and_time(self.time))
                && candidate > *now
            {
                return candidate;
            }
            date = date + Days::new(7);
        }
    }
}

impl std::fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "every {} at {}", self.weekday, self.time.format("%H:%M"))
    }
}

/// Map a wall-clock time to an instant. Ambiguous times (DST fall-back) take
/// the earlier one; skipped times (DST spring-forward) move one hour later.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest(),
    }
}

/// Source of refresh triggers.
#[async_trait]
pub trait TriggerSource: Send {
    /// Wait for the next trigger. `None` means no more triggers will come.
    async fn next_trigger(&mut self) -> Option<TriggerReason>;
}

/// Fires at each [`WeeklySchedule`] instant in the local time zone.
pub struct WeeklyTrigger {
    schedule: WeeklySchedule,
}

impl WeeklyTrigger {
    pub fn new(schedule: WeeklySchedule) -> Self {
        Self { schedule }
    }
}

#[async_trait]
impl TriggerSource for WeeklyTrigger {
    async fn next_trigger(&mut self) -> Option<TriggerReason> {
        let next = self.schedule.next_after(&Local::now());
        info!("Next scheduled GeoIP refresh at {}", next.to_rfc3339());

        loop {
            let now = Local::now();
            if now >= next {
                return Some(TriggerReason::Schedule);
            }
            let remaining = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(remaining.min(MAX_SLEEP)).await;
        }
    }
}

/// Triggers delivered over a channel.
///
/// Used for on-demand refreshes and to drive the scheduler without waiting on
/// the wall clock.
pub struct ChannelTrigger {
    receiver: mpsc::Receiver<TriggerReason>,
}

impl ChannelTrigger {
    pub fn new(buffer: usize) -> (mpsc::Sender<TriggerReason>, Self) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (sender, Self { receiver })
    }
}

#[async_trait]
impl TriggerSource for ChannelTrigger {
    async fn next_trigger(&mut self) -> Option<TriggerReason> {
        self.receiver.recv().await
    }
}

pub struct RefreshScheduler {
    coordinator: Arc<RefreshCoordinator>,
    refresh_on_startup: bool,
}

impl RefreshScheduler {
    pub fn new(coordinator: Arc<RefreshCoordinator>, refresh_on_startup: bool) -> Self {
        Self {
            coordinator,
            refresh_on_startup,
        }
    }

    /// Clear leftovers of interrupted cycles, publish the on-disk database
    /// (if any), then start the trigger loop.
    ///
    /// When this returns, lookups can already be answered from local data.
    pub async fn start<T>(self, trigger: T) -> SchedulerHandle
    where
        T: TriggerSource + 'static,
    {
        let coordinator = self.coordinator.clone();
        // 此时本进程尚未开始任何刷新周期，可以安全清理上次崩溃的残留
        let loaded = tokio::task::spawn_blocking(move || {
            coordinator.sweep_stale_work();
            coordinator.load_existing()
        })
        .await;
        match loaded {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => info!(
                "No local GeoIP database at {}, waiting for the first refresh",
                self.coordinator.canonical_path().display()
            ),
            Ok(Err(e)) => warn!(
                "Existing GeoIP database at {} could not be opened: {}",
                self.coordinator.canonical_path().display(),
                e
            ),
            Err(e) => warn!("Loading the existing GeoIP database aborted: {}", e),
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(trigger, shutdown_rx));

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run<T: TriggerSource>(self, mut trigger: T, mut shutdown: watch::Receiver<bool>) {
        let mut in_flight: Option<JoinHandle<()>> = None;

        if self.refresh_on_startup {
            self.fire(TriggerReason::Startup, &mut in_flight);
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("Refresh scheduler received shutdown");
                    break;
                }
                next = trigger.next_trigger() => match next {
                    Some(reason) => self.fire(reason, &mut in_flight),
                    None => {
                        debug!("Refresh trigger source closed");
                        break;
                    }
                },
            }
        }

        // 刷新周期不可中途取消，等待其自然结束
        if let Some(task) = in_flight.take()
            && let Err(e) = task.await
        {
            warn!("Refresh cycle task ended abnormally: {}", e);
        }
        info!("Refresh scheduler stopped");
    }

    fn fire(&self, reason: TriggerReason, in_flight: &mut Option<JoinHandle<()>>) {
        let Some(guard) = self.coordinator.try_begin(reason) else {
            return;
        };

        let coordinator = self.coordinator.clone();
        *in_flight = Some(tokio::spawn(async move {
            coordinator.run_guarded(guard, reason).await;
        }));
    }
}

/// Running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop accepting triggers and wait for a running cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Refresh scheduler task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
