//! Serve mode
//!
//! Publishes the local database, then keeps it fresh on the weekly schedule
//! until Ctrl+C.

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::config::StaticConfig;
use crate::runtime::lifetime;
use crate::services::refresh::{RefreshEvent, RefreshScheduler, WeeklyTrigger};
use crate::system::init_logging;

pub async fn run_serve(config: &StaticConfig) -> i32 {
    let _guard = init_logging(&config.logging);
    info!("ipresolver v{} starting", env!("CARGO_PKG_VERSION"));

    let ctx = match lifetime::startup::prepare_startup(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return 1;
        }
    };

    spawn_event_logger(ctx.coordinator.subscribe());

    info!("GeoIP refresh scheduled {} (local time)", ctx.schedule);
    let scheduler = RefreshScheduler::new(
        ctx.coordinator.clone(),
        config.updater.refresh_on_startup,
    )
    .start(WeeklyTrigger::new(ctx.schedule))
    .await;

    if let Some(handle) = ctx.registry.current() {
        info!(
            "Lookups enabled (generation {}, loaded at {})",
            handle.generation(),
            handle.loaded_at().to_rfc3339()
        );
    } else {
        warn!("Lookups unavailable until the first refresh succeeds");
    }

    if lifetime::shutdown::listen_for_shutdown(scheduler).await {
        0
    } else {
        1
    }
}

/// Log the outcome of every cycle, including ones nobody awaited.
fn spawn_event_logger(mut events: tokio::sync::broadcast::Receiver<RefreshEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RefreshEvent::Completed { report }) => info!(
                    "Refresh ({}) published generation {:?} in {} ms",
                    report.reason, report.generation, report.duration_ms
                ),
                Ok(RefreshEvent::Failed { report }) => warn!(
                    "Refresh ({}) failed at {:?} [{}]: {}",
                    report.reason,
                    report.failed_stage,
                    report.error_code.unwrap_or("-"),
                    report.message.as_deref().unwrap_or("")
                ),
                Ok(event) => debug!("Refresh event: {:?}", event),
                Err(RecvError::Lagged(n)) => debug!("Refresh event logger lagged by {}", n),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
