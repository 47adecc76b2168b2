use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::services::refresh::SchedulerHandle;

/// 关闭超时时间（秒）
///
/// 正在进行的刷新周期会被等待，但不会无限等待。
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Wait for Ctrl+C, then stop the scheduler.
///
/// Returns `false` when the running refresh cycle did not finish in time.
pub async fn listen_for_shutdown(scheduler: SchedulerHandle) -> bool {
    // 等待 Ctrl+C 信号
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping refresh scheduler...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    match timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        scheduler.shutdown(),
    )
    .await
    {
        Ok(()) => {
            info!("All shutdown tasks completed successfully");
            true
        }
        Err(_) => {
            error!(
                "Refresh cycle still running after {} seconds! Forcing exit.",
                SHUTDOWN_TIMEOUT_SECS
            );
            false
        }
    }
}
