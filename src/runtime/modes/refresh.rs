//! One-shot refresh
//!
//! Runs a single cycle in the foreground and reports the result.

use colored::Colorize;
use tracing::error;

use crate::config::StaticConfig;
use crate::runtime::lifetime;
use crate::services::refresh::TriggerReason;
use crate::system::init_logging;

pub async fn run_refresh(config: &StaticConfig) -> i32 {
    let _guard = init_logging(&config.logging);

    let ctx = match lifetime::startup::prepare_startup(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return 1;
        }
    };

    let Some(report) = ctx.coordinator.run_cycle(TriggerReason::Manual).await else {
        println!("{}", "A refresh cycle is already running".yellow());
        return 1;
    };

    if report.success {
        println!(
            "{} {} ({} bytes, {} ms)",
            "GeoIP database installed at".green(),
            ctx.coordinator.canonical_path().display().to_string().blue(),
            report.bytes_downloaded,
            report.duration_ms
        );
        0
    } else {
        println!(
            "{} {} {}",
            format!(
                "Refresh failed during {}:",
                report
                    .failed_stage
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown stage".to_string())
            )
            .red()
            .bold(),
            format!("[{}]", report.error_code.unwrap_or("-")).red(),
            report.message.as_deref().unwrap_or("")
        );
        println!(
            "  {}",
            "The previously installed database, if any, was left untouched".dimmed()
        );
        1
    }
}
