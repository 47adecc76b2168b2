//! One-shot lookup against the installed database

use crate::config::StaticConfig;
use crate::errors::Result;
use crate::runtime::lifetime;
use crate::services::geoip::GeoRecord;

pub async fn run_lookup(config: &StaticConfig, ip: &str) -> i32 {
    let ctx = match lifetime::startup::prepare_startup(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Startup failed: {:#}", e);
            return 1;
        }
    };

    let coordinator = ctx.coordinator.clone();
    match tokio::task::spawn_blocking(move || coordinator.load_existing()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => eprintln!("{}", e.format_colored()),
        Err(e) => eprintln!("Loading the GeoIP database aborted: {}", e),
    }

    match resolve(ip, ctx.lookup_service.lookup(ip)) {
        Ok(record) => match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Failed to serialize record: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("{}", e.format_colored());
            1
        }
    }
}

/// An address with no entry in the dataset is answered with a bare record.
fn resolve(ip: &str, result: Result<GeoRecord>) -> Result<GeoRecord> {
    match result {
        Err(e) if e.is_benign() => Ok(GeoRecord::bare(ip.trim())),
        other => other,
    }
}
