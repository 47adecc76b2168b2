use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::StaticConfig;
use crate::services::geoip::{ActiveDatabaseRegistry, LookupService, global_registry};
use crate::services::refresh::{RefreshCoordinator, WeeklySchedule};

pub struct StartupContext {
    pub registry: Arc<ActiveDatabaseRegistry>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub lookup_service: LookupService,
    pub schedule: WeeklySchedule,
}

/// 准备启动上下文
/// 包括数据目录、registry、刷新协调器和查询服务
pub fn prepare_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = Instant::now();
    debug!("Starting pre-startup processing...");

    let updater = &config.updater;
    std::fs::create_dir_all(&updater.data_dir)
        .with_context(|| format!("Failed to create data directory {}", updater.data_dir))?;

    let schedule =
        WeeklySchedule::from_config(updater).context("Invalid refresh schedule in config")?;

    let registry = global_registry();
    let coordinator = Arc::new(RefreshCoordinator::from_config(
        updater,
        &config.lookup,
        registry.clone(),
    ));
    let lookup_service = LookupService::new(registry.clone());

    info!(
        "GeoIP database path: {}, source: {}",
        coordinator.canonical_path().display(),
        updater.download_url
    );
    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        registry,
        coordinator,
        lookup_service,
        schedule,
    })
}
