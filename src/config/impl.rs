use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::{DEFAULT_CONFIG_PATH, StaticConfig};
use crate::errors::Result;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration
///
/// Loads configuration from `path` (or "config.toml" in the current
/// directory). If the file doesn't exist, uses in-memory defaults; a file
/// that exists but doesn't parse is an error. Later calls are no-ops.
///
/// # Examples
/// ```no_run
/// use ipresolver::config::init_config;
/// init_config(None).expect("valid configuration");
/// ```
pub fn init_config(path: Option<&str>) -> Result<()> {
    if CONFIG.get().is_some() {
        return Ok(());
    }
    let config = StaticConfig::load(path.unwrap_or(DEFAULT_CONFIG_PATH))?;
    let _ = CONFIG.set(ArcSwap::from_pointee(config));
    Ok(())
}
