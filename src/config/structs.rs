use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::errors::{IpResolverError, Result};

/// Default location of the static configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - updater: 数据库下载、解压、安装与定时刷新
/// - lookup: 查询缓存
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：IPR，分隔符：__
    /// 示例：IPR__UPDATER__FETCH_TIMEOUT_SECS=600
    pub fn load(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let settings = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 IPR，分隔符 __
            .add_source(
                Environment::with_prefix("IPR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| IpResolverError::config(format!("Failed to build config: {}", e)))?;

        // 文件存在但内容无效时直接报错，不回退到默认值
        let config = settings.try_deserialize::<StaticConfig>().map_err(|e| {
            IpResolverError::config(format!("Invalid configuration in {}: {}", path, e))
        })?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        Ok(config)
    }

    /// Reject values that would make the refresh schedule or the fetcher unusable.
    pub fn validate(&self) -> Result<()> {
        let updater = &self.updater;

        if updater.download_url.trim().is_empty() {
            return Err(IpResolverError::config("updater.download_url must not be empty"));
        }
        if updater.database_file.trim().is_empty() {
            return Err(IpResolverError::config("updater.database_file must not be empty"));
        }
        if updater.data_file_extension.trim_start_matches('.').is_empty() {
            return Err(IpResolverError::config(
                "updater.data_file_extension must not be empty",
            ));
        }
        if updater.fetch_timeout_secs == 0 {
            return Err(IpResolverError::config(
                "updater.fetch_timeout_secs must be greater than zero",
            ));
        }
        if updater.schedule_hour > 23 {
            return Err(IpResolverError::config(format!(
                "updater.schedule_hour must be in 0..=23, got {}",
                updater.schedule_hour
            )));
        }
        if updater.schedule_minute > 59 {
            return Err(IpResolverError::config(format!(
                "updater.schedule_minute must be in 0..=59, got {}",
                updater.schedule_minute
            )));
        }

        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 数据库更新配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// 远程 GeoLite2 压缩包地址（tar.gz）
    #[serde(default = "default_download_url")]
    pub download_url: String,
    /// 数据目录：正式数据库文件与每轮刷新的临时目录都放在这里
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 正式数据库文件名（位于 data_dir 下）
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// 压缩包中数据文件的扩展名（不区分大小写）
    #[serde(default = "default_data_file_extension")]
    pub data_file_extension: String,
    /// 单次下载的总超时（秒）
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// 启动时立即刷新一次
    #[serde(default = "default_refresh_on_startup")]
    pub refresh_on_startup: bool,
    /// 每周刷新的星期（本地时区）
    #[serde(default = "default_schedule_weekday")]
    pub schedule_weekday: Weekday,
    #[serde(default)]
    pub schedule_hour: u32,
    #[serde(default)]
    pub schedule_minute: u32,
}

impl UpdaterConfig {
    /// Path of the canonical database file.
    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join(&self.database_file)
    }
}

/// 查询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// 每个数据库句柄内的查询缓存容量
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_download_url() -> String {
    "http://geolite.maxmind.com/download/geoip/database/GeoLite2-City.tar.gz".to_string()
}

fn default_data_dir() -> String {
    ".".to_string()
}

fn default_database_file() -> String {
    "ipDataBase.mmdb".to_string()
}

fn default_data_file_extension() -> String {
    "mmdb".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_refresh_on_startup() -> bool {
    true
}

fn default_schedule_weekday() -> Weekday {
    Weekday::Sun
}

fn default_cache_capacity() -> u64 {
    50_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            download_url: default_download_url(),
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            data_file_extension: default_data_file_extension(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            refresh_on_startup: default_refresh_on_startup(),
            schedule_weekday: default_schedule_weekday(),
            schedule_hour: 0,
            schedule_minute: 0,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
