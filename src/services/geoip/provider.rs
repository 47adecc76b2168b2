//! GeoIP 数据库抽象层
//!
//! 统一的数据库查询接口。生产环境使用 MaxMind GeoLite2-City，
//! 刷新流程只依赖这里的 trait，不关心具体文件格式。

use std::net::IpAddr;
use std::path::Path;

use serde::Serialize;

use crate::errors::Result;

/// 地理位置信息
///
/// 除 `ip` 外的所有字段都可能缺失，缺失字段在序列化时直接省略。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoRecord {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    /// ISO 3166-1 alpha-2 国家代码 (e.g., "CN", "US")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// 精度半径（公里）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// 第一级行政区名称
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
}

impl GeoRecord {
    /// A record carrying only the address.
    pub fn bare(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }
}

/// Descriptive metadata of an opened dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMetadata {
    pub database_type: String,
    /// Seconds since the Unix epoch at which the dataset was built.
    pub build_epoch: u64,
}

/// 已打开的、只读的 GeoIP 数据集
///
/// 实现必须是不可变的：一旦打开就不再改变，刷新会产生新的实例。
pub trait GeoDatabase: Send + Sync {
    /// Look up one address.
    ///
    /// `Ok(None)` means the dataset has no entry for the address.
    /// `Err` is reserved for a record that exists but cannot be decoded.
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>>;

    fn metadata(&self) -> DatabaseMetadata;

    /// Provider name, used in logs.
    fn name(&self) -> &'static str;
}

/// Opens a dataset file into an immutable [`GeoDatabase`].
///
/// Implementations must read what they need up front so the returned
/// database does not depend on the file staying at `path`.
pub trait DatabaseOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn GeoDatabase>>;
}
