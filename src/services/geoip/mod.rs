//! GeoIP 服务模块
//!
//! 提供 IP 地址地理位置查询功能：
//! - MaxMind GeoLite2 本地数据库
//! - 不可变数据库句柄 + 原子发布的 registry

mod handle;
mod lookup;
mod maxmind;
mod provider;
mod registry;

pub use handle::DatabaseHandle;
pub use lookup::LookupService;
pub use maxmind::{MaxMindDatabase, MaxMindOpener};
pub use provider::{DatabaseMetadata, DatabaseOpener, GeoDatabase, GeoRecord};
pub use registry::{ActiveDatabaseRegistry, global_registry};
