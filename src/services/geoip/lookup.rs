//! IP 查询服务
//!
//! 每次查询都从 registry 取当前句柄，持有引用直到查询结束，
//! 因此与后台刷新完全独立。

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{trace, warn};

use super::provider::GeoRecord;
use super::registry::ActiveDatabaseRegistry;
use crate::errors::{IpResolverError, Result};

#[derive(Clone)]
pub struct LookupService {
    registry: Arc<ActiveDatabaseRegistry>,
}

impl LookupService {
    pub fn new(registry: Arc<ActiveDatabaseRegistry>) -> Self {
        Self { registry }
    }

    /// 查询 IP 地址的地理位置
    ///
    /// - 尚无数据库 → `DatabaseUnavailable`（先于 IP 校验）
    /// - IP 格式错误 → `InvalidIp`
    /// - 数据库中无记录 → `LookupMiss`
    pub fn lookup(&self, ip: &str) -> Result<GeoRecord> {
        let Some(handle) = self.registry.current() else {
            return Err(IpResolverError::database_unavailable(
                "no GeoIP database has been installed yet",
            ));
        };

        let ip = ip.trim();
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| IpResolverError::invalid_ip(format!("'{}' is not an IP address", ip)))?;

        match handle.lookup(addr) {
            Ok(Some(mut record)) => {
                record.ip = ip.to_string();
                Ok(record)
            }
            Ok(None) => {
                trace!("No GeoIP entry for {} (generation {})", ip, handle.generation());
                Err(IpResolverError::lookup_miss(format!("no entry for {}", ip)))
            }
            Err(e) => {
                warn!(
                    "GeoIP record for {} could not be decoded (generation {}): {}",
                    ip,
                    handle.generation(),
                    e
                );
                Err(e)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available()
    }
}
