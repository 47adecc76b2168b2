//! MaxMind GeoLite2 数据库实现
//!
//! 使用本地 MaxMind GeoLite2-City.mmdb 文件进行 IP 地理位置查询

use std::net::IpAddr;
use std::path::Path;

use maxminddb::{Reader, geoip2};
use tracing::trace;

use super::provider::{DatabaseMetadata, DatabaseOpener, GeoDatabase, GeoRecord};
use crate::errors::{IpResolverError, Result};

/// MaxMind GeoLite2-City 数据集
///
/// 文件在打开时整体读入内存，之后与磁盘文件无关。
pub struct MaxMindDatabase {
    reader: Reader<Vec<u8>>,
}

impl MaxMindDatabase {
    /// 从文件路径打开
    pub fn open(path: &Path) -> std::result::Result<Self, maxminddb::MaxMindDbError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }
}

/// 逐字段提取：任何一个字段缺失都只影响该字段本身
fn record_from_city(ip: IpAddr, city: &geoip2::City<'_>) -> GeoRecord {
    GeoRecord {
        ip: ip.to_string(),
        continent: city.continent.names.english.map(String::from),
        country_code: city.country.iso_code.map(String::from),
        country_name: city.country.names.english.map(String::from),
        time_zone: city.location.time_zone.map(String::from),
        latitude: city.location.latitude,
        longitude: city.location.longitude,
        accuracy_radius: city.location.accuracy_radius,
        city: city.city.names.english.map(String::from),
        region_name: city
            .subdivisions
            .first()
            .and_then(|s| s.names.english)
            .map(String::from),
    }
}

impl GeoDatabase for MaxMindDatabase {
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>> {
        let result = self.reader.lookup(ip)?;

        let Some(city) = result.decode::<geoip2::City>()? else {
            return Ok(None);
        };

        let record = record_from_city(ip, &city);
        trace!(
            "MaxMind lookup for {}: country={:?}, city={:?}",
            ip, record.country_code, record.city
        );

        Ok(Some(record))
    }

    fn metadata(&self) -> DatabaseMetadata {
        DatabaseMetadata {
            database_type: self.reader.metadata.database_type.clone(),
            build_epoch: self.reader.metadata.build_epoch,
        }
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}

/// Opens `.mmdb` files with [`MaxMindDatabase`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindOpener;

impl DatabaseOpener for MaxMindOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GeoDatabase>> {
        let db = MaxMindDatabase::open(path).map_err(|e| {
            IpResolverError::install(format!(
                "cannot open MaxMind database {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Box::new(db))
    }
}
