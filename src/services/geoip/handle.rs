//! 数据库句柄
//!
//! 一个句柄对应一个已打开的数据集版本，发布后不再修改。
//! 查询缓存属于句柄本身，所以切换句柄时缓存也随之切换。

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use moka::sync::Cache;

use super::provider::{DatabaseMetadata, GeoDatabase, GeoRecord};
use crate::errors::Result;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Immutable, queryable view over one dataset version.
pub struct DatabaseHandle {
    db: Box<dyn GeoDatabase>,
    generation: u64,
    source: PathBuf,
    loaded_at: DateTime<Utc>,
    metadata: DatabaseMetadata,
    /// IP → 查询结果（None 用于负缓存）
    cache: Cache<IpAddr, Option<GeoRecord>>,
}

impl DatabaseHandle {
    pub fn new(db: Box<dyn GeoDatabase>, source: impl Into<PathBuf>, cache_capacity: u64) -> Self {
        let metadata = db.metadata();
        Self {
            db,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            source: source.into(),
            loaded_at: Utc::now(),
            metadata,
            cache: Cache::builder().max_capacity(cache_capacity).build(),
        }
    }

    /// Query the dataset, consulting the per-handle cache first.
    ///
    /// Decode failures are returned as-is and never cached.
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>> {
        if let Some(cached) = self.cache.get(&ip) {
            return Ok(cached);
        }

        let record = self.db.lookup(ip)?;
        self.cache.insert(ip, record.clone());
        Ok(record)
    }

    /// Monotonic identifier, unique per opened handle in this process.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    pub fn provider_name(&self) -> &'static str {
        self.db.name()
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("generation", &self.generation)
            .field("provider", &self.db.name())
            .field("source", &self.source)
            .field("loaded_at", &self.loaded_at)
            .field("metadata", &self.metadata)
            .finish()
    }
}
