//! Database installer
//!
//! Promotes an extracted data file to the canonical path. The file is
//! staged next to the canonical path, validated by opening it, and then
//! renamed over the canonical file in one step, so the canonical file is
//! either fully old or fully new.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{IpResolverError, Result};
use crate::services::geoip::{DatabaseHandle, DatabaseOpener};

/// Prefix of staged copies next to the canonical file.
pub(super) const STAGING_PREFIX: &str = ".ipdb-staging-";

pub struct DatabaseInstaller {
    canonical: PathBuf,
    opener: Arc<dyn DatabaseOpener>,
    cache_capacity: u64,
}

impl DatabaseInstaller {
    pub fn new(
        canonical: impl Into<PathBuf>,
        opener: Arc<dyn DatabaseOpener>,
        cache_capacity: u64,
    ) -> Self {
        Self {
            canonical: canonical.into(),
            opener,
            cache_capacity,
        }
    }

    pub fn canonical_path(&self) -> &Path {
        &self.canonical
    }

    pub(super) fn canonical_dir(&self) -> &Path {
        match self.canonical.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Open the canonical file left by a previous run, if there is one.
    pub fn open_existing(&self) -> Result<Option<Arc<DatabaseHandle>>> {
        if !self.canonical.is_file() {
            debug!("No existing database at {}", self.canonical.display());
            return Ok(None);
        }

        let db = self.opener.open(&self.canonical)?;
        let handle = DatabaseHandle::new(db, self.canonical.clone(), self.cache_capacity);
        info!(
            "Opened existing {} database {} ({}, built at epoch {})",
            handle.provider_name(),
            handle.source().display(),
            handle.metadata().database_type,
            handle.metadata().build_epoch
        );
        Ok(Some(Arc::new(handle)))
    }

    /// Install `data_file` as the canonical database and return a handle to it.
    ///
    /// On error the canonical file is left exactly as it was.
    pub fn install(&self, data_file: &Path) -> Result<Arc<DatabaseHandle>> {
        let dir = self.canonical_dir();
        fs::create_dir_all(dir).map_err(|e| {
            IpResolverError::install(format!("cannot create {}: {}", dir.display(), e))
        })?;

        // 暂存文件与正式文件同目录，保证 rename 是原子的
        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| {
                IpResolverError::install(format!(
                    "cannot create staging file in {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        let copied = File::open(data_file)
            .and_then(|mut src| io::copy(&mut src, staged.as_file_mut()))
            .and_then(|n| staged.as_file().sync_all().map(|_| n))
            .map_err(|e| {
                IpResolverError::install(format!(
                    "cannot stage {}: {}",
                    data_file.display(),
                    e
                ))
            })?;
        debug!("Staged {} bytes at {}", copied, staged.path().display());

        let db = self.opener.open(staged.path()).map_err(|e| {
            IpResolverError::install(format!("staged database failed validation: {}", e))
        })?;

        // 沿用旧文件的权限，否则 rename 后会变成临时文件的 0600
        if let Ok(existing) = fs::metadata(&self.canonical)
            && let Err(e) = fs::set_permissions(staged.path(), existing.permissions())
        {
            warn!(
                "Cannot carry permissions of {} over to the new database: {}",
                self.canonical.display(),
                e
            );
        }

        staged.persist(&self.canonical).map_err(|e| {
            IpResolverError::install(format!(
                "cannot move staged database onto {}: {}",
                self.canonical.display(),
                e.error
            ))
        })?;

        let handle = DatabaseHandle::new(db, self.canonical.clone(), self.cache_capacity);
        info!(
            "Installed {} database at {} ({}, built at epoch {})",
            handle.provider_name(),
            handle.source().display(),
            handle.metadata().database_type,
            handle.metadata().build_epoch
        );
        Ok(Arc::new(handle))
    }
}
