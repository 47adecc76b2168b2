//! Archive fetcher
//!
//! Downloads the remote dataset archive and streams it straight to disk.
//! No retries here: the next scheduled cycle is the retry.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};
use ureq::Agent;

use crate::errors::{IpResolverError, Result};

/// Where a cycle gets its archive bytes from.
pub trait ArchiveSource: Send + Sync {
    /// Write the complete archive to `dest` and return the number of bytes written.
    ///
    /// On error `dest` may hold a partial file; the caller owns its removal.
    fn fetch(&self, dest: &Path) -> Result<u64>;

    /// Human readable origin, used in logs.
    fn describe(&self) -> String;
}

/// HTTP(S) archive fetcher backed by a ureq agent.
pub struct HttpArchiveFetcher {
    url: String,
    agent: Agent,
}

impl HttpArchiveFetcher {
    /// `timeout` bounds the whole request including the body transfer.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            url: url.into(),
            agent,
        }
    }
}

impl ArchiveSource for HttpArchiveFetcher {
    fn fetch(&self, dest: &Path) -> Result<u64> {
        debug!("Requesting GeoIP archive from \"{}\"", self.url);

        // ureq 默认把非 2xx 状态码当作错误返回
        let response = self.agent.get(&self.url).call().map_err(|e| {
            IpResolverError::network(format!("request to \"{}\" failed: {}", self.url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IpResolverError::network(format!(
                "\"{}\" answered with status {}",
                self.url, status
            )));
        }

        let file = File::create(dest).map_err(|e| {
            IpResolverError::file_operation(format!(
                "cannot create {}: {}",
                dest.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::new(file);
        let mut body = response.into_body().into_reader();

        let written = std::io::copy(&mut body, &mut writer).map_err(|e| {
            IpResolverError::network(format!(
                "download from \"{}\" interrupted: {}",
                self.url, e
            ))
        })?;

        writer
            .flush()
            .and_then(|_| writer.get_ref().sync_all())
            .map_err(|e| {
                IpResolverError::file_operation(format!(
                    "cannot flush {}: {}",
                    dest.display(),
                    e
                ))
            })?;

        info!("Downloaded {} bytes from \"{}\"", written, self.url);
        Ok(written)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
