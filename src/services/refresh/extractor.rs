//! Archive extractor
//!
//! Unpacks a gzip-compressed tar archive into the cycle's work directory and
//! locates the one data file inside it.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, warn};

use crate::errors::{IpResolverError, Result};

/// Directory name of the unpacked archive inside the work directory.
const PAYLOAD_DIR: &str = "payload";

/// Unpacked archive contents.
#[derive(Debug, Clone)]
pub struct ExtractedPayload {
    /// Directory holding everything that was unpacked.
    pub dir: PathBuf,
    /// The single data file of interest.
    pub data_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    extension: String,
}

impl ArchiveExtractor {
    /// `extension` is matched case-insensitively; a leading dot is ignored.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn extract(&self, archive_path: &Path, work_dir: &Path) -> Result<ExtractedPayload> {
        let payload_dir = work_dir.join(PAYLOAD_DIR);
        fs::create_dir_all(&payload_dir).map_err(|e| {
            IpResolverError::file_operation(format!(
                "cannot create {}: {}",
                payload_dir.display(),
                e
            ))
        })?;

        let file = File::open(archive_path).map_err(|e| {
            IpResolverError::archive_corrupt(format!(
                "cannot open {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

        let entries = archive
            .entries()
            .map_err(|e| IpResolverError::archive_corrupt(format!("unreadable archive: {}", e)))?;

        let mut unpacked = 0usize;
        for entry in entries {
            let mut entry = entry
                .map_err(|e| IpResolverError::archive_corrupt(format!("bad archive entry: {}", e)))?;

            let entry_path = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "<invalid path>".to_string());

            // unpack_in 拒绝包含 `..` 或绝对路径的条目，保证不会写出工作目录
            let inside = entry.unpack_in(&payload_dir).map_err(|e| {
                IpResolverError::archive_corrupt(format!("cannot unpack {}: {}", entry_path, e))
            })?;
            if inside {
                unpacked += 1;
            } else {
                warn!("Skipped archive entry outside the work directory: {}", entry_path);
            }
        }
        debug!("Unpacked {} archive entries into {}", unpacked, payload_dir.display());

        let candidates = find_data_files(&payload_dir, &self.extension)?;
        match candidates.as_slice() {
            [data_file] => Ok(ExtractedPayload {
                dir: payload_dir.clone(),
                data_file: data_file.clone(),
            }),
            [] => Err(IpResolverError::payload_not_found(format!(
                "archive contains no .{} file",
                self.extension
            ))),
            many => Err(IpResolverError::payload_not_found(format!(
                "archive contains {} .{} files, expected exactly one: {}",
                many.len(),
                self.extension,
                many.iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Regular files below `dir` whose extension matches, in sorted order.
fn find_data_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && has_extension(&path, extension) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
