//! Shared fixtures for the integration tests.
//!
//! The fixture dataset is a text file:
//!
//! ```text
//! FIXTUREDB <label>
//! 203.0.113.7 country_code=AU;city=Sydney;region_name=New South Wales
//! ```
//!
//! Lines are `<ip> <field>=<value>;...`. A field named `corrupt` makes the
//! lookup for that address fail as an undecodable record.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};

use flate2::Compression;
use flate2::write::GzEncoder;

use ipresolver::errors::{IpResolverError, Result};
use ipresolver::services::geoip::{
    ActiveDatabaseRegistry, DatabaseMetadata, DatabaseOpener, GeoDatabase, GeoRecord,
};
use ipresolver::services::refresh::{
    ArchiveExtractor, ArchiveSource, DatabaseInstaller, RefreshCoordinator,
};

pub const FIXTURE_MAGIC: &str = "FIXTUREDB";
pub const DATABASE_FILE: &str = "ipDataBase.mmdb";

/// Render a fixture dataset.
pub fn fixture_db(label: &str, entries: &[(&str, &[(&str, &str)])]) -> Vec<u8> {
    let mut out = format!("{} {}\n", FIXTURE_MAGIC, label);
    for (ip, fields) in entries {
        let fields = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";");
        out.push_str(&format!("{} {}\n", ip, fields));
    }
    out.into_bytes()
}

/// A fully populated dataset whose values all carry `label`.
pub fn full_db(label: &str) -> Vec<u8> {
    let city = format!("City-{}", label);
    let region = format!("Region-{}", label);
    let tz = format!("Zone/{}", label);
    let fields = vec![
        ("continent", "Oceania"),
        ("country_code", "AU"),
        ("country_name", "Australia"),
        ("time_zone", tz.as_str()),
        ("latitude", "-33.86"),
        ("longitude", "151.2"),
        ("accuracy_radius", "20"),
        ("city", city.as_str()),
        ("region_name", region.as_str()),
    ];
    fixture_db(label, &[("203.0.113.7", fields.as_slice())])
}

/// Build a `.tar.gz` archive in memory.
pub fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *data)
            .expect("append tar entry");
    }

    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Archive laid out like the published GeoLite2 tarball.
pub fn geolite_archive(db: &[u8]) -> Vec<u8> {
    tar_gz(&[
        ("geolite/COPYRIGHT.txt", &b"Database and Contents Copyright (c)"[..]),
        ("geolite/LICENSE.txt", &b"Creative Commons Attribution-ShareAlike 4.0"[..]),
        ("geolite/GeoLite2-City.mmdb", db),
    ])
}

struct FixtureDb {
    label: String,
    records: HashMap<IpAddr, Option<GeoRecord>>,
}

impl GeoDatabase for FixtureDb {
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>> {
        match self.records.get(&ip) {
            None => Ok(None),
            Some(None) => Err(IpResolverError::lookup_failed(format!(
                "record for {} cannot be decoded",
                ip
            ))),
            Some(Some(record)) => Ok(Some(record.clone())),
        }
    }

    fn metadata(&self) -> DatabaseMetadata {
        DatabaseMetadata {
            database_type: format!("Fixture-{}", self.label),
            build_epoch: 0,
        }
    }

    fn name(&self) -> &'static str {
        "Fixture"
    }
}

/// Opens fixture datasets and counts how often it was asked to.
#[derive(Default)]
pub struct FixtureOpener {
    opens: AtomicUsize,
}

impl FixtureOpener {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DatabaseOpener for FixtureOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GeoDatabase>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let text = fs::read_to_string(path)
            .map_err(|e| IpResolverError::install(format!("{}: {}", path.display(), e)))?;
        let mut lines = text.lines();

        let label = match lines.next().and_then(|h| h.strip_prefix(FIXTURE_MAGIC)) {
            Some(label) => label.trim().to_string(),
            None => {
                return Err(IpResolverError::install(format!(
                    "{} is not a fixture database",
                    path.display()
                )));
            }
        };

        let mut records = HashMap::new();
        for line in lines.filter(|l| !l.trim().is_empty()) {
            let (ip, fields) = line.split_once(' ').unwrap_or((line, ""));
            let ip: IpAddr = ip
                .parse()
                .map_err(|_| IpResolverError::install(format!("bad fixture line: {}", line)))?;

            let mut record = GeoRecord::bare(ip.to_string());
            let mut corrupt = false;
            for pair in fields.split(';').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let value = value.to_string();
                match key {
                    "continent" => record.continent = Some(value),
                    "country_code" => record.country_code = Some(value),
                    "country_name" => record.country_name = Some(value),
                    "time_zone" => record.time_zone = Some(value),
                    "latitude" => record.latitude = value.parse().ok(),
                    "longitude" => record.longitude = value.parse().ok(),
                    "accuracy_radius" => record.accuracy_radius = value.parse().ok(),
                    "city" => record.city = Some(value),
                    "region_name" => record.region_name = Some(value),
                    "corrupt" => corrupt = true,
                    _ => {}
                }
            }
            records.insert(ip, (!corrupt).then_some(record));
        }

        Ok(Box::new(FixtureDb { label, records }))
    }
}

/// Blocks a fetch until the test releases it.
pub struct Gate {
    entered: tokio::sync::mpsc::UnboundedSender<()>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub struct GateControl {
    pub entered: tokio::sync::mpsc::UnboundedReceiver<()>,
    pub release: mpsc::Sender<()>,
}

pub fn gate() -> (Gate, GateControl) {
    let (entered_tx, entered_rx) = tokio::sync::mpsc::unbounded_channel();
    let (release_tx, release_rx) = mpsc::channel();
    (
        Gate {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        },
        GateControl {
            entered: entered_rx,
            release: release_tx,
        },
    )
}

/// In-memory archive source.
pub struct StaticSource {
    payload: Mutex<std::result::Result<Vec<u8>, String>>,
    calls: AtomicUsize,
    gate: Option<Gate>,
}

impl StaticSource {
    pub fn serving(bytes: Vec<u8>) -> Self {
        Self {
            payload: Mutex::new(Ok(bytes)),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            payload: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_payload(&self, bytes: Vec<u8>) {
        *self.payload.lock().unwrap() = Ok(bytes);
    }

    pub fn set_failure(&self, message: &str) {
        *self.payload.lock().unwrap() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchiveSource for StaticSource {
    fn fetch(&self, dest: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _ = gate.entered.send(());
            let _ = gate.release.lock().unwrap().recv();
        }

        let payload = self.payload.lock().unwrap().clone();
        match payload {
            Ok(bytes) => {
                let mut file = fs::File::create(dest)?;
                file.write_all(&bytes)?;
                Ok(bytes.len() as u64)
            }
            Err(message) => Err(IpResolverError::network(message)),
        }
    }

    fn describe(&self) -> String {
        "static fixture".to_string()
    }
}

/// A coordinator over `data_dir` with fixture source and opener.
pub struct Harness {
    pub data_dir: tempfile::TempDir,
    pub source: Arc<StaticSource>,
    pub opener: Arc<FixtureOpener>,
    pub registry: Arc<ActiveDatabaseRegistry>,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl Harness {
    pub fn new(source: StaticSource) -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let source = Arc::new(source);
        let opener = Arc::new(FixtureOpener::default());
        let registry = Arc::new(ActiveDatabaseRegistry::new());

        let installer =
            DatabaseInstaller::new(data_dir.path().join(DATABASE_FILE), opener.clone(), 1000);
        let coordinator = Arc::new(RefreshCoordinator::new(
            source.clone(),
            ArchiveExtractor::new("mmdb"),
            installer,
            registry.clone(),
            data_dir.path(),
        ));

        Self {
            data_dir,
            source,
            opener,
            registry,
            coordinator,
        }
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.data_dir.path().join(DATABASE_FILE)
    }

    /// Write `db` to the canonical path as if left by a previous run.
    pub fn seed_canonical(&self, db: &[u8]) {
        fs::write(self.canonical_path(), db).expect("seed canonical file");
    }

    pub fn canonical_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.canonical_path()).ok()
    }

    /// Names of everything in the data directory except the canonical file.
    pub fn leftovers(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.data_dir.path())
            .expect("read data dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .filter(|name| name != DATABASE_FILE)
            .collect();
        names.sort();
        names
    }
}
