//! ipresolver - IP geolocation with a self-refreshing GeoLite2 database
//!
//! This library answers "where is this IP address" from a local MaxMind
//! GeoLite2 City database and keeps that database current: once at startup
//! and then weekly it downloads the published archive, unpacks it, installs
//! the data file and swaps the new database in without interrupting lookups.
//!
//! # Architecture
//! - `services::geoip`: database handles, active-database registry, lookups
//! - `services::refresh`: fetch / extract / install pipeline and its scheduler
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging setup
//! - `cli`: Command-line definitions

pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod system;
