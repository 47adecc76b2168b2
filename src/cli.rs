//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for ipresolver using clap's derive macros.

use clap::{Parser, Subcommand};

/// ipresolver - IP geolocation backed by a self-refreshing GeoLite2 database
#[derive(Parser)]
#[command(name = "ipresolver")]
#[command(version)]
#[command(about = "IP geolocation with a self-refreshing GeoLite2 database", long_about = None)]
pub struct Cli {
    /// Path of the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Keep the database fresh on the weekly schedule (default)
    Serve,

    /// Run one refresh cycle now and exit
    Refresh,

    /// Look up one IP address in the installed database
    Lookup {
        /// IPv4 or IPv6 address
        ip: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path, or `-` for stdout (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
