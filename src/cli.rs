//! Command-line interface definition for pkgcaster
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pkgcaster - announce new registry releases on a social feed
///
/// Polls the registry change feed, filters packages, and posts each new
/// `name@version` once.
#[derive(Parser, Debug, Clone)]
#[command(name = "pkgcaster")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for pkgcaster
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch the registry and announce matching packages
    Watch {
        /// How far back to look when no checkpoint exists (e.g. 12h)
        #[arg(long)]
        since: Option<String>,

        /// Poll interval (e.g. 5m)
        #[arg(short, long)]
        interval: Option<String>,

        /// Checkpoint file location
        #[arg(long)]
        checkpoint_file: Option<PathBuf>,

        /// Dedup store location
        #[arg(long)]
        store_path: Option<PathBuf>,

        /// Also write logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Emit JSON-formatted logs
        #[arg(long)]
        json_logs: bool,

        /// Log matching packages without recording or posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the message a package would be announced with
    Render {
        /// Package as `name@version`
        package: String,

        /// Package description
        #[arg(short, long)]
        description: Option<String>,

        /// Link to include (defaults to the registry package page)
        #[arg(short, long)]
        url: Option<String>,

        /// Override the configured truncation marker
        #[arg(short, long)]
        marker: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
