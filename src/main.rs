//! pkgcaster - announce new registry releases on a social feed
//!
#![doc = "pkgcaster - announce new registry releases on a social feed"]
#![doc = "Main entry point for the pkgcaster application."]

use anyhow::Result;
use std::path::Path;

use pkgcaster::cli::{Cli, Commands};
use pkgcaster::commands;
use pkgcaster::config::Config;
use pkgcaster::watcher::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration (file, then env, then CLI)
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    if !Path::new(config_path).exists() {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
    }

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Watch { dry_run, .. } => {
            tracing::info!(
                registry = %config.registry.base_url,
                interval = %config.registry.interval,
                "Starting watcher mode"
            );
            commands::watch::run_watch(config, dry_run).await?;
            Ok(())
        }
        Commands::Render {
            package,
            description,
            url,
            marker,
        } => {
            let message =
                commands::render::render_message(&config, &package, description, url, marker)?;
            println!("{}", message);
            Ok(())
        }
    }
}
