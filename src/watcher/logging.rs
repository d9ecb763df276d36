//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file output.
//! Integrates with the tracing ecosystem for structured event logging.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Logs always go to
/// STDOUT and are additionally appended to `file_path` when one is set.
///
/// # Errors
///
/// Returns error if the level is not a valid filter, the log file cannot be
/// opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use pkgcaster::config::LoggingConfig;
/// use pkgcaster::watcher::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     json_format: true,
///     file_path: None,
/// };
///
/// let result = init_logging(&config);
/// assert!(result.is_ok());
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let mut layers = vec![stdout_layer(config.json_format)];
    if let Some(path) = &config.file_path {
        layers.push(file_layer(path, config.json_format)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(&config.level)?)
        .try_init()?;

    Ok(())
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn stdout_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_level(true).boxed()
    }
}

fn file_layer(path: &Path, json: bool) -> Result<BoxedLayer> {
    let file = Arc::new(OpenOptions::new().create(true).append(true).open(path)?);

    Ok(if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(file)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(file)
            .boxed()
    })
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?)
}
