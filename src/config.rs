//! Configuration management for pkgcaster
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{PkgcasterError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for pkgcaster
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Registry polling configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Package filter configuration
    #[serde(default)]
    pub filter: FilterConfig,

    /// Publish pipeline configuration
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL
    #[serde(default = "default_registry_url")]
    pub base_url: String,

    /// Path of the "changed since" query
    #[serde(default = "default_registry_path")]
    pub path: String,

    /// How far back to start when no checkpoint exists (e.g. "30m", "12h")
    #[serde(default = "default_lookback")]
    pub lookback: String,

    /// Poll interval (e.g. "15m")
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// File holding the last processed checkpoint
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,

    /// Prefix of the fallback package page link
    #[serde(default = "default_website_base")]
    pub website_base: String,
}

/// Package filter configuration
///
/// A package passes when its name matches `name_pattern` or one of its
/// keywords is listed in `keywords`. With neither set every package passes.
/// Blocklisted names never pass.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    /// Case-insensitive regex matched against the package name
    pub name_pattern: Option<String>,

    /// Keywords to match (case-insensitive)
    #[serde(default)]
    pub keywords: Vec<String>,

    /// JSON document whose object keys are blocked package names
    pub blocklist_url: Option<String>,
}

/// Publish pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Outbound message template (`${name}`, `${version}`, `${url}`,
    /// `${description}`, `${keywords}`)
    #[serde(default = "default_template")]
    pub template: String,

    /// Appended when a message is cut to fit
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,

    /// Hard message length limit in characters
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Dedup store location
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Social feed API settings
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Social feed API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// API base URL
    #[serde(default = "default_feed_api_base")]
    pub api_base: String,

    /// Bearer token (prefer the PKGCASTER_FEED_TOKEN env var)
    pub bearer_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDOUT only)
    pub file_path: Option<PathBuf>,
}

fn default_registry_url() -> String {
    "http://registry.npmjs.org".to_string()
}

fn default_registry_path() -> String {
    "/-/all/since/".to_string()
}

fn default_lookback() -> String {
    "30m".to_string()
}

fn default_interval() -> String {
    "15m".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_checkpoint_file() -> PathBuf {
    PathBuf::from(".lastnpmsync")
}

fn default_website_base() -> String {
    "https://npmjs.org/package/".to_string()
}

fn default_template() -> String {
    crate::publisher::DEFAULT_TEMPLATE.to_string()
}

fn default_truncation_marker() -> String {
    crate::publisher::DEFAULT_TRUNCATION_MARKER.to_string()
}

fn default_max_length() -> usize {
    140
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pkgcaster.db")
}

fn default_feed_api_base() -> String {
    "https://api.twitter.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            path: default_registry_path(),
            lookback: default_lookback(),
            interval: default_interval(),
            timeout_secs: default_request_timeout(),
            checkpoint_file: default_checkpoint_file(),
            website_base: default_website_base(),
        }
    }
}

impl RegistryConfig {
    /// Parsed lookback window
    pub fn lookback_duration(&self) -> Result<Duration> {
        parse_duration(&self.lookback)
    }

    /// Parsed poll interval
    pub fn interval_duration(&self) -> Result<Duration> {
        parse_duration(&self.interval)
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            truncation_marker: default_truncation_marker(),
            max_length: default_max_length(),
            store_path: default_store_path(),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base: default_feed_api_base(),
            bearer_token: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PkgcasterError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| PkgcasterError::Config(format!("Failed to parse config: {}", e)).into())
    }

    /// Apply `PKGCASTER_*` environment variable overrides
    pub fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("PKGCASTER_REGISTRY_URL") {
            tracing::debug!(url = %url, "Env override: PKGCASTER_REGISTRY_URL");
            self.registry.base_url = url;
        }

        if let Ok(lookback) = std::env::var("PKGCASTER_LOOKBACK") {
            self.registry.lookback = lookback;
        }

        if let Ok(interval) = std::env::var("PKGCASTER_INTERVAL") {
            self.registry.interval = interval;
        }

        if let Ok(timeout) = std::env::var("PKGCASTER_TIMEOUT_SECONDS") {
            match timeout.parse() {
                Ok(v) => self.registry.timeout_secs = v,
                Err(_) => tracing::warn!("Invalid PKGCASTER_TIMEOUT_SECONDS: {}", timeout),
            }
        }

        if let Ok(path) = std::env::var("PKGCASTER_CHECKPOINT_FILE") {
            self.registry.checkpoint_file = PathBuf::from(path);
        }

        if let Ok(pattern) = std::env::var("PKGCASTER_NAME_PATTERN") {
            self.filter.name_pattern = Some(pattern);
        }

        if let Ok(keywords) = std::env::var("PKGCASTER_KEYWORDS") {
            self.filter.keywords = keywords
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            tracing::debug!(keywords = ?self.filter.keywords, "Env override: PKGCASTER_KEYWORDS");
        }

        if let Ok(url) = std::env::var("PKGCASTER_BLOCKLIST_URL") {
            self.filter.blocklist_url = Some(url);
        }

        if let Ok(template) = std::env::var("PKGCASTER_TEMPLATE") {
            self.publisher.template = template;
        }

        if let Ok(path) = std::env::var("PKGCASTER_STORE_PATH") {
            self.publisher.store_path = PathBuf::from(path);
        }

        if let Ok(api_base) = std::env::var("PKGCASTER_FEED_API_BASE") {
            self.publisher.feed.api_base = api_base;
        }

        if let Ok(token) = std::env::var("PKGCASTER_FEED_TOKEN") {
            self.publisher.feed.bearer_token = Some(token);
        }

        if let Ok(level) = std::env::var("PKGCASTER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("PKGCASTER_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json_format = v,
                Err(_) => tracing::warn!("Invalid value for PKGCASTER_JSON_LOGS: {}", json_logs),
            }
        }
    }

    /// Apply overrides carried by the `watch` subcommand
    pub fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if let crate::cli::Commands::Watch {
            since,
            interval,
            checkpoint_file,
            store_path,
            log_file,
            json_logs,
            ..
        } = &cli.command
        {
            if let Some(since) = since {
                self.registry.lookback = since.clone();
            }
            if let Some(interval) = interval {
                self.registry.interval = interval.clone();
            }
            if let Some(path) = checkpoint_file {
                self.registry.checkpoint_file = path.clone();
            }
            if let Some(path) = store_path {
                self.publisher.store_path = path.clone();
            }
            if let Some(path) = log_file {
                self.logging.file_path = Some(path.clone());
            }
            if *json_logs {
                self.logging.json_format = true;
            }
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.registry.base_url.trim().is_empty() {
            return Err(
                PkgcasterError::Config("registry.base_url cannot be empty".to_string()).into(),
            );
        }

        url::Url::parse(&self.registry.base_url).map_err(|e| {
            PkgcasterError::Config(format!(
                "Invalid registry.base_url {}: {}",
                self.registry.base_url, e
            ))
        })?;

        self.registry.lookback_duration()?;

        if self.registry.interval_duration()?.is_zero() {
            return Err(
                PkgcasterError::Config("registry.interval must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.registry.timeout_secs == 0 {
            return Err(PkgcasterError::Config(
                "registry.timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if let Some(pattern) = &self.filter.name_pattern {
            Regex::new(pattern).map_err(|e| {
                PkgcasterError::Config(format!("Invalid filter.name_pattern: {}", e))
            })?;
        }

        if self.publisher.max_length == 0 {
            return Err(PkgcasterError::Config(
                "publisher.max_length must be greater than 0".to_string(),
            )
            .into());
        }

        if self.publisher.truncation_marker.chars().count() >= self.publisher.max_length {
            return Err(PkgcasterError::Config(
                "publisher.truncation_marker must be shorter than publisher.max_length"
                    .to_string(),
            )
            .into());
        }

        if self.publisher.template.trim().is_empty() {
            return Err(
                PkgcasterError::Config("publisher.template cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

/// Parse a relative duration such as `"30m"`, `"12h"` or `"1h30m"`.
///
/// Units: `ms`, `s`, `m`, `h`, `d`, `w`. Whitespace is ignored.
///
/// # Examples
///
/// ```
/// use pkgcaster::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let whole = Regex::new(r"^(?:\d+(?:ms|s|m|h|d|w))+$")?;
    if !whole.is_match(&compact) {
        return Err(PkgcasterError::Config(format!("Invalid duration: {:?}", input)).into());
    }

    let part = Regex::new(r"(\d+)(ms|s|m|h|d|w)")?;
    let mut total = Duration::ZERO;
    for caps in part.captures_iter(&compact) {
        let value: u64 = caps[1]
            .parse()
            .map_err(|_| PkgcasterError::Config(format!("Duration out of range: {:?}", input)))?;
        let millis_per_unit: u64 = match &caps[2] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => 604_800_000,
        };
        let millis = value
            .checked_mul(millis_per_unit)
            .ok_or_else(|| PkgcasterError::Config(format!("Duration out of range: {:?}", input)))?;
        total += Duration::from_millis(millis);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.registry.base_url, "http://registry.npmjs.org");
        assert_eq!(config.registry.path, "/-/all/since/");
        assert_eq!(config.registry.lookback, "30m");
        assert_eq!(config.registry.interval, "15m");
        assert_eq!(config.registry.checkpoint_file, PathBuf::from(".lastnpmsync"));
        assert_eq!(config.publisher.max_length, 140);
        assert_eq!(config.publisher.truncation_marker, "...");
        assert!(config.publisher.feed.bearer_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registry_defaults_match_watcher_defaults() {
        let from_config =
            crate::watcher::WatcherOptions::from_config(&RegistryConfig::default()).unwrap();
        let defaults = crate::watcher::WatcherOptions::default();
        assert_eq!(from_config.lookback, defaults.lookback);
        assert_eq!(from_config.interval, defaults.interval);
        assert_eq!(from_config.lookback, Duration::from_secs(30 * 60));
        assert_eq!(from_config.interval, Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_empty_registry_section_uses_duration_defaults() {
        let config: Config = serde_yaml::from_str("registry: {}\n").unwrap();
        assert_eq!(config.registry.lookback, "30m");
        assert_eq!(config.registry.interval, "15m");
    }

    #[test]
    fn test_parse_yaml_with_partial_sections() {
        let yaml = r#"
registry:
  lookback: 12h
  interval: 5m
filter:
  name_pattern: "^gulp-"
  keywords: [gulp, gulpplugin]
publisher:
  template: "${name}@${version}"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.registry.lookback, "12h");
        assert_eq!(config.registry.base_url, "http://registry.npmjs.org");
        assert_eq!(config.filter.keywords, vec!["gulp", "gulpplugin"]);
        assert_eq!(config.publisher.template, "${name}@${version}");
        assert_eq!(config.publisher.max_length, 140);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.registry.interval = "0s".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let mut config = Config::default();
        config.registry.lookback = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_name_pattern() {
        let mut config = Config::default();
        config.filter.name_pattern = Some("(".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_marker_longer_than_limit() {
        let mut config = Config::default();
        config.publisher.max_length = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_registry_url() {
        let mut config = Config::default();
        config.registry.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_duration("4d").unwrap(), Duration::from_secs(345_600));
        assert_eq!(parse_duration("1w").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("m15").is_err());
        assert!(parse_duration("15x").is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("PKGCASTER_REGISTRY_URL", "http://localhost:5984");
        std::env::set_var("PKGCASTER_KEYWORDS", "gulp, gulpplugin ,");
        std::env::set_var("PKGCASTER_FEED_TOKEN", "secret");
        std::env::set_var("PKGCASTER_JSON_LOGS", "true");

        let mut config = Config::default();
        config.apply_env_vars();

        assert_eq!(config.registry.base_url, "http://localhost:5984");
        assert_eq!(config.filter.keywords, vec!["gulp", "gulpplugin"]);
        assert_eq!(config.publisher.feed.bearer_token.as_deref(), Some("secret"));
        assert!(config.logging.json_format);

        std::env::remove_var("PKGCASTER_REGISTRY_URL");
        std::env::remove_var("PKGCASTER_KEYWORDS");
        std::env::remove_var("PKGCASTER_FEED_TOKEN");
        std::env::remove_var("PKGCASTER_JSON_LOGS");
    }

    #[test]
    #[serial]
    fn test_invalid_env_timeout_is_ignored() {
        std::env::set_var("PKGCASTER_TIMEOUT_SECONDS", "forever");
        let mut config = Config::default();
        config.apply_env_vars();
        assert_eq!(config.registry.timeout_secs, 30);
        std::env::remove_var("PKGCASTER_TIMEOUT_SECONDS");
    }

    #[test]
    #[serial]
    fn test_cli_overrides_for_watch() {
        use clap::Parser;

        let cli = crate::cli::Cli::try_parse_from([
            "pkgcaster",
            "watch",
            "--since",
            "12h",
            "--interval",
            "5m",
            "--checkpoint-file",
            "/tmp/checkpoint",
            "--json-logs",
        ])
        .unwrap();

        let mut config = Config::default();
        config.apply_cli_overrides(&cli);

        assert_eq!(config.registry.lookback, "12h");
        assert_eq!(config.registry.interval, "5m");
        assert_eq!(
            config.registry.checkpoint_file,
            PathBuf::from("/tmp/checkpoint")
        );
        assert!(config.logging.json_format);
    }
}
