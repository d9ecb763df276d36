//! Error types for pkgcaster
//!
//! This module defines the crate-level error type, using `thiserror` for
//! ergonomic error handling. Component errors (registry, store, feed,
//! template) live next to the code that raises them and convert into
//! [`PkgcasterError`] where they cross a command boundary.

use thiserror::Error;

/// Main error type for pkgcaster operations
///
/// Covers configuration loading, feed credentials and message formatting,
/// plus the IO and codec errors that surface at command boundaries.
#[derive(Error, Debug)]
pub enum PkgcasterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound message template errors
    #[error("Format error: {0}")]
    Format(String),

    /// Missing credentials for the feed
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for pkgcaster operations
///
/// Uses `anyhow::Error` so command handlers can attach context while
/// propagating.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = PkgcasterError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_format_error_display() {
        let error = PkgcasterError::Format("unknown field".to_string());
        assert_eq!(error.to_string(), "Format error: unknown field");
    }

    #[test]
    fn test_missing_credentials_error_display() {
        let error = PkgcasterError::MissingCredentials("feed bearer token".to_string());
        assert_eq!(error.to_string(), "Missing credentials: feed bearer token");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: PkgcasterError = io_error.into();
        assert!(matches!(error, PkgcasterError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: PkgcasterError = json_error.into();
        assert!(matches!(error, PkgcasterError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: PkgcasterError = yaml_error.into();
        assert!(matches!(error, PkgcasterError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PkgcasterError>();
    }
}
