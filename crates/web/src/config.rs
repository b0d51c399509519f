//! Application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AZURE_STORAGE_CONNECTION_STRING` - Storage account connection string
//!
//! ## Optional
//! - `RETAIL_HOST` - Bind address (default: 127.0.0.1)
//! - `RETAIL_PORT` - Listen port (default: 3000)
//! - `RETAIL_IMAGE_URLS` - `signed` or `public` image references (default: signed)
//! - `RETAIL_MAX_UPLOAD_BYTES` - Request body limit for uploads (default: 10485760)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::storage::ImageUrlPolicy;
use crate::storage::azure::ConnectionString;

const CONNECTION_STRING_VAR: &str = "AZURE_STORAGE_CONNECTION_STRING";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Web application configuration.
///
/// The connection string redacts its account key in `Debug` output.
#[derive(Debug, Clone)]
pub struct RetailConfig {
    /// Storage account holding every table, container, queue and share
    pub connection_string: ConnectionString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// How product image references are produced
    pub image_urls: ImageUrlPolicy,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl RetailConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let connection_string = get_required_env(CONNECTION_STRING_VAR)?
            .parse::<ConnectionString>()
            .map_err(|e| ConfigError::InvalidEnvVar(CONNECTION_STRING_VAR.to_string(), e.to_string()))?;
        let host = get_env_or_default("RETAIL_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("RETAIL_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("RETAIL_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("RETAIL_PORT".to_string(), e.to_string()))?;
        let image_urls = parse_image_urls(&get_env_or_default("RETAIL_IMAGE_URLS", "signed"))?;
        let max_upload_bytes = get_optional_env("RETAIL_MAX_UPLOAD_BYTES")
            .map_or(Ok(DEFAULT_MAX_UPLOAD_BYTES), |v| v.parse::<usize>())
            .map_err(|e| {
                ConfigError::InvalidEnvVar("RETAIL_MAX_UPLOAD_BYTES".to_string(), e.to_string())
            })?;

        Ok(Self {
            connection_string,
            host,
            port,
            image_urls,
            max_upload_bytes,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_image_urls(value: &str) -> Result<ImageUrlPolicy, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "signed" => Ok(ImageUrlPolicy::default()),
        "public" => Ok(ImageUrlPolicy::Public),
        other => Err(ConfigError::InvalidEnvVar(
            "RETAIL_IMAGE_URLS".to_string(),
            format!("expected 'signed' or 'public', got '{other}'"),
        )),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> RetailConfig {
        RetailConfig {
            connection_string: "AccountName=acct;AccountKey=c3VwZXItc2VjcmV0LWtleQ=="
                .parse()
                .unwrap(),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            image_urls: ImageUrlPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_parse_image_urls() {
        assert_eq!(parse_image_urls("signed").unwrap(), ImageUrlPolicy::default());
        assert_eq!(parse_image_urls(" PUBLIC ").unwrap(), ImageUrlPolicy::Public);

        let err = parse_image_urls("cdn").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_config_debug_redacts_account_key() {
        let debug_output = format!("{:?}", config());

        assert!(debug_output.contains("acct"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("c3VwZXItc2VjcmV0LWtleQ=="));
    }
}
