//! # Configuration Module
//!
//! Configuration for the auth gateway: YAML parsing with serde, `Default`
//! impls for every section, and validation with detailed error messages.
//! Duration fields accept human-readable values ("30s", "500ms") via
//! `humantime-serde`.
//!
//! The config file path comes from the `AUTH_GATEWAY_CONFIG` environment
//! variable, falling back to `config/gateway.yaml`; a missing file falls
//! back to defaults with a log line so the gateway can run out of the box.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::core::error::{GatewayError, GatewayResult};
use crate::traffic::circuit_breaker::CircuitBreakerConfig;
use crate::traffic::rate_limiter::RateLimiterConfig;

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "AUTH_GATEWAY_CONFIG";

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Inbound HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream authentication service settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Rate limiter thresholds, shared by all requests to a protected route
    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,

    /// Circuit breaker thresholds, tracked per operation
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway listens on
    pub bind_address: String,

    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,

    /// Origin allowed to make credentialed cross-origin requests
    /// (the frontend development server, by default)
    pub cors_allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 64 * 1024,
            cors_allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Upstream authentication service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream; operations resolve against it
    /// (`{base_url}/login`, `{base_url}/logout`)
    pub base_url: String,

    /// Per-call timeout; expiry is classified as upstream-unavailable
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the configured path, or defaults when the
    /// file does not exist
    pub async fn load() -> GatewayResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&path).exists() {
            info!(path = %path, "no config file found, using defaults");
            return Ok(Self::default());
        }

        let config = Self::load_from_file(&path).await?;
        info!(path = %path, "configuration loaded");
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            GatewayError::config(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Validate the loaded configuration
    pub fn validate(&self) -> GatewayResult<()> {
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                GatewayError::config(format!(
                    "invalid bind address {}: {}",
                    self.server.bind_address, e
                ))
            })?;

        Url::parse(&self.upstream.base_url).map_err(|e| {
            GatewayError::config(format!(
                "invalid upstream base URL {}: {}",
                self.upstream.base_url, e
            ))
        })?;

        if self.upstream.request_timeout.is_zero() {
            return Err(GatewayError::config("upstream request timeout must be positive"));
        }

        if self.rate_limiter.permits_per_window == 0 {
            return Err(GatewayError::config(
                "rate limiter permits_per_window must be at least 1",
            ));
        }
        if self.rate_limiter.window_duration.is_zero() {
            return Err(GatewayError::config(
                "rate limiter window_duration must be positive",
            ));
        }

        let cb = &self.circuit_breaker;
        if cb.sliding_window_size == 0 {
            return Err(GatewayError::config(
                "circuit breaker sliding_window_size must be at least 1",
            ));
        }
        if cb.failure_rate_threshold <= 0.0 || cb.failure_rate_threshold > 100.0 {
            return Err(GatewayError::config(format!(
                "circuit breaker failure_rate_threshold must be in (0, 100], got {}",
                cb.failure_rate_threshold
            )));
        }
        if cb.minimum_samples == 0 || cb.minimum_samples > cb.sliding_window_size {
            return Err(GatewayError::config(format!(
                "circuit breaker minimum_samples must be in [1, {}], got {}",
                cb.sliding_window_size, cb.minimum_samples
            )));
        }
        if cb.half_open_trial_calls == 0 {
            return Err(GatewayError::config(
                "circuit breaker half_open_trial_calls must be at least 1",
            ));
        }
        if cb.half_open_success_threshold == 0
            || cb.half_open_success_threshold > cb.half_open_trial_calls
        {
            return Err(GatewayError::config(format!(
                "circuit breaker half_open_success_threshold must be in [1, {}], got {}",
                cb.half_open_trial_calls, cb.half_open_success_threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = GatewayConfig::default();
        config.rate_limiter.permits_per_window = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.circuit_breaker.failure_rate_threshold = 150.0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.circuit_breaker.minimum_samples = 50; // larger than the window
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.upstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.server.bind_address = "nowhere".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_from_yaml_file() {
        let yaml = r#"
server:
  bind_address: "127.0.0.1:8088"
  max_body_size: 32768
  cors_allowed_origin: "http://localhost:5173"
upstream:
  base_url: "http://auth.internal:9000"
  request_timeout: 3s
  connect_timeout: 500ms
rate_limiter:
  permits_per_window: 3
  window_duration: 1m
circuit_breaker:
  sliding_window_size: 20
  failure_rate_threshold: 40.0
  minimum_samples: 10
  open_duration: 45s
  half_open_trial_calls: 5
  half_open_success_threshold: 3
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = GatewayConfig::load_from_file(file.path()).await.unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.server.bind_address, "127.0.0.1:8088");
        assert_eq!(config.upstream.base_url, "http://auth.internal:9000");
        assert_eq!(config.upstream.request_timeout, Duration::from_secs(3));
        assert_eq!(config.rate_limiter.permits_per_window, 3);
        assert_eq!(config.rate_limiter.window_duration, Duration::from_secs(60));
        assert_eq!(config.rate_limiter.acquire_timeout, None);
        assert_eq!(config.circuit_breaker.open_duration, Duration::from_secs(45));
        assert_eq!(config.circuit_breaker.half_open_trial_calls, 5);
    }

    #[tokio::test]
    async fn test_partial_yaml_uses_section_defaults() {
        let yaml = r#"
upstream:
  base_url: "http://auth.internal:9000"
  request_timeout: 10s
  connect_timeout: 1s
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = GatewayConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.upstream.base_url, "http://auth.internal:9000");
        // Untouched sections fall back to defaults.
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.circuit_breaker.failure_rate_threshold, 50.0);
    }

    #[tokio::test]
    async fn test_load_from_missing_file_is_an_error() {
        assert!(GatewayConfig::load_from_file("/nonexistent/gateway.yaml")
            .await
            .is_err());
    }
}
