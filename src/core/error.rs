//! # Error Handling Module
//!
//! Error types for the auth gateway, built on `thiserror`, with HTTP status
//! code mappings for client responses.
//!
//! The resilience control signals (rate-limiter denial, open circuit) are
//! ordinary `ProxyOutcome` variants and are resolved inside the proxy
//! handler; the variants here exist for the façade boundary (configuration
//! loading, startup, handler plumbing) and for log classification. None of
//! these errors is process-fatal: the gateway keeps serving even when every
//! upstream call fails.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error types for the auth gateway
///
/// Each variant represents a different category of failure. The `#[error]`
/// attribute from `thiserror` implements `Display` with the given message.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Configuration-related errors (invalid config, missing values, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Rate limiter denied admission for an operation
    #[error("Rate limit exceeded for operation: {operation}")]
    RateLimited { operation: String },

    /// Circuit breaker is open, preventing requests to the upstream
    #[error("Circuit breaker open for operation: {operation}")]
    CircuitOpen { operation: String },

    /// Upstream service is unreachable, timed out, or returned a server error
    #[error("Upstream unavailable for operation {operation}: {reason}")]
    UpstreamUnavailable { operation: String, reason: String },

    /// Upstream returned a body that is not a well-formed JSON object
    #[error("Malformed upstream payload for operation {operation}: {reason}")]
    MalformedPayload { operation: String, reason: String },

    /// I/O errors (file operations, network errors, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// HTTP client errors when building or issuing upstream requests
    #[error("HTTP client error: {message}")]
    HttpClient { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an upstream-unavailable error for an operation
    pub fn upstream_unavailable<S: Into<String>>(operation: S, reason: S) -> Self {
        Self::UpstreamUnavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::MalformedPayload { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json { .. } => StatusCode::BAD_REQUEST,
            Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::HttpClient { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get a string representation of the error type for logs and API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
            Self::HttpClient { .. } => "http_client_error",
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpClient {
            message: err.to_string(),
        }
    }
}

/// Convert errors that escape to the façade boundary into HTTP responses
///
/// Allows axum handlers to bubble a `GatewayError` with `?` and still return
/// a well-formed JSON error body with the mapped status code.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}
