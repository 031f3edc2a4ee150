//! # Upstream Transport Client
//!
//! The outbound side of the gateway: a thin, single-attempt HTTP client for
//! the upstream authentication service. The transport is abstracted behind
//! the [`UpstreamClient`] trait so the proxy handler can be exercised in
//! tests without a network.
//!
//! No retries happen here; retry policy, if any, belongs to whoever owns
//! the transport. The per-call timeout is mandatory so a hung upstream
//! cannot stall a request task indefinitely.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use crate::core::config::UpstreamConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::proxy::Operation;

/// Transport-level failures, classified for outcome mapping
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The per-call timeout expired before a response arrived
    #[error("request timed out")]
    Timeout,

    /// TCP/TLS connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure (reset mid-body, protocol error, ...)
    #[error("transport error: {0}")]
    Transport(String),
}

/// Raw response from the upstream: status plus undecoded body bytes
///
/// Classification (2xx/4xx/5xx) and body decoding are the proxy handler's
/// job, not the transport's.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    /// `Content-Type` header as the upstream sent it, if any
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Seam between the proxy handler and the wire
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Issue a single outbound attempt for the operation
    ///
    /// The `Authorization` header value, when present, is forwarded
    /// verbatim. A JSON body, when present, is sent as-is.
    async fn send(
        &self,
        operation: &Operation,
        authorization: Option<&str>,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// `reqwest`-backed implementation used in production
pub struct HttpUpstreamClient {
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new(config: &UpstreamConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(GatewayError::from)?;

        Ok(Self { client })
    }

    /// Build a client with an explicit timeout, bypassing config (tests)
    pub fn with_timeout(timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn send(
        &self,
        operation: &Operation,
        authorization: Option<&str>,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut request = self
            .client
            .request(operation.method.clone(), operation.url.clone());

        if let Some(auth) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else if err.is_connect() {
        UpstreamError::Connect(err.to_string())
    } else {
        UpstreamError::Transport(err.to_string())
    }
}
