//! # Proxy Handler
//!
//! Orchestrates one logical operation (login, logout) end to end: acquire
//! rate-limiter admission, check the circuit breaker, issue the single
//! outbound call, classify the result, and record the outcome back into the
//! breaker.
//!
//! The branching is total over [`ProxyOutcome`]: rate-limiter denial and an
//! open circuit are ordinary outcome variants, never errors, so the façade
//! can map every variant to exactly one client response with a plain match.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

use crate::core::envelope::ResponseEnvelope;
use crate::core::error::{GatewayError, GatewayResult};
use crate::proxy::upstream::{UpstreamClient, UpstreamError};
use crate::traffic::circuit_breaker::CircuitBreakerRegistry;
use crate::traffic::rate_limiter::RateLimiter;

/// A named protected action proxied to the upstream
///
/// Immutable after configuration; both operations are created once at
/// process start from the upstream base URL.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique key into limiter and breaker state
    pub name: String,
    pub method: reqwest::Method,
    /// Fully resolved upstream target
    pub url: Url,
}

impl Operation {
    pub fn new(name: &str, method: reqwest::Method, base_url: &str, path: &str) -> GatewayResult<Self> {
        // String concatenation rather than Url::join: a base of
        // "http://host/auth" must yield "http://host/auth/login", which
        // join("/login") would not.
        let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
        let url = Url::parse(&raw)
            .map_err(|e| GatewayError::config(format!("invalid upstream URL {}: {}", raw, e)))?;

        Ok(Self {
            name: name.to_string(),
            method,
            url,
        })
    }

    pub fn login(base_url: &str) -> GatewayResult<Self> {
        Self::new("login", reqwest::Method::POST, base_url, "/login")
    }

    pub fn logout(base_url: &str) -> GatewayResult<Self> {
        Self::new("logout", reqwest::Method::POST, base_url, "/logout")
    }
}

/// Result of one forwarding attempt
///
/// Created per request, rendered to the client, then discarded.
#[derive(Debug)]
pub enum ProxyOutcome {
    /// Upstream answered 2xx with a well-formed JSON object
    Success {
        status: u16,
        envelope: ResponseEnvelope,
    },
    /// Upstream answered 4xx; status, content type, and raw body pass
    /// through verbatim
    ClientError {
        status: u16,
        content_type: Option<String>,
        body: Bytes,
    },
    /// Rate limiter denied admission; neither breaker nor upstream touched
    RateLimited,
    /// Circuit breaker rejected the call; upstream untouched
    CircuitOpen,
    /// Network failure, timeout, 5xx, or undecodable success body
    UpstreamUnavailable,
}

/// Forwards operations to the upstream behind the resilience layer
pub struct ProxyHandler {
    limiter: Arc<RateLimiter>,
    breakers: Arc<CircuitBreakerRegistry>,
    client: Arc<dyn UpstreamClient>,
}

impl ProxyHandler {
    pub fn new(
        limiter: Arc<RateLimiter>,
        breakers: Arc<CircuitBreakerRegistry>,
        client: Arc<dyn UpstreamClient>,
    ) -> Self {
        Self {
            limiter,
            breakers,
            client,
        }
    }

    /// Forward a single request for the operation
    ///
    /// Exactly one outbound attempt is made, and only after both the rate
    /// limiter and the circuit breaker admit the call. The breaker records
    /// the outcome of every completed attempt: 2xx and 4xx as success (a
    /// client error is not an upstream-health failure), 5xx and transport
    /// failures as failure.
    pub async fn forward(
        &self,
        operation: &Operation,
        authorization: Option<&str>,
        body: Option<Bytes>,
    ) -> ProxyOutcome {
        if !self.limiter.acquire(&operation.name).await {
            let err = GatewayError::RateLimited {
                operation: operation.name.clone(),
            };
            warn!(error = %err, error_type = err.error_type(), "request rejected by rate limiter");
            return ProxyOutcome::RateLimited;
        }

        if !self.breakers.try_acquire(&operation.name) {
            let err = GatewayError::CircuitOpen {
                operation: operation.name.clone(),
            };
            warn!(error = %err, error_type = err.error_type(), "circuit open, failing fast");
            return ProxyOutcome::CircuitOpen;
        }

        match self.client.send(operation, authorization, body).await {
            Ok(response) if (200..300).contains(&response.status) => {
                match ResponseEnvelope::decode(&response.body) {
                    Ok(envelope) => {
                        self.breakers.record_success(&operation.name);
                        debug!(
                            operation = %operation.name,
                            status = response.status,
                            "forwarded upstream response"
                        );
                        ProxyOutcome::Success {
                            status: response.status,
                            envelope,
                        }
                    }
                    Err(err) => {
                        // An upstream that answers 2xx with garbage is as
                        // unhealthy as one that does not answer at all, but
                        // the cause is logged distinctly.
                        self.breakers.record_failure(&operation.name);
                        let err = GatewayError::MalformedPayload {
                            operation: operation.name.clone(),
                            reason: err.to_string(),
                        };
                        error!(
                            error = %err,
                            error_type = err.error_type(),
                            "upstream returned undecodable payload"
                        );
                        ProxyOutcome::UpstreamUnavailable
                    }
                }
            }
            Ok(response) if (400..500).contains(&response.status) => {
                self.breakers.record_success(&operation.name);
                warn!(
                    operation = %operation.name,
                    status = response.status,
                    "client error from upstream, passing through"
                );
                ProxyOutcome::ClientError {
                    status: response.status,
                    content_type: response.content_type,
                    body: response.body,
                }
            }
            Ok(response) => {
                self.breakers.record_failure(&operation.name);
                let err = GatewayError::upstream_unavailable(
                    operation.name.clone(),
                    format!("upstream returned status {}", response.status),
                );
                error!(
                    error = %err,
                    error_type = err.error_type(),
                    "server error from upstream"
                );
                ProxyOutcome::UpstreamUnavailable
            }
            Err(err) => {
                self.breakers.record_failure(&operation.name);
                let err =
                    GatewayError::upstream_unavailable(operation.name.clone(), err.to_string());
                error!(
                    error = %err,
                    error_type = err.error_type(),
                    "failed to reach upstream"
                );
                ProxyOutcome::UpstreamUnavailable
            }
        }
    }
}
