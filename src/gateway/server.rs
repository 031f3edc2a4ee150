//! # Gateway Façade
//!
//! The thin HTTP entry point: axum route registration, DTO parsing, CORS,
//! and the outcome-to-response table. All real decisions happen in the
//! proxy handler; every [`ProxyOutcome`] variant maps to exactly one
//! deterministic client response here.

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::config::{GatewayConfig, ServerConfig};
use crate::core::error::{GatewayError, GatewayResult};
use crate::proxy::handler::{Operation, ProxyHandler, ProxyOutcome};
use crate::proxy::upstream::HttpUpstreamClient;
use crate::traffic::circuit_breaker::CircuitBreakerRegistry;
use crate::traffic::rate_limiter::RateLimiter;

/// Login request body, parsed structurally only; credential checking is the
/// upstream's job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The two protected operations, resolved at startup
#[derive(Debug)]
pub struct Operations {
    pub login: Operation,
    pub logout: Operation,
}

impl Operations {
    pub fn from_base_url(base_url: &str) -> GatewayResult<Self> {
        Ok(Self {
            login: Operation::login(base_url)?,
            logout: Operation::logout(base_url)?,
        })
    }
}

/// Shared handler state injected into the route handlers
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ProxyHandler>,
    pub operations: Arc<Operations>,
}

/// Build the complete application router from configuration
///
/// Wires the resilience layer and the production upstream client; tests
/// that need a scripted upstream assemble an [`AppState`] directly and call
/// [`build_router`].
pub fn build_app(config: &GatewayConfig) -> GatewayResult<Router> {
    let limiter = Arc::new(RateLimiter::new(config.rate_limiter.clone()));
    let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
    let client = Arc::new(HttpUpstreamClient::new(&config.upstream)?);

    let state = AppState {
        handler: Arc::new(ProxyHandler::new(limiter, breakers, client)),
        operations: Arc::new(Operations::from_base_url(&config.upstream.base_url)?),
    };

    build_router(state, &config.server)
}

/// Assemble routes and middleware layers around the given state
pub fn build_router(state: AppState, server: &ServerConfig) -> GatewayResult<Router> {
    let allowed_origin = server
        .cors_allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| {
            GatewayError::config(format!(
                "invalid CORS origin {}: {}",
                server.cors_allowed_origin, e
            ))
        })?;

    // Credentialed CORS cannot use wildcards; mirroring the request is the
    // equivalent of the original allow-everything policy.
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Ok(Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(server.max_body_size))
        .with_state(state))
}

/// Gateway HTTP server
pub struct GatewayServer {
    router: Router,
    bind_addr: SocketAddr,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let bind_addr = config.server.bind_address.parse().map_err(|e| {
            GatewayError::config(format!(
                "invalid bind address {}: {}",
                config.server.bind_address, e
            ))
        })?;

        Ok(Self {
            router: build_app(config)?,
            bind_addr,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Serve until a shutdown signal arrives
    pub async fn run(self) -> GatewayResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(address = %self.bind_addr, "gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("gateway stopped");
        Ok(())
    }
}

/// `POST /api/auth/login`: forward credentials to the upstream
async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Response {
    info!(username = %request.username, "forwarding login request");

    let body = match serde_json::to_vec(&request) {
        Ok(body) => Bytes::from(body),
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let outcome = state
        .handler
        .forward(&state.operations.login, None, Some(body))
        .await;
    render_outcome(outcome)
}

/// `POST /api/auth/logout`: forward the Authorization header verbatim
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Some(authorization) = authorization else {
        warn!("logout request missing Authorization header");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing Authorization header"})),
        )
            .into_response();
    };

    info!("forwarding logout request");
    let outcome = state
        .handler
        .forward(&state.operations.logout, Some(authorization), None)
        .await;
    render_outcome(outcome)
}

/// Liveness probe; answers regardless of upstream health
async fn health() -> Response {
    Json(json!({"status": "ok", "service": "auth-gateway"})).into_response()
}

/// The outcome-to-response table: one deterministic mapping per variant
fn render_outcome(outcome: ProxyOutcome) -> Response {
    match outcome {
        ProxyOutcome::Success { status, envelope } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            (status, Json(envelope)).into_response()
        }
        ProxyOutcome::ClientError {
            status,
            content_type,
            body,
        } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
            let mut response = (status, body).into_response();
            // Forward the upstream's content type rather than assuming JSON;
            // an unlabeled body stays unlabeled.
            if let Some(value) = content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            response
        }
        ProxyOutcome::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Too many login attempts. Please try again later."})),
        )
            .into_response(),
        ProxyOutcome::CircuitOpen | ProxyOutcome::UpstreamUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Authentication service is temporarily unavailable. Please try again later."
            })),
        )
            .into_response(),
    }
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, relying on Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        result = tokio::signal::ctrl_c() => {
            result.ok();
            info!("received SIGINT, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::ResponseEnvelope;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_outcome_keeps_upstream_status_and_payload() {
        let envelope = ResponseEnvelope::decode(br#"{"token":"abc"}"#).unwrap();
        let response = render_outcome(ProxyOutcome::Success {
            status: 201,
            envelope,
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({"token": "abc"}));
    }

    #[tokio::test]
    async fn test_client_error_outcome_passes_body_through() {
        let response = render_outcome(ProxyOutcome::ClientError {
            status: 401,
            content_type: Some("application/json".to_string()),
            body: Bytes::from_static(br#"{"error":"bad credentials"}"#),
        });

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(body_json(response).await, json!({"error": "bad credentials"}));
    }

    #[tokio::test]
    async fn test_client_error_outcome_keeps_upstream_content_type() {
        let response = render_outcome(ProxyOutcome::ClientError {
            status: 404,
            content_type: Some("text/plain".to_string()),
            body: Bytes::from_static(b"not found"),
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain"))
        );
    }

    #[tokio::test]
    async fn test_rate_limited_outcome_renders_fixed_429() {
        let response = render_outcome(ProxyOutcome::RateLimited);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Too many login attempts. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_unavailable_outcomes_render_fixed_503() {
        for outcome in [ProxyOutcome::CircuitOpen, ProxyOutcome::UpstreamUnavailable] {
            let response = render_outcome(outcome);
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

            let body = body_json(response).await;
            assert_eq!(
                body["error"],
                "Authentication service is temporarily unavailable. Please try again later."
            );
        }
    }
}
