//! # Auth Gateway Library
//!
//! An authentication-facing API gateway: it receives login/logout requests,
//! forwards them to an upstream authentication service, and returns the
//! upstream's response to the caller while protecting the upstream from
//! overload and absorbing its failures.
//!
//! ## Architecture
//!
//! ```text
//! inbound request
//!       │
//!       ▼
//! gateway façade (axum routes, CORS, outcome → response table)
//!       │
//!       ▼
//! proxy handler ──▶ rate limiter admission ──▶ circuit breaker check
//!       │
//!       ▼
//! upstream client (reqwest, single attempt, mandatory timeout)
//!       │
//!       ▼
//! response envelope (ordered, lossless JSON passthrough)
//! ```
//!
//! All resilience state is in-memory and per-operation: a failing login
//! path never trips the logout breaker, and nothing persists across
//! restarts.

/// Error types, configuration, and the response envelope
pub mod core;

/// Gateway façade: HTTP server, routes, and response mapping
pub mod gateway;

/// Proxy handler and the upstream transport seam
pub mod proxy;

/// Rate limiting and circuit breaking
pub mod traffic;

pub use crate::core::config::GatewayConfig;
pub use crate::core::envelope::ResponseEnvelope;
pub use crate::core::error::{GatewayError, GatewayResult};
pub use crate::gateway::server::GatewayServer;
pub use crate::proxy::handler::{ProxyHandler, ProxyOutcome};
