//! Traffic management: rate limiting and circuit breaking for the upstream
//! authentication service.

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
