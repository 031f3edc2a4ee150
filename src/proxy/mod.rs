//! Proxying layer: operation definitions, the upstream transport seam, and
//! the handler orchestrating admission, forwarding, and outcome recording.

pub mod handler;
pub mod upstream;

pub use handler::{Operation, ProxyHandler, ProxyOutcome};
pub use upstream::{HttpUpstreamClient, UpstreamClient, UpstreamError, UpstreamResponse};
