//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security response headers wrap everything below)
//!     → cors.rs (reject unknown origins, answer preflights)
//!     → rate_limit.rs (per-client windows on sensitive prefixes)
//!     → Pass to body parsing and routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input beyond the configured proxy hops

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::{CorsPolicy, build_cors_layer, cors_gate_middleware};
pub use headers::{SecurityHeaders, client_ip, security_headers_middleware};
pub use rate_limit::{RateLimiter, rate_limit_middleware};
