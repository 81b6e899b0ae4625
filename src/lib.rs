//! Djulah API gateway library.
//!
//! One composed pipeline in front of the external authentication service:
//! security headers, CORS, rate limiting, body parsing and a lazily
//! connected database, plus health and documentation endpoints.

pub mod config;
pub mod db;
pub mod docs;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::{Gateway, GatewayError};
pub use lifecycle::Shutdown;
