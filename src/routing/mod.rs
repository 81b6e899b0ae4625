//! Route table.
//!
//! ```text
//! GET  /api              → handlers::welcome
//! GET  /api/health       → health::health
//! ANY  /api/auth[/*]     → auth::auth_proxy   (external auth service)
//! GET  /api-docs.json    → docs::openapi_json (when docs are enabled)
//! GET  /api-docs         → docs::swagger_ui   (when docs are enabled)
//! *                      → handlers::not_found
//! ```
//!
//! The table itself is assembled in `http::server`, next to the middleware
//! stack, so ordering of routes and layers can be read in one place.

pub mod auth;
pub mod handlers;

pub use auth::{auth_proxy, AuthUpstream, UpstreamError};
pub use handlers::{not_found, welcome};
