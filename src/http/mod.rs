//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → locale.rs (negotiated language)
//!     → body.rs (size ceiling, JSON / form decoding)
//!     → [route handler or auth forwarding]
//!     → response.rs (hop-by-hop hygiene on forwarded traffic)
//!     → error.rs (structured failures)
//!     → Send to client
//! ```

pub mod body;
pub mod error;
pub mod locale;
pub mod request;
pub mod response;
pub mod server;

pub use body::ParsedBody;
pub use error::GatewayError;
pub use locale::Locale;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, Gateway, ServerError};
