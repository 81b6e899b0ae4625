//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → .env + process environment overrides (loader.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, BodyConfig, CorsConfig, CorsMode, CspDirective, DatabaseConfig, DocsConfig,
    Environment, ErrorConfig, GatewayConfig, HealthConfig, ListenerConfig, LocaleConfig,
    LogFormat, ObservabilityConfig, RateLimitConfig, SecurityConfig, ServiceConfig,
    TimeoutConfig,
};
