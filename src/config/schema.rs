//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section is defaulted so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment (affects CORS dev allowance).
    pub environment: Environment,

    /// Service identity reported by the welcome, health and docs endpoints.
    pub service: ServiceConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Lazy database connection settings.
    pub database: DatabaseConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Security response headers and proxy trust.
    pub security: SecurityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request body parsing.
    pub body: BodyConfig,

    /// External authentication service.
    pub auth: AuthConfig,

    /// Generated API documentation.
    pub docs: DocsConfig,

    /// Health endpoint behaviour.
    pub health: HealthConfig,

    /// Locale negotiation.
    pub locale: LocaleConfig,

    /// Error responder verbosity.
    pub errors: ErrorConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Human-readable service name.
    pub name: String,

    /// Version string reported to clients.
    pub version: String,

    /// One-line description used in the API document.
    pub description: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "Djulah API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "API documentation for Djulah".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Port component of the bind address, if it parses.
    pub fn port(&self) -> Option<u16> {
        self.bind_address
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string. `None` leaves the database unconfigured.
    pub url: Option<String>,

    /// Pool size for the shared connection.
    pub max_connections: u32,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Await the lazy connection before dispatching every request.
    pub connect_on_request: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            connect_timeout_secs: 10,
            connect_on_request: true,
        }
    }
}

/// How cross-origin requests are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorsMode {
    /// Only origins from `allowed_origins` are accepted.
    #[default]
    AllowList,
    /// Every origin is accepted.
    Permissive,
}

impl std::str::FromStr for CorsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_list" | "allowlist" | "allow-list" => Ok(CorsMode::AllowList),
            "permissive" | "*" => Ok(CorsMode::Permissive),
            other => Err(format!("unknown CORS mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub mode: CorsMode,

    /// Exact origins accepted in allow-list mode.
    pub allowed_origins: Vec<String>,

    /// Accept every origin while running in development.
    pub allow_all_in_dev: bool,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Preflight cache duration in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            mode: CorsMode::AllowList,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            allow_all_in_dev: false,
            allow_credentials: true,
            max_age_secs: 600,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Emit a Content-Security-Policy header.
    pub content_security_policy: bool,

    /// Directive overrides merged over the baseline policy.
    pub csp_directives: Vec<CspDirective>,

    /// Emit `Cross-Origin-Embedder-Policy: require-corp`.
    pub cross_origin_embedder_policy: bool,

    /// Value for `Cross-Origin-Resource-Policy`.
    pub cross_origin_resource_policy: String,

    /// `Strict-Transport-Security` max-age in seconds.
    pub hsts_max_age_secs: u64,

    /// Number of reverse proxies in front of the gateway whose
    /// `X-Forwarded-For` entries are trusted.
    pub trust_proxy_hops: usize,
}

/// A single CSP directive, e.g. `script-src 'self'`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CspDirective {
    pub name: String,
    pub sources: Vec<String>,
}

impl CspDirective {
    pub fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            content_security_policy: true,
            csp_directives: vec![
                CspDirective::new("default-src", &["'self'"]),
                CspDirective::new(
                    "style-src",
                    &["'self'", "'unsafe-inline'", "https://cdn.jsdelivr.net"],
                ),
                CspDirective::new(
                    "script-src",
                    &["'self'", "'unsafe-inline'", "https://cdn.jsdelivr.net"],
                ),
                CspDirective::new("img-src", &["'self'", "data:", "https://validator.swagger.io"]),
                CspDirective::new("connect-src", &["'self'"]),
            ],
            cross_origin_embedder_policy: false,
            cross_origin_resource_policy: "cross-origin".to_string(),
            hsts_max_age_secs: 31_536_000,
            trust_proxy_hops: 1,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Length of a counting window in seconds.
    pub window_secs: u64,

    /// Requests allowed per client per window.
    pub max_requests: u32,

    /// Path prefixes the limiter applies to.
    pub path_prefixes: Vec<String>,

    /// How often expired windows are pruned, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            path_prefixes: vec!["/api/auth".to_string()],
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum accepted request body in bytes.
    pub limit_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the authentication service, e.g. "http://127.0.0.1:4000".
    pub upstream: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Serve `/api-docs` and `/api-docs.json`.
    pub enabled: bool,

    /// Public base URL of this deployment, advertised in the API document.
    pub public_url: Option<String>,

    /// Hostname injected by the hosting platform (no scheme).
    pub vercel_url: Option<String>,

    /// Base URL of the Swagger UI distribution.
    pub swagger_ui_cdn: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            public_url: None,
            vercel_url: None,
            swagger_ui_cdn: "https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HealthConfig {
    /// Include diagnostics (db state, request echo, feature list).
    pub verbose: bool,

    /// Connect to the database before answering.
    pub check_database: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Language tags the backend understands.
    pub supported: Vec<String>,

    /// Fallback when nothing matches.
    pub default: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            supported: vec!["en".to_string(), "fr".to_string()],
            default: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ErrorConfig {
    /// Return the underlying error message for 5xx responses.
    pub expose_details: bool,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upstream (authentication service) timeout in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 15,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:5000");
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.body.limit_bytes, 10 * 1024 * 1024);
        assert_eq!(config.cors.mode, CorsMode::AllowList);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            environment = "production"

            [cors]
            mode = "permissive"

            [rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.cors.mode, CorsMode::Permissive);
        assert!(config.cors.allow_credentials);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 900);
    }

    #[test]
    fn listener_port_is_extracted() {
        let listener = ListenerConfig {
            bind_address: "127.0.0.1:8088".into(),
        };
        assert_eq!(listener.port(), Some(8088));
    }
}
