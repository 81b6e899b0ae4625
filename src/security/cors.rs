//! Cross-origin request policy.
//!
//! The gate rejects requests whose `Origin` is not accepted; the
//! `tower_http` CORS layer behind it answers preflights and decorates
//! accepted responses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::{CorsConfig, CorsMode, Environment};
use crate::http::error::GatewayError;
use crate::observability::metrics;

pub const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
];

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Decides which origins may talk to the gateway.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: HashSet<String>,
    allow_all: bool,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig, environment: Environment) -> Self {
        let allow_all = config.mode == CorsMode::Permissive
            || (config.allow_all_in_dev && environment.is_development());

        Self {
            allowed: config
                .allowed_origins
                .iter()
                .map(|o| o.trim_end_matches('/').to_string())
                .collect(),
            allow_all,
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allow_all || self.allowed.contains(origin)
    }
}

/// Reject cross-origin requests from origins the policy does not accept.
/// Requests without an `Origin` header (same-origin, curl, server-to-server)
/// pass through.
pub async fn cors_gate_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = match request.headers().get(header::ORIGIN) {
        None => return next.run(request).await,
        Some(value) => value.to_str().unwrap_or_default(),
    };

    if policy.is_allowed(origin) {
        return next.run(request).await;
    }

    tracing::warn!(origin = %origin, path = %request.uri().path(), "Origin not allowed by CORS");
    metrics::record_cors_rejected();
    GatewayError::CorsRejected.into_response()
}

/// Response-side CORS handling for accepted origins.
pub fn build_cors_layer(config: &CorsConfig, policy: Arc<CorsPolicy>) -> CorsLayer {
    // A literal "*" cannot be combined with credentials, so accepted origins
    // are always mirrored back.
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .map(|o| policy.is_allowed(o))
            .unwrap_or(false)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(ALLOWED_METHODS.to_vec())
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            X_REQUESTED_WITH,
            header::ACCEPT,
            header::ORIGIN,
            header::ACCEPT_LANGUAGE,
        ])
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs))
}
