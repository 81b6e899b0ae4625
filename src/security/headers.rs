//! Security response headers and forwarded-header handling.
//!
//! # Responsibilities
//! - Add security response headers (CSP, HSTS, framing, sniffing)
//! - Resolve the client address through trusted reverse proxies
//!
//! # Design Decisions
//! - Headers are computed once from config and overwrite anything a handler
//!   or upstream set
//! - Only the configured number of proxy hops is trusted in X-Forwarded-For

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::{CspDirective, SecurityConfig};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Directives every policy starts from; configured directives replace
/// entries with the same name and are appended otherwise.
const BASELINE_CSP: &[(&str, &[&str])] = &[
    ("default-src", &["'self'"]),
    ("base-uri", &["'self'"]),
    ("font-src", &["'self'", "https:", "data:"]),
    ("form-action", &["'self'"]),
    ("frame-ancestors", &["'self'"]),
    ("img-src", &["'self'", "data:"]),
    ("object-src", &["'none'"]),
    ("script-src", &["'self'"]),
    ("script-src-attr", &["'none'"]),
    ("style-src", &["'self'", "https:", "'unsafe-inline'"]),
    ("upgrade-insecure-requests", &[]),
];

/// Precomputed set of response headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig) -> Self {
        let mut headers = Vec::new();
        let mut push = |name: &'static str, value: String| {
            match HeaderValue::from_str(&value) {
                Ok(v) => headers.push((HeaderName::from_static(name), v)),
                Err(_) => tracing::warn!(header = name, value = %value, "skipping invalid security header"),
            }
        };

        if config.content_security_policy {
            push(
                "content-security-policy",
                build_csp(&config.csp_directives),
            );
        }
        push("cross-origin-opener-policy", "same-origin".into());
        push(
            "cross-origin-resource-policy",
            config.cross_origin_resource_policy.clone(),
        );
        if config.cross_origin_embedder_policy {
            push("cross-origin-embedder-policy", "require-corp".into());
        }
        push("origin-agent-cluster", "?1".into());
        push("referrer-policy", "no-referrer".into());
        push(
            "strict-transport-security",
            format!("max-age={}; includeSubDomains", config.hsts_max_age_secs),
        );
        push("x-content-type-options", "nosniff".into());
        push("x-dns-prefetch-control", "off".into());
        push("x-download-options", "noopen".into());
        push("x-frame-options", "SAMEORIGIN".into());
        push("x-permitted-cross-domain-policies", "none".into());
        push("x-xss-protection", "0".into());

        Self { headers }
    }

    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Merge configured directives over the baseline and render the policy.
pub fn build_csp(overrides: &[CspDirective]) -> String {
    let mut directives: Vec<(String, Vec<String>)> = BASELINE_CSP
        .iter()
        .map(|(name, sources)| {
            (
                name.to_string(),
                sources.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect();

    for directive in overrides {
        match directives.iter_mut().find(|(name, _)| *name == directive.name) {
            Some(existing) => existing.1 = directive.sources.clone(),
            None => directives.push((directive.name.clone(), directive.sources.clone())),
        }
    }

    directives
        .into_iter()
        .map(|(name, sources)| {
            if sources.is_empty() {
                name
            } else {
                format!("{} {}", name, sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn security_headers_middleware(
    State(headers): State<Arc<SecurityHeaders>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    headers.apply(response.headers_mut());
    response
}

/// Resolve the client address, trusting `trust_hops` proxies.
///
/// The socket peer is the last hop; each trusted hop moves one entry left in
/// `X-Forwarded-For`. Falls back to the left-most entry when the header is
/// shorter than the trusted chain.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_hops: usize) -> String {
    let forwarded: Vec<&str> = if trust_hops == 0 {
        Vec::new()
    } else {
        headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    };

    // chain = forwarded entries followed by the socket peer
    let chain_len = forwarded.len() + 1;
    let index = chain_len.saturating_sub(1 + trust_hops);

    if index == forwarded.len() {
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    } else {
        forwarded[index].to_string()
    }
}

/// Client address for a request, reading the peer from `ConnectInfo` when
/// the server was started with connect info.
pub fn request_client_ip<B>(request: &Request<B>, trust_hops: usize) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(request.headers(), peer, trust_hops)
}
