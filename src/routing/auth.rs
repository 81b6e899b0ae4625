//! Forwarding of the `/api/auth` route group.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the configured auth service
//! - Preserve method, path, query, headers (minus hop-by-hop) and body
//! - Tag the request with client, request ID and locale
//! - Map transport failures to 502 / 504, an over-long body to 413
//!
//! # Design Decisions
//! - The handlers for sign-up, login etc. live in the auth service; the
//!   gateway only decides *whether* a request reaches it
//! - No retries: auth calls are not idempotent in general
//! - Response bodies stream back without buffering

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, uri::InvalidUri, HeaderValue, Request, Uri, Version},
    response::Response,
};
use http_body_util::LengthLimitError;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::error::GatewayError;
use crate::http::locale::{Locale, X_LOCALE};
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::response::{append_forwarded, strip_hop_by_hop};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::headers::request_client_ip;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid auth upstream URL: {0}")]
    Invalid(#[from] InvalidUri),

    #[error("auth upstream URL '{0}' has no host")]
    MissingHost(String),
}

/// Client for the external authentication service.
pub struct AuthUpstream {
    client: Client<HttpConnector, Body>,
    origin: String,
    base_path: String,
    timeout: Duration,
    trust_proxy_hops: usize,
}

impl AuthUpstream {
    pub fn new(base: &str, timeout: Duration, trust_proxy_hops: usize) -> Result<Self, UpstreamError> {
        let uri: Uri = base.parse()?;
        let scheme = uri.scheme_str().unwrap_or("http");
        let authority = uri
            .authority()
            .ok_or_else(|| UpstreamError::MissingHost(base.to_string()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            origin: format!("{scheme}://{authority}"),
            base_path: uri.path().trim_end_matches('/').to_string(),
            timeout,
            trust_proxy_hops,
        })
    }

    /// Target URI for an incoming path and query.
    pub fn target(&self, incoming: &Uri) -> Result<Uri, InvalidUri> {
        let path_and_query = incoming
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}{}", self.origin, self.base_path, path_and_query).parse()
    }

    /// Forward one request and stream the response back.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response, GatewayError> {
        let started = Instant::now();
        let client = request_client_ip(&request, self.trust_proxy_hops);
        // X-Forwarded-For grows by the hop we actually saw.
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| client.clone());
        let request_id = request.request_id().to_string();
        let locale = request.extensions().get::<Locale>().cloned();

        let (mut parts, body) = request.into_parts();
        let target = self
            .target(&parts.uri)
            .map_err(|e| GatewayError::Internal(format!("cannot build upstream URI: {e}")))?;

        let host = parts.headers.remove(header::HOST);
        strip_hop_by_hop(&mut parts.headers);
        append_forwarded(&mut parts.headers, &peer, host);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            parts.headers.insert(X_REQUEST_ID, value);
        }
        if let Some(value) = locale.and_then(|Locale(l)| HeaderValue::from_str(&l).ok()) {
            parts.headers.insert(X_LOCALE, value);
        }

        parts.uri = target;
        // The pooled connection speaks HTTP/1.1 whatever the client used.
        parts.version = Version::HTTP_11;
        let outbound = Request::from_parts(parts, body);

        tracing::debug!(
            request_id = %request_id,
            client = %client,
            method = %outbound.method(),
            target = %outbound.uri(),
            "Forwarding to auth service"
        );

        let result = tokio::time::timeout(self.timeout, self.client.request(outbound)).await;
        let upstream = match result {
            Err(_) => {
                tracing::error!(request_id = %request_id, timeout = ?self.timeout, "Auth service timed out");
                metrics::record_upstream("timeout");
                return Err(GatewayError::UpstreamTimeout);
            }
            Ok(Err(e)) if exceeded_body_limit(&e) => {
                tracing::debug!(request_id = %request_id, "Request body exceeded limit mid-stream");
                metrics::record_upstream("aborted");
                return Err(GatewayError::PayloadTooLarge);
            }
            Ok(Err(e)) => {
                tracing::error!(request_id = %request_id, error = %e, "Auth service unreachable");
                metrics::record_upstream("error");
                return Err(GatewayError::Upstream(e.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        tracing::debug!(
            request_id = %request_id,
            status = upstream.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Auth service responded"
        );
        metrics::record_upstream("success");

        let (mut parts, body) = upstream.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Whether a send failed because the outgoing body tripped the size limit.
fn exceeded_body_limit(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Handler for `/api/auth` and everything below it.
pub async fn auth_proxy(State(state): State<AppState>, request: Request<Body>) -> Response {
    let expose = state.config.errors.expose_details;
    let Some(upstream) = state.upstream.as_ref() else {
        tracing::warn!(path = %request.uri().path(), "Auth route hit without an upstream");
        return GatewayError::UpstreamNotConfigured.into_response_with(expose);
    };

    match upstream.forward(request).await {
        Ok(response) => response,
        Err(e) => e.into_response_with(expose),
    }
}
