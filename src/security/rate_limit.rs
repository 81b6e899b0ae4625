//! Fixed-window rate limiting for sensitive paths.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::http::error::GatewayError;
use crate::observability::metrics;
use crate::security::headers::request_client_ip;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Request count within one window for one client.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets (rounded up).
    pub reset_secs: u64,
}

/// Shared limiter state, keyed by `<prefix>|<client>`.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
    prefixes: Vec<String>,
    trust_proxy_hops: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, trust_proxy_hops: usize) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            prefixes: config.path_prefixes.clone(),
            trust_proxy_hops,
        }
    }

    /// The configured prefix covering `path`, if any. A prefix matches the
    /// exact path or any path below it.
    pub fn matching_prefix(&self, path: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|prefix| {
                let prefix = prefix.trim_end_matches('/');
                path == prefix
                    || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
            })
            .map(String::as_str)
    }

    /// Count one request for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);

        let elapsed = now.duration_since(entry.started);
        let left = self.window.saturating_sub(elapsed);
        let reset_secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);

        Decision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_secs,
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Drop windows that ended before `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Periodically prune expired windows until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, every: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_at(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.tracked_clients(), "Pruned rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}

fn apply_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_secs));
}

/// Middleware enforcing the limiter on configured path prefixes.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(prefix) = limiter.matching_prefix(request.uri().path()).map(str::to_string) else {
        return next.run(request).await;
    };

    let client = request_client_ip(&request, limiter.trust_proxy_hops);
    let decision = limiter.check(&format!("{prefix}|{client}"));

    if !decision.allowed {
        tracing::warn!(client = %client, prefix = %prefix, "Rate limit exceeded");
        metrics::record_rate_limited(&prefix);
        let mut response = GatewayError::RateLimited {
            retry_after_secs: decision.reset_secs,
        }
        .into_response();
        apply_headers(&mut response, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &decision);
    response
}
