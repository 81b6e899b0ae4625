//! Locale negotiation.
//!
//! Resolution order: `?lang=` query parameter → `X-Locale` header →
//! `Accept-Language` (by q-value) → configured default. The result is
//! stored in request extensions, forwarded upstream and echoed in
//! `Content-Language`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::LocaleConfig;

pub const X_LOCALE: HeaderName = HeaderName::from_static("x-locale");

/// The negotiated locale for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

#[derive(Debug, Clone)]
pub struct LocaleNegotiator {
    supported: Vec<String>,
    default: String,
}

impl LocaleNegotiator {
    pub fn new(config: &LocaleConfig) -> Self {
        Self {
            supported: config
                .supported
                .iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
            default: config.default.to_ascii_lowercase(),
        }
    }

    /// Map a language tag onto a supported locale: exact match first, then
    /// the primary subtag (`fr-CA` → `fr`).
    fn supported_match(&self, tag: &str) -> Option<&str> {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return None;
        }
        if let Some(exact) = self.supported.iter().find(|s| **s == tag) {
            return Some(exact.as_str());
        }
        let primary = tag.split(['-', '_']).next()?;
        self.supported
            .iter()
            .find(|s| s.as_str() == primary)
            .map(String::as_str)
    }

    fn from_query(&self, query: Option<&str>) -> Option<&str> {
        url::form_urlencoded::parse(query?.as_bytes())
            .find(|(key, _)| key == "lang")
            .and_then(|(_, value)| self.supported_match(&value))
    }

    fn from_accept_language(&self, value: &str) -> Option<&str> {
        let mut candidates: Vec<(f32, usize, &str)> = value
            .split(',')
            .enumerate()
            .filter_map(|(position, item)| {
                let mut pieces = item.split(';');
                let tag = pieces.next()?.trim();
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0 && tag != "*").then_some((quality, position, tag))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates
            .into_iter()
            .find_map(|(_, _, tag)| self.supported_match(tag))
    }

    pub fn negotiate(&self, query: Option<&str>, headers: &HeaderMap) -> Locale {
        let header_str = |name: &HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

        let chosen = self
            .from_query(query)
            .or_else(|| header_str(&X_LOCALE).and_then(|v| self.supported_match(v)))
            .or_else(|| {
                header_str(&header::ACCEPT_LANGUAGE).and_then(|v| self.from_accept_language(v))
            })
            .unwrap_or(self.default.as_str());

        Locale(chosen.to_string())
    }
}

pub async fn locale_middleware(
    State(negotiator): State<Arc<LocaleNegotiator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let locale = negotiator.negotiate(request.uri().query(), request.headers());
    let header_value = HeaderValue::from_str(&locale.0).ok();
    request.extensions_mut().insert(locale);

    let mut response = next.run(request).await;
    if let Some(value) = header_value {
        response
            .headers_mut()
            .entry(header::CONTENT_LANGUAGE)
            .or_insert(value);
    }
    response
}
