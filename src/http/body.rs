//! Request body parsing.
//!
//! # Responsibilities
//! - Enforce the body size ceiling (413 before and during the read)
//! - Decode `application/json` and `application/x-www-form-urlencoded`
//! - Attach the decoded value as [`ParsedBody`] and restore the raw bytes
//!
//! Other content types stream through under the same ceiling.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};

use crate::http::error::GatewayError;

/// Decoded payload, available to handlers through request extensions.
///
/// As an extractor it yields `{}` when nothing was decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or_else(|| ParsedBody(Value::Object(Map::new()))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Json,
    Form,
}

/// Settings shared by the body parser middleware.
#[derive(Debug, Clone)]
pub struct BodyParser {
    pub limit_bytes: usize,
    pub expose_details: bool,
}

fn body_kind(headers: &HeaderMap) -> Option<Kind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "application/json" => Some(Kind::Json),
        "application/x-www-form-urlencoded" => Some(Kind::Form),
        _ => None,
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Decode a JSON payload. Only objects and arrays are accepted at the top
/// level; an empty body decodes to `{}`.
pub fn parse_json(bytes: &[u8]) -> Result<Value, GatewayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| GatewayError::InvalidJson(e.to_string()))?;
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        _ => Err(GatewayError::InvalidJson(
            "top-level value must be an object or array".to_string(),
        )),
    }
}

/// Decode an url-encoded payload with nested keys: `a[b]=1` becomes
/// `{"a":{"b":"1"}}`, `a[]=1&a[]=2` and repeated keys become arrays.
///
/// Conflicting shapes merge instead of failing: `a=1&a[b]=2` yields
/// `{"a":["1",{"b":"2"}]}`. Brackets past [`MAX_FORM_DEPTH`] stay a literal key.
pub fn parse_form(bytes: &[u8]) -> Value {
    let mut root = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        if key.is_empty() {
            continue;
        }
        let segments = split_key(&key);
        let Some((head, rest)) = segments.split_first() else {
            continue;
        };
        let incoming = nest(rest, Value::String(value.into_owned()));
        merge_into(&mut root, head.clone(), incoming);
    }
    Value::Object(root)
}

pub const MAX_FORM_DEPTH: usize = 5;

fn split_key(key: &str) -> Vec<String> {
    let open = match key.find('[') {
        Some(open) if open > 0 => open,
        _ => return vec![key.to_string()],
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while segments.len() <= MAX_FORM_DEPTH {
        let Some(stripped) = rest.strip_prefix('[') else {
            break;
        };
        let Some(close) = stripped.find(']') else {
            break;
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(rest.to_string());
    }
    segments
}

/// Wrap `value` in the containers named by `segments`; `""` means a list.
fn nest(segments: &[String], value: Value) -> Value {
    match segments.split_first() {
        None => value,
        Some((segment, rest)) if segment.is_empty() => Value::Array(vec![nest(rest, value)]),
        Some((segment, rest)) => {
            let mut map = Map::new();
            map.insert(segment.clone(), nest(rest, value));
            Value::Object(map)
        }
    }
}

fn merge_into(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(slot) => {
            let existing = slot.take();
            *slot = merge(existing, value);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Array(mut items), Value::Array(more)) => {
            items.extend(more);
            Value::Array(items)
        }
        (Value::Array(items), Value::Object(source)) => {
            let indexed = items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect();
            merge(Value::Object(indexed), Value::Object(source))
        }
        (Value::Array(mut items), scalar) => {
            items.push(scalar);
            Value::Array(items)
        }
        (Value::Object(mut map), Value::Object(source)) => {
            for (key, value) in source {
                merge_into(&mut map, key, value);
            }
            Value::Object(map)
        }
        (Value::Object(mut map), Value::Array(items)) => {
            for (i, value) in items.into_iter().enumerate() {
                merge_into(&mut map, i.to_string(), value);
            }
            Value::Object(map)
        }
        (Value::Object(mut map), Value::String(flag)) => {
            map.entry(flag).or_insert(Value::Bool(true));
            Value::Object(map)
        }
        (Value::Object(map), _) => Value::Object(map),
        (scalar, Value::Array(items)) => {
            let mut out = vec![scalar];
            out.extend(items);
            Value::Array(out)
        }
        (scalar, source) => Value::Array(vec![scalar, source]),
    }
}

async fn collect_limited(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(GatewayError::PayloadTooLarge),
        Err(e) => Err(GatewayError::Body(e.to_string())),
    }
}

pub async fn body_parser_middleware(
    State(parser): State<Arc<BodyParser>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if declared_length(request.headers()).is_some_and(|len| len > parser.limit_bytes) {
        return GatewayError::PayloadTooLarge.into_response_with(parser.expose_details);
    }

    let Some(kind) = body_kind(request.headers()) else {
        // Streamed through; the limit trips mid-stream if the body runs long.
        let limit = parser.limit_bytes;
        let request = request.map(|body| Body::new(Limited::new(body, limit)));
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match collect_limited(body, parser.limit_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response_with(parser.expose_details),
    };

    let value = match kind {
        Kind::Json => match parse_json(&bytes) {
            Ok(value) => value,
            Err(e) => return e.into_response_with(parser.expose_details),
        },
        Kind::Form => parse_form(&bytes),
    };

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(ParsedBody(value));
    next.run(request).await
}
