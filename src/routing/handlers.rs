//! Gateway-owned endpoints: the API welcome banner and the 404 fallback.

use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::error::GatewayError;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct Welcome {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<&'static str>,
}

/// `GET /api`
pub async fn welcome(State(state): State<AppState>) -> Json<Welcome> {
    let service = &state.config.service;
    let mut endpoints = vec!["/api/health", "/api/auth"];
    if state.config.docs.enabled {
        endpoints.push("/api-docs");
    }

    Json(Welcome {
        message: format!("Welcome to {}", service.name),
        version: service.version.clone(),
        endpoints,
    })
}

/// Fallback for every unmatched route. Echoes the original URL, query
/// string included.
pub async fn not_found(uri: Uri) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    tracing::debug!(path = %path, "No route matched");
    GatewayError::NotFound { path }.into_response()
}
