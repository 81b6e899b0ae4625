//! Structured error responses.
//!
//! Every failure leaving the gateway is rendered as
//! `{"success": false, "message": "..."}` with a matching status code.
//! Server-side messages are replaced by a generic one unless
//! `errors.expose_details` is set.

use std::any::Any;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde::Serialize;
use thiserror::Error;
use tower::timeout::error::Elapsed;

use crate::db::DatabaseError;

/// Errors surfaced to clients by the gateway itself.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Route not found")]
    NotFound { path: String },

    #[error("Not allowed by CORS")]
    CorsRejected,

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request entity too large")]
    PayloadTooLarge,

    /// The parser's detail is only shown when details are exposed.
    #[error("Invalid JSON payload")]
    InvalidJson(String),

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Authentication service is not configured")]
    UpstreamNotConfigured,

    #[error("Authentication service unavailable: {0}")]
    Upstream(String),

    #[error("Authentication service timed out")]
    UpstreamTimeout,

    #[error("Server error")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Internal(String),
}

/// Wire shape of every gateway error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::CorsRejected => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InvalidJson(_) | GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::UpstreamNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Render with explicit detail exposure.
    pub fn into_response_with(self, expose_details: bool) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                GatewayError::Database(e) => {
                    tracing::error!(error = %e, "database unavailable");
                }
                other => tracing::error!(error = %other, status = status.as_u16(), "request failed"),
            }
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let message = match &self {
            GatewayError::Database(e) if expose_details => e.to_string(),
            GatewayError::InvalidJson(detail) if expose_details => format!("{self}: {detail}"),
            GatewayError::Internal(_) if !expose_details => "Internal Server Error".to_string(),
            _ => self.to_string(),
        };

        let path = match &self {
            GatewayError::NotFound { path } => Some(path.clone()),
            _ => None,
        };

        let retry_after = match &self {
            GatewayError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                success: false,
                message,
                path,
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

/// Map a failure from the request-timeout layer.
///
/// Used with `axum::error_handling::HandleErrorLayer`.
pub fn timeout_response(error: BoxError, expose_details: bool) -> Response {
    if error.is::<Elapsed>() {
        tracing::warn!("request exceeded the overall deadline");
        GatewayError::RequestTimeout.into_response_with(expose_details)
    } else {
        GatewayError::Internal(error.to_string()).into_response_with(expose_details)
    }
}

/// Turn a caught panic into a structured 500.
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>, expose_details: bool) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "handler panicked");
    GatewayError::Internal(detail).into_response_with(expose_details)
}
