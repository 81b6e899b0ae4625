//! Health endpoint.
//!
//! # Data Flow
//! ```text
//! GET /api/health
//!     → (health.check_database) Database::connect()
//!         → failure: 500 {"status":"ERROR","message":...}
//!     → report.rs builds the body (compact or verbose)
//! ```
//!
//! # Design Decisions
//! - Compact by default: status, service, timestamp
//! - Verbose mode adds version, enabled features, db state and the echoed
//!   request line; useful while wiring a new deployment
//! - Verbose `db` reflects a `SELECT 1` round-trip, not just a cached handle

pub mod report;

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};

use crate::db::DbStatus;
use crate::http::server::AppState;

pub use report::{enabled_features, HealthFailure, HealthReport};

/// `GET /api/health`
pub async fn health(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let config = &state.config;

    if config.health.check_database {
        if let Err(e) = state.db.connect().await {
            tracing::error!(error = %e, "Health check failed");
            let body = HealthFailure::new(e.to_string());
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    }

    let mut report = HealthReport::ok(&config.service.name);
    if config.health.verbose {
        let db = if state.db.ping().await {
            DbStatus::Connected
        } else {
            DbStatus::Disconnected
        };
        report = report.verbose(
            &config.service.version,
            enabled_features(config, state.upstream.is_some()),
            db,
            &method,
            &uri,
        );
    }

    Json(report).into_response()
}
