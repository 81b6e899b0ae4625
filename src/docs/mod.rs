//! API documentation endpoints.
//!
//! # Data Flow
//! ```text
//! startup: GatewayConfig → openapi.rs (document) → ui.rs (viewer page)
//! GET /api-docs.json → cached document bytes
//! GET /api-docs      → cached HTML, Swagger UI loaded from the CDN
//! ```
//!
//! Both bodies are rendered once; handlers only clone cheap buffers.
//! The routes exist only when docs are enabled.

pub mod openapi;
pub mod ui;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;

use crate::config::GatewayConfig;

pub const DOCS_JSON_PATH: &str = "/api-docs.json";
pub const DOCS_UI_PATH: &str = "/api-docs";

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("failed to serialize API document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("failed to render docs page: {0}")]
    Page(#[from] tera::Error),
}

/// Pre-rendered documentation bodies.
#[derive(Debug, Clone)]
pub struct ApiDocs {
    document: Bytes,
    page: String,
}

impl ApiDocs {
    pub fn new(config: &GatewayConfig) -> Result<Self, DocsError> {
        let document = serde_json::to_vec(&openapi::build_document(config))?;
        let page = ui::render_page(
            &format!("{} - Documentation", config.service.name),
            &config.docs.swagger_ui_cdn,
            DOCS_JSON_PATH,
        )?;
        Ok(Self {
            document: Bytes::from(document),
            page,
        })
    }
}

/// Docs routes, carrying their own state so they merge into any router.
pub fn routes<S>(docs: Arc<ApiDocs>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(DOCS_JSON_PATH, get(openapi_json))
        .route(DOCS_UI_PATH, get(swagger_ui))
        .with_state(docs)
}

/// `GET /api-docs.json`
pub async fn openapi_json(State(docs): State<Arc<ApiDocs>>) -> Response {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        docs.document.clone(),
    )
        .into_response()
}

/// `GET /api-docs`
pub async fn swagger_ui(State(docs): State<Arc<ApiDocs>>) -> Html<String> {
    Html(docs.page.clone())
}
