//! End-to-end behaviour of the middleware pipeline and gateway-owned routes.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    middleware,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use djulah_gateway::config::CorsMode;
use djulah_gateway::http::body::{body_parser_middleware, BodyParser};
use djulah_gateway::http::ParsedBody;

mod common;
use common::{body_bytes, body_json, get, router, router_with, send, test_config, FakeDatabase};

#[tokio::test]
async fn unknown_route_returns_structured_404() {
    let app = router(test_config());
    let res = send(&app, get("/api/nope?page=2")).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(res).await,
        json!({"success": false, "message": "Route not found", "path": "/api/nope?page=2"})
    );
}

#[tokio::test]
async fn wrong_method_on_known_route_is_also_404() {
    let app = router(test_config());
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await["path"], "/api/health");
}

#[tokio::test]
async fn health_is_compact_by_default() {
    let app = router(test_config());
    let res = send(&app, get("/api/health")).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["service"], "Djulah API");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    assert_eq!(body.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn verbose_health_reports_diagnostics() {
    let mut config = test_config();
    config.health.verbose = true;
    let app = router(config);

    let body = body_json(send(&app, get("/api/health?probe=1")).await).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["db"], "connected");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["url"], "/api/health?probe=1");
    assert!(body["features"].as_array().unwrap().contains(&json!("rate-limit")));
}

#[tokio::test]
async fn welcome_lists_entry_points() {
    let app = router(test_config());
    let body = body_json(send(&app, get("/api")).await).await;

    assert_eq!(body["message"], "Welcome to Djulah API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["endpoints"], json!(["/api/health", "/api/auth", "/api-docs"]));
}

#[tokio::test]
async fn security_headers_are_on_every_response() {
    let app = router(test_config());

    for uri in ["/api", "/missing"] {
        let res = send(&app, get(uri)).await;
        let headers = res.headers();
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert!(!headers.contains_key("cross-origin-embedder-policy"));

        let csp = headers["content-security-policy"].to_str().unwrap();
        assert!(csp.contains("script-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net"));
        assert!(csp.contains("object-src 'none'"));
    }
}

#[tokio::test]
async fn csp_can_be_switched_off() {
    let mut config = test_config();
    config.security.content_security_policy = false;
    let app = router(config);

    let res = send(&app, get("/api")).await;
    assert!(!res.headers().contains_key("content-security-policy"));
    assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");
}

#[tokio::test]
async fn request_id_is_generated_or_preserved() {
    let app = router(test_config());

    let res = send(&app, get("/api")).await;
    let generated = res.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let request = Request::builder()
        .uri("/api")
        .header("x-request-id", "trace-abc")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;
    assert_eq!(res.headers()["x-request-id"], "trace-abc");
}

#[tokio::test]
async fn allowed_origin_gets_cors_headers() {
    let app = router(test_config());
    let request = Request::builder()
        .uri("/api")
        .header(header::ORIGIN, "https://app.djulah.test")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "https://app.djulah.test");
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn unknown_origin_is_rejected() {
    let app = router(test_config());
    let request = Request::builder()
        .uri("/api")
        .header(header::ORIGIN, "https://evil.test")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    assert_eq!(
        body_json(res).await,
        json!({"success": false, "message": "Not allowed by CORS"})
    );
}

#[tokio::test]
async fn preflight_is_answered_directly() {
    let app = router(test_config());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/login")
        .header(header::ORIGIN, "https://app.djulah.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;

    assert_eq!(res.status(), StatusCode::OK);
    let methods = res.headers()["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("POST") && methods.contains("PATCH"));
    let allowed = res.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("authorization"));
    assert!(allowed.contains("accept-language"));
    // Answered by the CORS layer, never forwarded or counted.
    assert!(!res.headers().contains_key("x-ratelimit-limit"));
}

#[tokio::test]
async fn permissive_mode_mirrors_any_origin() {
    let mut config = test_config();
    config.cors.mode = CorsMode::Permissive;
    let app = router(config);

    let request = Request::builder()
        .uri("/api")
        .header(header::ORIGIN, "https://anyone.test")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "https://anyone.test");
}

#[tokio::test]
async fn api_document_is_served() {
    let app = router(test_config());
    let res = send(&app, get("/api-docs.json")).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    let doc = body_json(res).await;
    assert_eq!(doc["openapi"], "3.0.0");
    assert_eq!(doc["servers"][0]["url"], "http://localhost:5000");
    assert_eq!(doc["servers"][0]["description"], "Development server");
}

#[tokio::test]
async fn api_document_advertises_platform_host() {
    let mut config = test_config();
    config.docs.vercel_url = Some("djulah.vercel.app".into());
    let app = router(config);

    let doc = body_json(send(&app, get("/api-docs.json")).await).await;
    assert_eq!(doc["servers"][0]["url"], "https://djulah.vercel.app");
    assert_eq!(doc["servers"][0]["description"], "Production server");
}

#[tokio::test]
async fn docs_page_loads_swagger_ui() {
    let app = router(test_config());
    let res = send(&app, get("/api-docs")).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = String::from_utf8(body_bytes(res).await).unwrap();
    assert!(html.contains("<title>Djulah API - Documentation</title>"));
    assert!(html.contains("cdn.jsdelivr.net&#x2F;npm&#x2F;swagger-ui-dist@5.11.0&#x2F;swagger-ui-bundle.js"));
    assert!(html.contains(r#"url: "/api-docs.json""#));
}

#[tokio::test]
async fn docs_can_be_disabled() {
    let mut config = test_config();
    config.docs.enabled = false;
    let app = router(config);

    assert_eq!(send(&app, get("/api-docs")).await.status(), StatusCode::NOT_FOUND);
    let body = body_json(send(&app, get("/api")).await).await;
    assert_eq!(body["endpoints"], json!(["/api/health", "/api/auth"]));
}

#[tokio::test]
async fn database_failure_is_a_generic_server_error() {
    let db = FakeDatabase::failing();
    let app = router_with(test_config(), db.clone());

    let res = send(&app, get("/api/health")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(res).await,
        json!({"success": false, "message": "Server error"})
    );

    // Failures are not cached: the next request tries again and succeeds.
    db.set_failing(false);
    let res = send(&app, get("/api/health")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(db.attempts(), 2);

    // Once connected, later requests reuse the connection.
    send(&app, get("/api")).await;
    assert_eq!(db.attempts(), 2);
}

#[tokio::test]
async fn database_failure_details_can_be_exposed() {
    let mut config = test_config();
    config.errors.expose_details = true;
    let app = router_with(config, FakeDatabase::failing());

    let body = body_json(send(&app, get("/api")).await).await;
    assert_eq!(body["message"], "database connection failed: connection refused");
}

#[tokio::test]
async fn health_probe_reports_database_errors() {
    let mut config = test_config();
    config.database.connect_on_request = false;
    config.health.check_database = true;
    let app = router_with(config, FakeDatabase::failing());

    // Without the per-request gate other routes still answer.
    assert_eq!(send(&app, get("/api")).await.status(), StatusCode::OK);

    let res = send(&app, get("/api/health")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(res).await,
        json!({"status": "ERROR", "message": "database connection failed: connection refused"})
    );
}

#[tokio::test]
async fn negotiated_locale_is_echoed() {
    let app = router(test_config());

    let request = Request::builder()
        .uri("/api")
        .header(header::ACCEPT_LANGUAGE, "fr-CA,fr;q=0.9,en;q=0.5")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, request).await;
    assert_eq!(res.headers()[header::CONTENT_LANGUAGE], "fr");

    let res = send(&app, get("/api?lang=en")).await;
    assert_eq!(res.headers()[header::CONTENT_LANGUAGE], "en");
}

#[tokio::test]
async fn auth_root_with_trailing_slash_is_forwarded() {
    let app = router(test_config());
    let res = send(&app, get("/api/auth/")).await;

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(res).await,
        json!({"success": false, "message": "Authentication service is not configured"})
    );
}

#[tokio::test]
async fn stalled_request_gets_structured_408() {
    let mut config = test_config();
    config.timeouts.request_secs = 1;
    let app = router_with(config, FakeDatabase::hanging());

    let res = send(&app, get("/api")).await;
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");
    assert_eq!(
        body_json(res).await,
        json!({"success": false, "message": "Request timed out"})
    );
}

fn parsing_app() -> Router {
    Router::new()
        .route("/echo", post(|ParsedBody(value): ParsedBody| async move { Json(value) }))
        .layer(middleware::from_fn_with_state(
            Arc::new(BodyParser {
                limit_bytes: 1024,
                expose_details: false,
            }),
            body_parser_middleware,
        ))
}

fn post_echo(content_type: Option<&str>, body: &'static str) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri("/echo");
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn decoded_body_reaches_handlers() {
    let app = parsing_app();

    let form = post_echo(
        Some("application/x-www-form-urlencoded"),
        "user[name]=Ada&tags[]=x&tags[]=y&a=1&a[b]=2",
    );
    let body = body_json(send(&app, form).await).await;
    assert_eq!(
        body,
        json!({"user": {"name": "Ada"}, "tags": ["x", "y"], "a": ["1", {"b": "2"}]})
    );

    let json_body = post_echo(Some("application/json"), r#"[{"id":1}]"#);
    assert_eq!(body_json(send(&app, json_body).await).await, json!([{"id": 1}]));

    let opaque = post_echo(Some("text/plain"), "hello");
    assert_eq!(body_json(send(&app, opaque).await).await, Value::Object(Default::default()));
}
