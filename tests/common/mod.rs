//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    response::Response,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use djulah_gateway::db::{Database, DatabaseError, DbStatus};
use djulah_gateway::{Gateway, GatewayConfig, Shutdown};

/// In-memory stand-in for the lazy pool.
#[derive(Default)]
pub struct FakeDatabase {
    fail: AtomicBool,
    hang: AtomicBool,
    connected: AtomicBool,
    attempts: AtomicU32,
}

impl FakeDatabase {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let db = Self::default();
        db.fail.store(true, Ordering::SeqCst);
        Arc::new(db)
    }

    /// Connection attempts that never complete.
    pub fn hanging() -> Arc<Self> {
        let db = Self::default();
        db.hang.store(true, Ordering::SeqCst);
        Arc::new(db)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn connect(&self) -> Result<(), DatabaseError> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DatabaseError::Connect("connection refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn status(&self) -> DbStatus {
        if self.connected.load(Ordering::SeqCst) {
            DbStatus::Connected
        } else {
            DbStatus::Disconnected
        }
    }

    async fn ping(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Defaults with a production environment so CORS follows the allow-list.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = djulah_gateway::config::Environment::Production;
    config.cors.allowed_origins = vec!["https://app.djulah.test".into()];
    config
}

pub fn router_with(config: GatewayConfig, db: Arc<FakeDatabase>) -> Router {
    Gateway::with_database(config, db)
        .expect("gateway builds")
        .router()
}

pub fn with_upstream(upstream: SocketAddr) -> GatewayConfig {
    let mut config = test_config();
    config.auth.upstream = Some(format!("http://{upstream}"));
    config
}

pub fn router(config: GatewayConfig) -> Router {
    router_with(config, FakeDatabase::healthy())
}

/// Drive one request through the router as if it came from `peer`.
pub async fn send_from(router: &Router, peer: &str, mut request: Request<Body>) -> Response {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    router.clone().oneshot(request).await.unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    send_from(router, "127.0.0.1:50000", request).await
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn headers_json(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), json!(v.to_str().unwrap_or_default())))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(map)
}

/// Start an upstream that echoes the request it received as JSON.
pub async fn start_echo_upstream() -> SocketAddr {
    let app = Router::new().fallback(|request: Request<Body>| async move {
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "headers": headers_json(&parts.headers),
            "body": String::from_utf8_lossy(&body),
        }))
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start an upstream that accepts connections and never answers.
pub async fn start_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Run a gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig, db: Arc<FakeDatabase>) -> (SocketAddr, Shutdown) {
    let gateway = Gateway::with_database(config, db).expect("gateway builds");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = gateway.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
