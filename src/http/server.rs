//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the route table and wrap it in the middleware stack
//! - Own the shared state handed to handlers
//! - Bind to a listener and serve until shutdown
//! - Start and stop background tasks (rate-limit sweeper)
//!
//! # Middleware order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → SecurityHeaders
//!   → CatchPanic → metrics → Timeout → database gate
//!   → CORS gate → CORS headers → locale → rate limit → body parser
//!   → route handler
//! ```
//! Security headers sit outside panic recovery so every response,
//! including errors, carries them.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{MatchedPath, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    BoxError, Router,
};
use thiserror::Error;
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::db::{Database, DbStatus, LazyPool};
use crate::docs::{self, ApiDocs, DocsError};
use crate::health;
use crate::http::body::{body_parser_middleware, BodyParser};
use crate::http::error::{panic_response, timeout_response, GatewayError};
use crate::http::locale::{locale_middleware, LocaleNegotiator};
use crate::http::request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::{self, AuthUpstream, UpstreamError};
use crate::security::{
    build_cors_layer, cors_gate_middleware, rate_limit_middleware, security_headers_middleware,
    CorsPolicy, RateLimiter, SecurityHeaders,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Docs(#[from] DocsError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub db: Arc<dyn Database>,
    pub upstream: Option<Arc<AuthUpstream>>,
}

/// State of the connect-before-dispatch gate.
#[derive(Clone)]
struct DatabaseGate {
    db: Arc<dyn Database>,
    expose_details: bool,
}

/// The assembled gateway: router plus the tasks that outlive single requests.
pub struct Gateway {
    router: Router,
    config: Arc<GatewayConfig>,
    limiter: Option<Arc<RateLimiter>>,
}

impl Gateway {
    /// Build the gateway backed by a lazily connected Postgres pool.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let db: Arc<dyn Database> = Arc::new(LazyPool::new(config.database.clone()));
        Self::with_database(config, db)
    }

    /// Build the gateway against any [`Database`] implementation.
    pub fn with_database(config: GatewayConfig, db: Arc<dyn Database>) -> Result<Self, ServerError> {
        let config = Arc::new(config);

        let upstream = config
            .auth
            .upstream
            .as_deref()
            .map(|base| {
                AuthUpstream::new(
                    base,
                    Duration::from_secs(config.timeouts.upstream_secs),
                    config.security.trust_proxy_hops,
                )
            })
            .transpose()?
            .map(Arc::new);

        let docs = if config.docs.enabled {
            Some(Arc::new(ApiDocs::new(&config)?))
        } else {
            None
        };

        let limiter = config.rate_limit.enabled.then(|| {
            Arc::new(RateLimiter::new(
                &config.rate_limit,
                config.security.trust_proxy_hops,
            ))
        });

        let state = AppState {
            config: config.clone(),
            db,
            upstream,
        };

        let router = Self::build_router(&config, state, docs, limiter.clone());
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        docs: Option<Arc<ApiDocs>>,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let expose_details = config.errors.expose_details;
        let gate = DatabaseGate {
            db: state.db.clone(),
            expose_details,
        };

        let mut routes = Router::new()
            .route("/api", get(routing::welcome))
            .route("/api/health", get(health::health))
            .route("/api/auth", any(routing::auth_proxy))
            .route("/api/auth/", any(routing::auth_proxy))
            .route("/api/auth/{*rest}", any(routing::auth_proxy));
        if let Some(docs) = docs {
            routes = routes.merge(docs::routes(docs));
        }

        let mut router = routes
            .fallback(routing::not_found)
            .method_not_allowed_fallback(routing::not_found)
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                Arc::new(BodyParser {
                    limit_bytes: config.body.limit_bytes,
                    expose_details,
                }),
                body_parser_middleware,
            ));

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        let policy = Arc::new(CorsPolicy::new(&config.cors, config.environment));
        router = router
            .layer(middleware::from_fn_with_state(
                Arc::new(LocaleNegotiator::new(&config.locale)),
                locale_middleware,
            ))
            .layer(build_cors_layer(&config.cors, policy.clone()))
            .layer(middleware::from_fn_with_state(policy, cors_gate_middleware));

        if config.database.connect_on_request {
            router = router.layer(middleware::from_fn_with_state(gate, database_middleware));
        }

        let deadline = Duration::from_secs(config.timeouts.request_secs);
        router = router
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(move |error: BoxError| async move {
                        timeout_response(error, expose_details)
                    }))
                    .timeout(deadline),
            )
            .layer(middleware::from_fn(track_requests))
            .layer(CatchPanicLayer::custom(move |payload: Box<dyn Any + Send + 'static>| {
                panic_response(payload, expose_details)
            }));

        if config.security.enable_headers {
            router = router.layer(middleware::from_fn_with_state(
                Arc::new(SecurityHeaders::from_config(&config.security)),
                security_headers_middleware,
            ));
        }

        router
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// A clone of the fully layered router, for embedding or `oneshot` tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Start background maintenance tied to `shutdown`.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Option<JoinHandle<()>> {
        let limiter = self.limiter.clone()?;
        let every = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
        Some(tokio::spawn(limiter.run_sweeper(every, shutdown.subscribe())))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            auth_upstream = self.config.auth.upstream.as_deref().unwrap_or("none"),
            "HTTP server starting"
        );

        let _sweeper = self.spawn_background(&shutdown);

        let mut signal = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = signal.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Connect to the database before dispatch; the connection is shared by
/// every later request.
async fn database_middleware(
    State(gate): State<DatabaseGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if gate.db.status() == DbStatus::Connected {
        return next.run(request).await;
    }
    if let Err(e) = gate.db.connect().await {
        return GatewayError::Database(e).into_response_with(gate.expose_details);
    }
    next.run(request).await
}

async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}
