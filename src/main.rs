//! Djulah API gateway.
//!
//! ```text
//!   client ──▶ request id ─▶ trace ─▶ security headers ─▶ panic guard
//!          ─▶ timeout ─▶ database gate ─▶ CORS ─▶ locale ─▶ rate limit
//!          ─▶ body parser ─▶ { /api, /api/health, /api-docs, /api/auth/* ─▶ auth service }
//! ```
//!
//! Configuration comes from built-in defaults, an optional TOML file and
//! the environment (`.env` honoured). SIGINT/SIGTERM drain in-flight
//! requests before exit.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use djulah_gateway::config::load_config;
use djulah_gateway::lifecycle::{signals, Shutdown};
use djulah_gateway::observability::{logging, metrics};
use djulah_gateway::Gateway;

#[derive(Parser)]
#[command(name = "djulah-gateway", version, about = "Djulah API gateway")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // A missing .env is normal in deployed environments.
    let dotenv = dotenvy::dotenv();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    if let Ok(path) = &dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        "djulah-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        cors_mode = ?config.cors.mode,
        rate_limit = config.rate_limit.enabled,
        database_configured = config.database.url.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let gateway = Gateway::new(config)?;
    let shutdown = Shutdown::new();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        trigger.trigger();
    });

    gateway.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
