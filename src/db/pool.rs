//! PostgreSQL pool behind a once-initialised cell.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::db::{Database, DatabaseError, DbStatus};
use crate::observability::metrics;

pub struct LazyPool {
    config: DatabaseConfig,
    pool: OnceCell<PgPool>,
}

impl LazyPool {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// The shared pool, if a connection has been established.
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.get()
    }

    async fn establish(&self) -> Result<PgPool, DatabaseError> {
        let url = self.config.url.as_deref().ok_or(DatabaseError::NotConfigured)?;

        let result = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .connect(url)
            .await;

        match result {
            Ok(pool) => {
                metrics::record_db_connect(true);
                tracing::info!(
                    max_connections = self.config.max_connections,
                    "Database connected"
                );
                Ok(pool)
            }
            Err(e) => {
                metrics::record_db_connect(false);
                tracing::error!(error = %e, "Database connection error");
                Err(DatabaseError::Connect(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Database for LazyPool {
    async fn connect(&self) -> Result<(), DatabaseError> {
        self.pool.get_or_try_init(|| self.establish()).await?;
        Ok(())
    }

    fn status(&self) -> DbStatus {
        match self.pool.get() {
            Some(pool) if !pool.is_closed() => DbStatus::Connected,
            _ => DbStatus::Disconnected,
        }
    }

    async fn ping(&self) -> bool {
        let Some(pool) = self.pool.get() else {
            return false;
        };
        sqlx::query("SELECT 1").execute(pool).await.is_ok()
    }
}
