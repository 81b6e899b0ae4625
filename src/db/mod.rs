//! Lazy database connection.
//!
//! # Data Flow
//! ```text
//! first request (or health probe)
//!     → Database::connect()
//!     → pool.rs establishes the shared pool once
//!     → every later caller reuses the cached pool
//! ```
//!
//! # Design Decisions
//! - One pool per process, created on first use rather than at startup
//! - Concurrent first callers share a single connection attempt
//! - A failed attempt is not cached; the next caller retries
//! - The trait seam lets the HTTP layer run against a fake in tests

pub mod pool;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use pool::LazyPool;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database URL is not configured")]
    NotConfigured,

    #[error("database connection failed: {0}")]
    Connect(String),
}

/// Connection state as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Connected,
    Disconnected,
}

/// A lazily established, process-wide database handle.
#[async_trait]
pub trait Database: Send + Sync {
    /// Establish the shared connection if it does not exist yet.
    ///
    /// Idempotent: once connected, returns immediately.
    async fn connect(&self) -> Result<(), DatabaseError>;

    /// Current state without triggering a connection.
    fn status(&self) -> DbStatus;

    /// Round-trip check against an established connection.
    async fn ping(&self) -> bool;
}
