//! Storage port for stats documents.
//!
//! Implemented by the MongoDB store used in production and the SQLite store
//! used for local development and tests.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{NewStats, StatsRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not decode stored document: {0}")]
    Decode(String),

    #[error("Unsupported connection string scheme: {0}")]
    UnsupportedConnectionString(String),
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Every stored record, unfiltered and unpaginated, in insertion order.
    async fn find_all(&self) -> Result<Vec<StatsRecord>, StoreError>;

    /// The most recently inserted record, if any.
    async fn find_latest(&self) -> Result<Option<StatsRecord>, StoreError>;

    /// Persists a new record, assigning its id and timestamps.
    async fn insert(&self, stats: NewStats) -> Result<StatsRecord, StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
