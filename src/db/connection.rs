use std::sync::Arc;

use tokio::sync::OnceCell;

use super::mongo::MongoStatsStore;
use super::sqlite::SqliteStatsStore;
use super::store::{StatsStore, StoreError};

pub type StoreHandle = Arc<dyn StatsStore>;

/// Lazily opens the stats store on first use and hands out the same handle afterwards.
///
/// Concurrent first callers wait on a single in-flight connection attempt. A failed
/// attempt leaves the manager empty so the next call tries again.
pub struct ConnectionManager {
    connection_string: String,
    database_name: String,
    handle: OnceCell<StoreHandle>,
}

impl ConnectionManager {
    pub fn new(connection_string: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database_name: database_name.into(),
            handle: OnceCell::new(),
        }
    }

    /// A manager that is already connected to `store`.
    pub fn with_store(store: StoreHandle) -> Self {
        Self {
            connection_string: String::new(),
            database_name: String::new(),
            handle: OnceCell::new_with(Some(store)),
        }
    }

    pub async fn connect(&self) -> Result<StoreHandle, StoreError> {
        self.handle
            .get_or_try_init(|| open_store(&self.connection_string, &self.database_name))
            .await
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.initialized()
    }
}

async fn open_store(connection_string: &str, database_name: &str) -> Result<StoreHandle, StoreError> {
    let store: StoreHandle = if connection_string.starts_with("mongodb://")
        || connection_string.starts_with("mongodb+srv://")
    {
        Arc::new(MongoStatsStore::connect(connection_string, database_name).await?)
    } else if connection_string.starts_with("sqlite:") {
        Arc::new(SqliteStatsStore::connect(connection_string).await?)
    } else {
        let scheme = connection_string
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .unwrap_or(connection_string);
        return Err(StoreError::UnsupportedConnectionString(scheme.to_string()));
    };

    tracing::info!(backend = store.backend(), "Stats store connected");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_returns_the_same_handle() {
        let manager = ConnectionManager::new("sqlite::memory:", "stats");
        assert!(!manager.is_connected());

        let first = manager.connect().await.unwrap();
        let second = manager.connect().await.unwrap();

        assert!(manager.is_connected());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_connection() {
        let manager = Arc::new(ConnectionManager::new("sqlite::memory:", "stats"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.connect().await.unwrap() })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }

    #[tokio::test]
    async fn unsupported_scheme_is_not_memoized() {
        let manager = ConnectionManager::new("postgres://localhost/stats", "stats");

        let err = manager.connect().await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedConnectionString(ref s) if s == "postgres"));
        assert!(!manager.is_connected());

        assert!(manager.connect().await.is_err());
    }

    #[tokio::test]
    async fn unreachable_mongo_is_not_memoized() {
        let manager = ConnectionManager::new(
            "mongodb://127.0.0.1:1/stats?serverSelectionTimeoutMS=300",
            "stats",
        );

        let err = manager.connect().await.err().unwrap();
        assert!(matches!(err, StoreError::Mongo(_)));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn with_store_skips_connecting() {
        let store: StoreHandle = Arc::new(SqliteStatsStore::connect("sqlite::memory:").await.unwrap());
        let manager = ConnectionManager::with_store(store.clone());

        assert!(manager.is_connected());
        assert!(Arc::ptr_eq(&manager.connect().await.unwrap(), &store));
    }
}
