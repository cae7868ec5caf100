use crate::config::Config;
use crate::db::{ConnectionManager, NewStats, StatsRecord, StoreHandle};
use crate::error::StatsError;

/// Stats operations over the shared store connection.
pub struct StatsService {
    connections: ConnectionManager,
}

impl StatsService {
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ConnectionManager::new(
            config.connection_string.clone(),
            config.database_name.clone(),
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }

    async fn store(&self) -> Result<StoreHandle, StatsError> {
        self.connections.connect().await.map_err(StatsError::Connection)
    }

    pub async fn get_stats(&self) -> Result<Vec<StatsRecord>, StatsError> {
        let store = self.store().await?;
        store.find_all().await.map_err(StatsError::Read)
    }

    pub async fn latest_stats(&self) -> Result<StatsRecord, StatsError> {
        let store = self.store().await?;
        store
            .find_latest()
            .await
            .map_err(StatsError::Read)?
            .ok_or(StatsError::NotFound)
    }

    pub async fn add_stats(&self, body: &[u8]) -> Result<StatsRecord, StatsError> {
        let store = self.store().await?;
        let stats = NewStats::from_slice(body)?;
        let record = store
            .insert(stats)
            .await
            .map_err(|e| StatsError::Write(e.to_string()))?;

        tracing::info!(id = %record.id, "Stats record added");
        Ok(record)
    }

    /// Adds the body's counts to the latest record and stores the sum as a new record.
    pub async fn increment_stats(&self, body: &[u8]) -> Result<StatsRecord, StatsError> {
        let store = self.store().await?;
        let delta = NewStats::from_slice(body)?;

        let base = store
            .find_latest()
            .await
            .map_err(|e| StatsError::Write(e.to_string()))?
            .map(|latest| latest.counts())
            .unwrap_or_default();
        let total = base
            .checked_add(&delta)
            .ok_or_else(|| StatsError::Write("count overflow".to_string()))?;

        let record = store
            .insert(total)
            .await
            .map_err(|e| StatsError::Write(e.to_string()))?;

        tracing::info!(id = %record.id, "Stats record incremented");
        Ok(record)
    }
}
