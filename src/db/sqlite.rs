use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use super::models::{NewStats, StatsRecord, format_timestamp, now_millis};
use super::store::{StatsStore, StoreError};

pub struct SqliteStatsStore {
    pool: SqlitePool,
}

impl SqliteStatsStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let pool = if in_memory {
            // Each connection to an in-memory database sees its own copy, so keep exactly one alive
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect(database_url)
                .await?
        } else {
            // Extract the file path and ensure the parent directory exists
            let db_path = database_url
                .strip_prefix("sqlite://")
                .or_else(|| database_url.strip_prefix("sqlite:"))
                .unwrap_or(database_url);
            let db_path = db_path.split('?').next().unwrap_or(db_path);
            if let Some(parent) = std::path::Path::new(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let url = if database_url.contains('?') {
                database_url.to_string()
            } else {
                format!("{}?mode=rwc", database_url)
            };
            SqlitePoolOptions::new().max_connections(5).connect(&url).await?
        };

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("bad timestamp {:?}: {}", raw, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<StatsRecord, StoreError> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(StatsRecord {
        id: row.try_get("id")?,
        container: row.try_get("container")?,
        paper: row.try_get("paper")?,
        other: row.try_get("other")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl StatsStore for SqliteStatsStore {
    async fn find_all(&self) -> Result<Vec<StatsRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, container, paper, other, created_at, updated_at
            FROM stats
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn find_latest(&self) -> Result<Option<StatsRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, container, paper, other, created_at, updated_at
            FROM stats
            ORDER BY rowid DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, stats: NewStats) -> Result<StatsRecord, StoreError> {
        let record = StatsRecord::new(ObjectId::new().to_hex(), stats, now_millis());

        sqlx::query(
            r#"
            INSERT INTO stats (id, container, paper, other, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.container)
        .bind(record.paper)
        .bind(record.other)
        .bind(format_timestamp(&record.created_at))
        .bind(format_timestamp(&record.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
