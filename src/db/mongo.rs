use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, doc, oid::ObjectId};
use mongodb::event::EventHandler;
use mongodb::event::sdam::SdamEvent;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::models::{NewStats, StatsRecord, now_millis};
use super::store::{StatsStore, StoreError};

pub const COLLECTION: &str = "Stats";

/// Document layout inside the `Stats` collection.
///
/// Documents written by older clients store counters as doubles and carry a
/// `__v` version key; both are accepted on read.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "bson_count")]
    container: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "bson_count")]
    paper: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "bson_count")]
    other: Option<i64>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

// Int32, Int64 and integral doubles all read as a count.
fn bson_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Bson>::deserialize(deserializer)? {
        None | Some(Bson::Null) | Some(Bson::Undefined) => Ok(None),
        Some(Bson::Int32(n)) => Ok(Some(i64::from(n))),
        Some(Bson::Int64(n)) => Ok(Some(n)),
        Some(Bson::Double(f))
            if f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64 =>
        {
            Ok(Some(f as i64))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected an integral count, found {}",
            other
        ))),
    }
}

fn to_bson_time(ts: &DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(ts.timestamp_millis())
}

fn from_bson_time(ts: bson::DateTime) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ts.timestamp_millis())
        .ok_or_else(|| StoreError::Decode(format!("timestamp out of range: {}", ts)))
}

impl TryFrom<&StatsRecord> for StatsDocument {
    type Error = StoreError;

    fn try_from(record: &StatsRecord) -> Result<Self, Self::Error> {
        let id = ObjectId::parse_str(&record.id)
            .map_err(|e| StoreError::Decode(format!("invalid id {:?}: {}", record.id, e)))?;
        Ok(Self {
            id,
            container: record.container,
            paper: record.paper,
            other: record.other,
            created_at: to_bson_time(&record.created_at),
            updated_at: to_bson_time(&record.updated_at),
        })
    }
}

impl TryFrom<StatsDocument> for StatsRecord {
    type Error = StoreError;

    fn try_from(doc: StatsDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id.to_hex(),
            container: doc.container,
            paper: doc.paper,
            other: doc.other,
            created_at: from_bson_time(doc.created_at)?,
            updated_at: from_bson_time(doc.updated_at)?,
        })
    }
}

pub struct MongoStatsStore {
    collection: Collection<StatsDocument>,
}

impl MongoStatsStore {
    /// Builds a client and pings the server, so an unreachable database fails here.
    pub async fn connect(uri: &str, fallback_database: &str) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.sdam_event_handler = Some(topology_logger());

        let client = Client::with_options(options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(fallback_database));

        database.run_command(doc! { "ping": 1 }).await?;
        tracing::info!(database = %database.name(), "MongoDB connected");

        Ok(Self {
            collection: database.collection(COLLECTION),
        })
    }
}

/// Logs connection state transitions seen by the driver's server monitors.
fn topology_logger() -> EventHandler<SdamEvent> {
    let up = Arc::new(AtomicBool::new(false));
    EventHandler::callback(move |event: SdamEvent| match event {
        SdamEvent::ServerHeartbeatSucceeded(ev) => {
            if !up.swap(true, Ordering::Relaxed) {
                tracing::info!(address = %ev.server_address, "MongoDB server reachable");
            }
        }
        SdamEvent::ServerHeartbeatFailed(ev) => {
            up.store(false, Ordering::Relaxed);
            tracing::error!(address = %ev.server_address, error = %ev.failure, "MongoDB connection error");
        }
        SdamEvent::ServerClosed(ev) => {
            up.store(false, Ordering::Relaxed);
            tracing::warn!(address = %ev.address, "MongoDB disconnected");
        }
        _ => {}
    })
}

#[async_trait]
impl StatsStore for MongoStatsStore {
    async fn find_all(&self) -> Result<Vec<StatsRecord>, StoreError> {
        let mut cursor = self.collection.find(doc! {}).await?;

        let mut records = Vec::new();
        while cursor.advance().await? {
            records.push(StatsRecord::try_from(cursor.deserialize_current()?)?);
        }

        Ok(records)
    }

    async fn find_latest(&self) -> Result<Option<StatsRecord>, StoreError> {
        let latest = self
            .collection
            .find_one(doc! {})
            .sort(doc! { "_id": -1 })
            .await?;

        latest.map(StatsRecord::try_from).transpose()
    }

    async fn insert(&self, stats: NewStats) -> Result<StatsRecord, StoreError> {
        let record = StatsRecord::new(ObjectId::new().to_hex(), stats, now_millis());
        self.collection
            .insert_one(StatsDocument::try_from(&record)?)
            .await?;
        Ok(record)
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
