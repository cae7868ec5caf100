use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::StatsRecord;
use crate::error::StatsError;
use crate::state::AppState;

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StatsRecord>>, StatsError> {
    let stats = state.stats.get_stats().await?;
    Ok(Json(stats))
}

pub async fn add_stats(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<StatsRecord>), StatsError> {
    let record = state.stats.add_stats(&body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_latest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsRecord>, StatsError> {
    let record = state.stats.latest_stats().await?;
    Ok(Json(record))
}

pub async fn increment_stats(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<StatsRecord>), StatsError> {
    let record = state.stats.increment_stats(&body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "stats_function",
        "store_connected": state.stats.is_connected()
    }))
}
