use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::StoreError;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Error connecting to database: {0}")]
    Connection(#[source] StoreError),

    #[error("Error getting stats: {0}")]
    Read(#[source] StoreError),

    #[error("Error adding stats. {0}")]
    Write(String),

    #[error("No stats recorded")]
    NotFound,
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Write(err.to_string())
    }
}

impl StatsError {
    pub fn status(&self) -> StatusCode {
        match self {
            StatsError::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StatsError::Read(_) | StatsError::Write(_) => StatusCode::BAD_REQUEST,
            StatsError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            StatsError::Connection(_) => {
                tracing::error!("{}", self);
                "Error connecting to database".to_string()
            }
            StatsError::Read(_) => {
                tracing::error!("{}", self);
                "Error getting stats".to_string()
            }
            StatsError::Write(_) => {
                tracing::error!("{}", self);
                self.to_string()
            }
            StatsError::NotFound => self.to_string(),
        };

        (status, body).into_response()
    }
}
