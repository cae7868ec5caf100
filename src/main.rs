mod config;
mod db;
mod error;
mod state;
mod stats;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stats_function=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!(
        "Starting stats function on port {} with routes under '{}'",
        config.port,
        config.route_prefix
    );

    // The store connection is opened by the first request that needs it
    let state = Arc::new(AppState::new(config.clone()));
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Stats function listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let stats_routes = Router::new()
        .route("/stats", get(stats::get_stats).post(stats::add_stats))
        .route("/stats/latest", get(stats::get_latest))
        .route("/stats/increment", post(stats::increment_stats));

    let router = if state.config.route_prefix.is_empty() {
        Router::new().merge(stats_routes)
    } else {
        Router::new().nest(&state.config.route_prefix, stats_routes)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    router
        .route("/health", get(stats::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
