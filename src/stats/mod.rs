pub mod handlers;
pub mod service;

pub use handlers::{add_stats, get_latest, get_stats, health_check, increment_stats};
pub use service::StatsService;
