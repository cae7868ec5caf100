pub mod connection;
pub mod models;
pub mod mongo;
pub mod sqlite;
pub mod store;

pub use connection::{ConnectionManager, StoreHandle};
pub use models::{NewStats, StatsRecord};
pub use store::StoreError;
