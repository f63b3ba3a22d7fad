// netrecord Infrastructure - SQLite Adapter
// Implements: RecordStore

mod connection;
mod record_repository;
mod schema;

pub use connection::{connect, database_size_bytes};
pub use record_repository::SqliteRecordStore;
pub use schema::create_schema;

// Note: sqlx::Error conversion is handled by helper functions (map_sqlx_error)
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
