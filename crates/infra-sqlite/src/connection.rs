// SQLite Connection Setup

use netrecord_core::error::{Result, StorageError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the single long-lived handle to the records database
///
/// The pool is capped at one connection that is opened eagerly and never
/// recycled, so the probe holds exactly one handle until `close()`.
/// `connect_timeout` bounds both acquisition and waits on a locked file.
pub async fn connect(path: &Path, connect_timeout: Duration) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(connect_timeout)
        .create_if_missing(true);

    let pool = open(options, connect_timeout)
        .await
        .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), "Connection to the database established");
    Ok(pool)
}

async fn open(
    options: SqliteConnectOptions,
    connect_timeout: Duration,
) -> std::result::Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(connect_timeout)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// In-memory database for unit tests (lives as long as the single connection)
#[cfg(test)]
pub(crate) async fn connect_in_memory() -> SqlitePool {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    open(options, Duration::from_secs(5)).await.unwrap()
}

/// Database size from page count and page size
pub async fn database_size_bytes(pool: &SqlitePool) -> Result<i64> {
    let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::Query(format!("Failed to get page count: {}", e)))?;

    let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::Query(format!("Failed to get page size: {}", e)))?;

    Ok(page_count * page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_file() {
        let path = std::env::temp_dir().join(format!("netrecord-conn-{}.db", uuid::Uuid::new_v4()));

        let pool = connect(&path, Duration::from_secs(5)).await.unwrap();
        assert!(pool.acquire().await.is_ok());
        assert!(path.exists());

        pool.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_connect_missing_directory_is_unavailable() {
        let path = std::env::temp_dir()
            .join(format!("netrecord-missing-{}", uuid::Uuid::new_v4()))
            .join("records.db");

        let result = connect(&path, Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(netrecord_core::AppError::Storage(StorageError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_database_size() {
        let pool = connect_in_memory().await;
        let size = database_size_bytes(&pool).await.unwrap();
        assert!(size >= 0);
    }
}
