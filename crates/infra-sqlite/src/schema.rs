// Schema Setup

use netrecord_core::error::{Result, StorageError};
use sqlx::SqlitePool;
use tracing::info;

const RECORDS_SCHEMA: &str = include_str!("../migrations/001_records.sql");

/// Ensure the `records` table exists
///
/// Safe on every startup: the DDL is `CREATE TABLE IF NOT EXISTS`.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    apply_script(pool, RECORDS_SCHEMA)
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;

    info!("Records table ready");
    Ok(())
}

/// Apply a SQL script in one transaction
async fn apply_script(pool: &SqlitePool, sql: &str) -> std::result::Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Split by semicolon and execute each statement
    for statement in sql.split(';') {
        // Remove comments and trim
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement).execute(&mut *tx).await?;
        }
    }

    tx.commit().await?;
    Ok(())
}
