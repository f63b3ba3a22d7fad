// SQLite RecordStore Implementation

use crate::connection;
use crate::schema;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use netrecord_core::domain::{MeasurementRecord, RecordRow, DATE_FORMAT, HOUR_FORMAT};
use netrecord_core::error::{AppError, Result, StorageError};
use netrecord_core::port::{RecordQuery, RecordStore};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const SELECT_COLUMNS: &str = "SELECT date, hour, main_name, ping_main, download_main, upload_main, \
     backup_name, ping_backup, download_backup, upload_backup FROM records";

/// SQLITE_BUSY and its extended codes (SQLITE_BUSY_RECOVERY, SQLITE_BUSY_SNAPSHOT, ...)
fn is_busy_code(code: &str) -> bool {
    code.parse::<i32>().map_or(false, |c| c & 0xff == 5)
}

// Helper to convert sqlx::Error to StorageError with structured information
fn map_sqlx_error(err: sqlx::Error, key: Option<(&str, &str)>) -> AppError {
    let storage = match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                // UNIQUE / PRIMARY KEY constraint failed
                Some("2067") | Some("1555") => match key {
                    Some((date, hour)) => StorageError::DuplicateKey {
                        date: date.to_string(),
                        hour: hour.to_string(),
                    },
                    None => StorageError::Query(db_err.message().to_string()),
                },
                // SQLITE_BUSY - database is locked
                Some(code) if is_busy_code(code) => {
                    StorageError::Locked(db_err.message().to_string())
                }
                // SQLITE_FULL - database or disk is full
                Some("13") => StorageError::Query(format!("Database full: {}", db_err.message())),
                Some(code) => {
                    StorageError::Query(format!("Database error [{}]: {}", code, db_err.message()))
                }
                None => StorageError::Query(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StorageError::Unavailable(err.to_string())
        }
        sqlx::Error::Io(io_err) => StorageError::Unavailable(io_err.to_string()),
        _ => StorageError::Query(err.to_string()),
    };
    storage.into()
}

/// Row as read back from SQLite
#[derive(sqlx::FromRow)]
struct StoredRow {
    date: String,
    hour: String,
    main_name: String,
    ping_main: f64,
    download_main: f64,
    upload_main: f64,
    backup_name: String,
    ping_backup: f64,
    download_backup: f64,
    upload_backup: f64,
}

impl From<StoredRow> for RecordRow {
    fn from(row: StoredRow) -> Self {
        RecordRow {
            date: row.date,
            hour: row.hour,
            main_name: row.main_name,
            ping_main: row.ping_main,
            download_main: row.download_main,
            upload_main: row.upload_main,
            backup_name: row.backup_name,
            ping_backup: row.ping_backup,
            download_backup: row.download_backup,
            upload_backup: row.upload_backup,
        }
    }
}

fn to_record(row: StoredRow) -> Result<MeasurementRecord> {
    Ok(MeasurementRecord::from_row(row.into())?)
}

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database file at `path`
    pub async fn connect(path: &Path, connect_timeout: Duration) -> Result<Self> {
        Ok(Self::new(connection::connect(path, connect_timeout).await?))
    }

    /// Current size of the database file
    pub async fn size_bytes(&self) -> Result<i64> {
        connection::database_size_bytes(&self.pool).await
    }

    /// Raw stored rows in key order (sentinels untouched)
    pub async fn rows(&self) -> Result<Vec<RecordRow>> {
        let rows = sqlx::query_as::<_, StoredRow>(&format!("{} ORDER BY date, hour", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;
        Ok(rows.into_iter().map(RecordRow::from).collect())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create_schema(&self) -> Result<()> {
        schema::create_schema(&self.pool).await
    }

    async fn insert(&self, record: &MeasurementRecord) -> Result<()> {
        let row = record.to_row();

        sqlx::query(
            r#"
            INSERT INTO records (
                date, hour,
                main_name, ping_main, download_main, upload_main,
                backup_name, ping_backup, download_backup, upload_backup
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.date)
        .bind(&row.hour)
        .bind(&row.main_name)
        .bind(row.ping_main)
        .bind(row.download_main)
        .bind(row.upload_main)
        .bind(&row.backup_name)
        .bind(row.ping_backup)
        .bind(row.download_backup)
        .bind(row.upload_backup)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, Some((&row.date, &row.hour))))?;

        Ok(())
    }

    async fn find(&self, date: NaiveDate, time: NaiveTime) -> Result<Option<MeasurementRecord>> {
        let row = sqlx::query_as::<_, StoredRow>(&format!(
            "{} WHERE date = ? AND hour = ?",
            SELECT_COLUMNS
        ))
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(time.format(HOUR_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, None))?;

        row.map(to_record).transpose()
    }

    async fn list(&self, query: &RecordQuery) -> Result<Vec<MeasurementRecord>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        builder.push(" WHERE 1 = 1");
        if let Some(from) = query.from {
            builder
                .push(" AND date >= ")
                .push_bind(from.format(DATE_FORMAT).to_string());
        }
        if let Some(to) = query.to {
            builder
                .push(" AND date <= ")
                .push_bind(to.format(DATE_FORMAT).to_string());
        }
        if query.newest_first {
            builder.push(" ORDER BY date DESC, hour DESC");
        } else {
            builder.push(" ORDER BY date ASC, hour ASC");
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder
            .build_query_as::<StoredRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        // A bad row must not hide every other record from the reports
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let key = (row.date.clone(), row.hour.clone());
                match to_record(row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(date = %key.0, hour = %key.1, error = %e, "Skipping unreadable row");
                        None
                    }
                }
            })
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Record store closed");
    }
}
