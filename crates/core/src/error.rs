// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Control signal error: {0}")]
    ControlSignal(#[from] ControlSignalError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable store failures (connect, schema, insert, read)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Schema creation failed: {0}")]
    Schema(String),

    #[error("Duplicate record for {date} {hour}")]
    DuplicateKey { date: String, hour: String },

    #[error("Database locked (SQLITE_BUSY): {0}")]
    Locked(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Control file failures
///
/// An unreadable or garbled control file is never an implicit "stop";
/// callers decide how to escalate.
#[derive(Error, Debug)]
pub enum ControlSignalError {
    #[error("Cannot read control file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write control file {path}: {source}")]
    Unwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected control file content: {0:?}")]
    UnexpectedContent(String),
}

impl AppError {
    /// True if this is a primary-key collision on insert
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, AppError::Storage(StorageError::DuplicateKey { .. }))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
