// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unknown control state: {0:?}")]
    UnknownControlState(String),

    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Inconsistent record {date} {hour}: {reason}")]
    InconsistentRecord {
        date: String,
        hour: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, DomainError>;
