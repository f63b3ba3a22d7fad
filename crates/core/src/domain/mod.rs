// Domain Layer - Pure business logic and entities

pub mod control;
pub mod error;
pub mod record;

// Re-exports
pub use control::ControlState;
pub use error::DomainError;
pub use record::{
    Endpoint, MeasurementRecord, Reading, RecordRow, Throughput, DATE_FORMAT, FAILED_REAL,
    HOUR_FORMAT, NOT_MEASURED_REAL,
};
