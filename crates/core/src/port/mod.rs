// Port Layer - Interfaces for external dependencies

pub mod control_signal;
pub mod record_store;
pub mod speed_meter;
pub mod time_provider;

// Re-exports
pub use control_signal::ControlSignal;
pub use record_store::{RecordQuery, RecordStore};
pub use speed_meter::{MeasurementError, MeasurementOutcome, SpeedMeter};
pub use time_provider::TimeProvider;
