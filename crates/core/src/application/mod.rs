// Application Layer - Use Cases and Business Logic

pub mod probe;
pub mod record_builder;
pub mod report;

// Re-exports
pub use probe::{shutdown_channel, ProbeLoop, ProbeOutcome, ShutdownSender, ShutdownToken};
pub use record_builder::RecordBuilder;
pub use report::{summarize, Report, ReportFilter};
