// netrecord Core - Domain Logic & Ports
// NO infrastructure dependencies (ports & adapters)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::ProbeConfig;
pub use error::{AppError, ControlSignalError, Result, StorageError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
