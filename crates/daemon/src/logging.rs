//! Logging setup: console layer plus the persistent log file

use anyhow::{anyhow, Result};
use netrecord_core::config::{LogFormat, ProbeConfig};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "netrecord=info,sqlx=warn";

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive until exit.
pub fn init(config: &ProbeConfig) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let directory = config
        .log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = config
        .log_path
        .file_name()
        .ok_or_else(|| anyhow!("log path {} has no file name", config.log_path.display()))?
        .to_string_lossy()
        .into_owned();

    // Appends to the same file for the life of the installation
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    // The file layer is built per arm: its type depends on the subscriber stack beneath it
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .with(fmt::layer().with_writer(file_writer).with_ansi(false))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .with(fmt::layer().with_writer(file_writer).with_ansi(false))
            .try_init()?,
    }

    Ok(guard)
}
