//! netrecord daemon - periodic network speed probe
//! Composition root: config, logging, adapters, probe loop

mod logging;

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use netrecord_core::application::probe::constants::EXIT_STARTUP_FAILURE;
use netrecord_core::application::probe::StopTrigger;
use netrecord_core::application::{
    shutdown_channel, ProbeLoop, ProbeOutcome, RecordBuilder, ShutdownSender,
};
use netrecord_core::port::time_provider::SystemTimeProvider;
use netrecord_core::port::RecordStore;
use netrecord_core::{ProbeConfig, VERSION};
use netrecord_infra_sqlite::SqliteRecordStore;
use netrecord_infra_system::{FileControlSignal, SpeedtestCliMeter, SpeedtestSettings};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // 1. Load configuration (logging depends on it, so failures go to stderr)
    let config = match ProbeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("netrecord-daemon: {}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    if let Err(e) = prepare_directories(&config) {
        eprintln!("netrecord-daemon: cannot create data directories: {}", e);
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    // 2. Initialize logging
    let _log_guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("netrecord-daemon: cannot initialize logging: {:#}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    info!("netrecord v{} starting...", VERSION);
    info!(
        db_path = %config.database_path.display(),
        control_path = %config.control_path.display(),
        log_path = %config.log_path.display(),
        "Configuration loaded"
    );

    // 3. Shutdown token fed by process signals
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(forward_signals(shutdown_tx));

    // 4. Database and wiring
    let probe = match start(&config).await {
        Ok(probe) => probe,
        Err(outcome) => return ExitCode::from(outcome.exit_code()),
    };

    // 5. Run until stopped
    let outcome = probe.run(shutdown_rx).await;
    if outcome.is_requested_stop() {
        info!(outcome = ?outcome, "Shutdown complete.");
    } else {
        error!(outcome = ?outcome, "Probe terminated on failure");
    }

    ExitCode::from(outcome.exit_code())
}

/// Connect the store, ensure the table and wire the probe loop
///
/// Every failure here is a startup failure; the store is released before returning.
async fn start(config: &ProbeConfig) -> Result<ProbeLoop, ProbeOutcome> {
    let store = SqliteRecordStore::connect(&config.database_path, config.connect_timeout)
        .await
        .map_err(|e| {
            error!(error = %e, "Unable to connect to the database");
            ProbeOutcome::StartupFailure(e.to_string())
        })?;
    if let Err(e) = store.create_schema().await {
        error!(error = %e, "Unable to create the records table");
        store.close().await;
        return Err(ProbeOutcome::StartupFailure(e.to_string()));
    }

    let time_provider = Arc::new(SystemTimeProvider);
    let meter = Arc::new(SpeedtestCliMeter::new(
        time_provider.clone(),
        SpeedtestSettings::from_config(config),
    ));
    let builder = RecordBuilder::new(meter, config.primary.clone(), config.backup.clone());
    let control = Arc::new(FileControlSignal::new(&config.control_path));

    Ok(ProbeLoop::new(
        builder,
        Box::new(store),
        control,
        time_provider,
        config.cycle_interval,
    ))
}

/// Create the parent directory of every configured file
fn prepare_directories(config: &ProbeConfig) -> std::io::Result<()> {
    for path in [&config.database_path, &config.control_path, &config.log_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Convert SIGINT / SIGTERM into a shutdown request
async fn forward_signals(shutdown_tx: ShutdownSender) {
    let trigger = wait_for_signal().await;
    info!(?trigger, "Shutdown signal received. Draining...");
    shutdown_tx.shutdown(trigger);
}

async fn wait_for_signal() -> StopTrigger {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                return tokio::select! {
                    Ok(()) = tokio::signal::ctrl_c() => StopTrigger::Interrupt,
                    Some(()) = terminate.recv() => StopTrigger::Terminate,
                    else => std::future::pending().await,
                };
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl+C stops the probe"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => StopTrigger::Interrupt,
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending().await
        }
    }
}
