//! netrecord CLI - operator side of the probe
//! Reads the database and the control file directly; the daemon needs no API

mod render;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use netrecord_core::application::report::DEFAULT_MAX_PING_MS;
use netrecord_core::application::{summarize, ReportFilter};
use netrecord_core::domain::ControlState;
use netrecord_core::port::{ControlSignal, RecordQuery, RecordStore};
use netrecord_core::ProbeConfig;
use netrecord_infra_sqlite::SqliteRecordStore;
use netrecord_infra_system::FileControlSignal;

#[derive(Parser)]
#[command(name = "netrecord")]
#[command(about = "Network speed probe CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Records database
    #[arg(long, global = true, env = "NETRECORD_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Control file shared with the daemon
    #[arg(long, global = true, env = "NETRECORD_CONTROL_PATH")]
    control_path: Option<PathBuf>,

    /// Daemon log file
    #[arg(long, global = true, env = "NETRECORD_LOG_PATH")]
    log_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and the records table
    Create,

    /// Remove the control file, log file and database
    Clean,

    /// Ask a running daemon to stop after its current cycle
    Stop,

    /// Show control state and database summary
    Status,

    /// Show the latest records
    Tail {
        /// Number of records
        #[arg(short = 'n', long, default_value = "10")]
        lines: u32,
    },

    /// Min/avg/max statistics per endpoint
    Report {
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Drop samples with a ping at or above this (ms)
        #[arg(long, default_value_t = DEFAULT_MAX_PING_MS)]
        max_ping: f64,

        /// Count failed attempts as zero-valued samples
        #[arg(long)]
        include_failed: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn config(&self) -> Result<ProbeConfig> {
        let mut config = ProbeConfig::from_env().context("Invalid configuration")?;
        if let Some(path) = &self.db_path {
            config.database_path = path.clone();
        }
        if let Some(path) = &self.control_path {
            config.control_path = path.clone();
        }
        if let Some(path) = &self.log_path {
            config.log_path = path.clone();
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    match cli.command {
        Commands::Create => create(&config).await,
        Commands::Clean => clean(&config),
        Commands::Stop => stop(&config).await,
        Commands::Status => status(&config).await,
        Commands::Tail { lines } => tail(&config, lines).await,
        Commands::Report {
            from,
            to,
            max_ping,
            include_failed,
            json,
        } => {
            let filter = ReportFilter {
                include_failed,
                max_ping_ms: Some(max_ping),
            };
            report(&config, from, to, &filter, json).await
        }
    }
}

async fn create(config: &ProbeConfig) -> Result<()> {
    if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = SqliteRecordStore::connect(&config.database_path, config.connect_timeout).await?;
    let created = store.create_schema().await;
    store.close().await;
    created?;

    println!(
        "{} {}",
        "✓ Records table ready in".green().bold(),
        config.database_path.display()
    );
    Ok(())
}

/// Sidecar files SQLite keeps next to a WAL-mode database
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn clean_targets(config: &ProbeConfig) -> Vec<PathBuf> {
    vec![
        config.control_path.clone(),
        config.log_path.clone(),
        config.database_path.clone(),
        with_suffix(&config.database_path, "-wal"),
        with_suffix(&config.database_path, "-shm"),
    ]
}

fn clean(config: &ProbeConfig) -> Result<()> {
    let mut failures = 0;

    for path in clean_targets(config) {
        match std::fs::remove_file(&path) {
            Ok(()) => println!("  {} removed {}", "✓".green(), path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("  ○ {} not present", path.display())
            }
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "✗".red(), path.display(), e);
            }
        }
    }

    if failures > 0 {
        bail!("{} file(s) could not be removed", failures);
    }
    Ok(())
}

async fn stop(config: &ProbeConfig) -> Result<()> {
    let control = FileControlSignal::new(&config.control_path);
    control.write(ControlState::Stop).await?;

    println!("{}", "✓ Stop requested".green().bold());
    println!(
        "  The daemon exits after its current cycle (up to {} s).",
        config.cycle_interval.as_secs()
    );
    Ok(())
}

async fn open_existing(config: &ProbeConfig) -> Result<SqliteRecordStore> {
    if !config.database_path.exists() {
        bail!(
            "No database at {} (run `netrecord create` or start the daemon)",
            config.database_path.display()
        );
    }
    Ok(SqliteRecordStore::connect(&config.database_path, config.connect_timeout).await?)
}

async fn status(config: &ProbeConfig) -> Result<()> {
    println!("{}", "Probe Status".cyan().bold());
    println!();

    let control = FileControlSignal::new(&config.control_path);
    match control.read().await {
        Ok(ControlState::Start) => println!("  {} {}", "Control:".bold(), "START".green()),
        Ok(ControlState::Stop) => println!("  {} {}", "Control:".bold(), "STOP".yellow()),
        Err(e) => println!("  {} {} ({})", "Control:".bold(), "UNKNOWN".red(), e),
    }
    println!(
        "  {} {} / {}",
        "Endpoints:".bold(),
        config.primary,
        config.backup
    );
    println!();

    let store = match open_existing(config).await {
        Ok(store) => store,
        Err(e) => {
            println!("  {} {}", "Database:".bold(), e);
            return Ok(());
        }
    };

    let count = store.count().await?;
    let size_bytes = store.size_bytes().await?;
    let latest = store.list(&RecordQuery::latest(1)).await?;
    store.close().await;

    println!("  {} {}", "Database:".bold(), config.database_path.display());
    println!("  {} {}", "Records:".bold(), count);
    println!(
        "  {} {:.2} MB",
        "DB Size:".bold(),
        size_bytes as f64 / (1024.0 * 1024.0)
    );
    if let Some(record) = latest.first() {
        println!("  {} {}", "Latest:".bold(), record.taken_at());
        println!(
            "    {}",
            render::reading_cell(record.primary_name(), record.primary())
        );
        println!(
            "    {}",
            render::reading_cell(record.backup_name(), record.backup())
        );
    }
    Ok(())
}

async fn tail(config: &ProbeConfig, lines: u32) -> Result<()> {
    let store = open_existing(config).await?;
    let mut records = store.list(&RecordQuery::latest(lines)).await?;
    store.close().await;

    if records.is_empty() {
        println!("{}", "No records yet".yellow());
        return Ok(());
    }

    records.reverse();
    println!("{}", render::records_table(&records));
    Ok(())
}

async fn report(
    config: &ProbeConfig,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    filter: &ReportFilter,
    json: bool,
) -> Result<()> {
    let store = open_existing(config).await?;
    let records = store
        .list(&RecordQuery {
            from,
            to,
            ..Default::default()
        })
        .await?;
    store.close().await;

    let report = summarize(&records, filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Throughput Report".cyan().bold());
    match (report.first, report.last) {
        (Some(first), Some(last)) => {
            println!("  {} records from {} to {}", report.records, first, last)
        }
        _ => {
            println!("{}", "No records in range".yellow());
            return Ok(());
        }
    }
    println!();
    println!(
        "{}",
        render::report_table(&report, &config.primary.name, &config.backup.name)
    );
    Ok(())
}
