// Probe Configuration
// Built once at startup and handed to each component constructor

use crate::application::probe::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_CYCLE_INTERVAL, DEFAULT_MEASURE_DEADLINE,
    DEFAULT_TOOL_TIMEOUT,
};
use crate::domain::Endpoint;
use crate::error::{AppError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_HOME: &str = "NETRECORD_HOME";
pub const ENV_DB_PATH: &str = "NETRECORD_DB_PATH";
pub const ENV_CONTROL_PATH: &str = "NETRECORD_CONTROL_PATH";
pub const ENV_LOG_PATH: &str = "NETRECORD_LOG_PATH";
pub const ENV_INTERVAL_SECS: &str = "NETRECORD_INTERVAL_SECS";
pub const ENV_TOOL_TIMEOUT_SECS: &str = "NETRECORD_TOOL_TIMEOUT_SECS";
pub const ENV_MEASURE_DEADLINE_SECS: &str = "NETRECORD_MEASURE_DEADLINE_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "NETRECORD_CONNECT_TIMEOUT_SECS";
pub const ENV_SPEEDTEST_BIN: &str = "NETRECORD_SPEEDTEST_BIN";
pub const ENV_SPEEDTEST_ARGS: &str = "NETRECORD_SPEEDTEST_ARGS";
pub const ENV_PRIMARY_SERVER: &str = "NETRECORD_PRIMARY_SERVER";
pub const ENV_PRIMARY_NAME: &str = "NETRECORD_PRIMARY_NAME";
pub const ENV_BACKUP_SERVER: &str = "NETRECORD_BACKUP_SERVER";
pub const ENV_BACKUP_NAME: &str = "NETRECORD_BACKUP_NAME";
pub const ENV_LOG_FORMAT: &str = "NETRECORD_LOG_FORMAT";

const DEFAULT_HOME: &str = "~/.netrecord";
const DATABASE_FILE: &str = "network_record.db";
const CONTROL_FILE: &str = "network_record_start_stop";
const LOG_FILE: &str = "network_record.log";
const DEFAULT_SPEEDTEST_BIN: &str = "speedtest-cli";

const DEFAULT_PRIMARY_SERVER: u32 = 13661;
const DEFAULT_PRIMARY_NAME: &str = "Vialis, Woippy";
const DEFAULT_BACKUP_SERVER: u32 = 4997;
const DEFAULT_BACKUP_NAME: &str = "inexio, Saarlouis";

/// Console log rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("unknown log format {:?}", other))),
        }
    }
}

/// Everything the probe needs to know, resolved up front
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub database_path: PathBuf,
    pub control_path: PathBuf,
    pub log_path: PathBuf,
    pub primary: Endpoint,
    pub backup: Endpoint,
    /// Sleep between the end of one cycle and the control poll
    pub cycle_interval: Duration,
    /// Passed to the measurement tool as its own network timeout
    pub tool_timeout: Duration,
    /// Hard wall-clock bound on one measurement process
    pub measure_deadline: Duration,
    pub connect_timeout: Duration,
    pub speedtest_program: String,
    /// Leading arguments placed before the generated ones (e.g. `-m speedtest`)
    pub speedtest_args: Vec<String>,
    pub log_format: LogFormat,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let home = PathBuf::from(shellexpand::tilde(DEFAULT_HOME).into_owned());
        Self::with_home(home)
    }
}

impl ProbeConfig {
    /// Defaults with all files placed under `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            database_path: home.join(DATABASE_FILE),
            control_path: home.join(CONTROL_FILE),
            log_path: home.join(LOG_FILE),
            primary: Endpoint::new(DEFAULT_PRIMARY_SERVER, DEFAULT_PRIMARY_NAME),
            backup: Endpoint::new(DEFAULT_BACKUP_SERVER, DEFAULT_BACKUP_NAME),
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            measure_deadline: DEFAULT_MEASURE_DEADLINE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            speedtest_program: DEFAULT_SPEEDTEST_BIN.to_string(),
            speedtest_args: Vec::new(),
            log_format: LogFormat::Pretty,
        }
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment in production, maps in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup(ENV_HOME).unwrap_or_else(|| DEFAULT_HOME.to_string());
        let mut config = Self::with_home(expand_path(&home));

        if let Some(path) = lookup(ENV_DB_PATH) {
            config.database_path = expand_path(&path);
        }
        if let Some(path) = lookup(ENV_CONTROL_PATH) {
            config.control_path = expand_path(&path);
        }
        if let Some(path) = lookup(ENV_LOG_PATH) {
            config.log_path = expand_path(&path);
        }
        if let Some(secs) = lookup(ENV_INTERVAL_SECS) {
            config.cycle_interval = Duration::from_secs(parse_number(ENV_INTERVAL_SECS, &secs)?);
        }
        if let Some(secs) = lookup(ENV_TOOL_TIMEOUT_SECS) {
            config.tool_timeout = Duration::from_secs(parse_number(ENV_TOOL_TIMEOUT_SECS, &secs)?);
        }
        if let Some(secs) = lookup(ENV_MEASURE_DEADLINE_SECS) {
            config.measure_deadline =
                Duration::from_secs(parse_number(ENV_MEASURE_DEADLINE_SECS, &secs)?);
        }
        if let Some(secs) = lookup(ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout =
                Duration::from_secs(parse_number(ENV_CONNECT_TIMEOUT_SECS, &secs)?);
        }
        if let Some(program) = lookup(ENV_SPEEDTEST_BIN) {
            config.speedtest_program = program;
        }
        if let Some(args) = lookup(ENV_SPEEDTEST_ARGS) {
            config.speedtest_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(id) = lookup(ENV_PRIMARY_SERVER) {
            config.primary.server_id = parse_number(ENV_PRIMARY_SERVER, &id)?;
        }
        if let Some(name) = lookup(ENV_PRIMARY_NAME) {
            config.primary.name = name;
        }
        if let Some(id) = lookup(ENV_BACKUP_SERVER) {
            config.backup.server_id = parse_number(ENV_BACKUP_SERVER, &id)?;
        }
        if let Some(name) = lookup(ENV_BACKUP_NAME) {
            config.backup.name = name;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_format = format.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cycle_interval.is_zero() {
            return Err(AppError::Config("cycle interval must be positive".into()));
        }
        if self.tool_timeout.is_zero() {
            return Err(AppError::Config("tool timeout must be positive".into()));
        }
        if self.measure_deadline < self.tool_timeout {
            return Err(AppError::Config(format!(
                "measure deadline ({:?}) is shorter than tool timeout ({:?})",
                self.measure_deadline, self.tool_timeout
            )));
        }
        if self.primary.server_id == self.backup.server_id {
            return Err(AppError::Config(format!(
                "primary and backup use the same server #{}",
                self.primary.server_id
            )));
        }
        if self.speedtest_program.trim().is_empty() {
            return Err(AppError::Config("speedtest program is empty".into()));
        }
        Ok(())
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} is not a valid number: {:?}", key, raw)))
}
