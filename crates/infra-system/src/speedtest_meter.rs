// speedtest-cli SpeedMeter implementation
// reason: async-trait, tokio for async process management, nix for signals
use async_trait::async_trait;
use serde::Deserialize;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use netrecord_core::application::probe::constants::GRACEFUL_KILL_TIMEOUT;
use netrecord_core::config::ProbeConfig;
use netrecord_core::domain::{Endpoint, Throughput};
use netrecord_core::port::{MeasurementError, MeasurementOutcome, SpeedMeter, TimeProvider};

/// Environment variables the measurement tool inherits; everything else is dropped
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "LC_ALL",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "no_proxy",
];

/// How the measurement tool is invoked
#[derive(Debug, Clone)]
pub struct SpeedtestSettings {
    pub program: String,
    /// Arguments placed before the generated ones
    pub program_args: Vec<String>,
    /// Forwarded to the tool as `--timeout`
    pub tool_timeout: Duration,
    /// Hard bound on the whole process; exceeded means terminate
    pub deadline: Duration,
    pub env_allowlist: Vec<String>,
}

impl SpeedtestSettings {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            program: config.speedtest_program.clone(),
            program_args: config.speedtest_args.clone(),
            tool_timeout: config.tool_timeout,
            deadline: config.measure_deadline,
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Full argument list for one run against `endpoint`
    fn args_for(&self, endpoint: &Endpoint) -> Vec<String> {
        let mut args = self.program_args.clone();
        args.extend([
            "--json".to_string(),
            "--server".to_string(),
            endpoint.server_id.to_string(),
            "--timeout".to_string(),
            self.tool_timeout.as_secs().max(1).to_string(),
        ]);
        args
    }
}

/// Fields read from the tool's `--json` report; the rest is ignored
#[derive(Debug, Deserialize)]
struct SpeedtestReport {
    ping: f64,
    download: f64,
    upload: f64,
}

/// Parse the tool's stdout into throughput values
pub fn parse_report(stdout: &[u8]) -> MeasurementOutcome {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| MeasurementError::MalformedOutput(format!("stdout is not UTF-8: {}", e)))?;
    let report: SpeedtestReport = serde_json::from_str(text.trim())
        .map_err(|e| MeasurementError::MalformedOutput(e.to_string()))?;

    for (field, value) in [
        ("ping", report.ping),
        ("download", report.download),
        ("upload", report.upload),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(MeasurementError::MalformedOutput(format!(
                "{} is out of range: {}",
                field, value
            )));
        }
    }

    let throughput = Throughput {
        ping_ms: report.ping,
        download_bps: report.download,
        upload_bps: report.upload,
    };
    if throughput.collides_with_sentinel() {
        return Err(MeasurementError::MalformedOutput(
            "all values are zero, nothing was measured".to_string(),
        ));
    }
    Ok(throughput)
}

/// Keep only allowlisted variables
fn filter_env<I>(allowlist: &[String], vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(k, _)| allowlist.contains(k))
        .collect()
}

/// Runs `speedtest-cli --json` as an isolated child process
pub struct SpeedtestCliMeter {
    time_provider: Arc<dyn TimeProvider>,
    settings: SpeedtestSettings,
}

impl SpeedtestCliMeter {
    pub fn new(time_provider: Arc<dyn TimeProvider>, settings: SpeedtestSettings) -> Self {
        Self {
            time_provider,
            settings,
        }
    }

    fn spawn(&self, endpoint: &Endpoint) -> Result<Child, MeasurementError> {
        let args = self.settings.args_for(endpoint);
        let env = filter_env(&self.settings.env_allowlist, std::env::vars());

        debug!(program = %self.settings.program, args = ?args, "Spawning measurement tool");

        Command::new(&self.settings.program)
            .args(&args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MeasurementError::SpawnFailed(format!("{}: {}", self.settings.program, e))
            })
    }

    async fn run(&self, endpoint: &Endpoint) -> MeasurementOutcome {
        let mut child = self.spawn(endpoint)?;

        let waited = timeout(self.settings.deadline, collect_output(&mut child)).await;
        let (status, stdout, stderr) = match waited {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    endpoint = %endpoint,
                    deadline = ?self.settings.deadline,
                    "Measurement exceeded its deadline, terminating tool"
                );
                let termination = terminate(&mut child).await;
                debug!(?termination, "Measurement tool terminated");
                return Err(MeasurementError::Timeout(self.settings.deadline));
            }
        };

        if !status.success() {
            return Err(MeasurementError::ToolFailed {
                exit_code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        parse_report(&stdout)
    }
}

#[async_trait]
impl SpeedMeter for SpeedtestCliMeter {
    async fn measure(&self, endpoint: &Endpoint) -> MeasurementOutcome {
        let start_time = self.time_provider.now_millis();
        info!(endpoint = %endpoint, "Starting measurement");

        let outcome = self.run(endpoint).await;

        let duration_ms = self.time_provider.now_millis() - start_time;
        match &outcome {
            Ok(_) => info!(endpoint = %endpoint, duration_ms, "Measurement completed"),
            Err(e) => warn!(endpoint = %endpoint, duration_ms, error = %e, "Measurement failed"),
        }
        outcome
    }
}

/// Drain both pipes while waiting, so a chatty tool cannot block on a full pipe
async fn collect_output(
    child: &mut Child,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), MeasurementError> {
    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| MeasurementError::IoError("stdout not captured".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| MeasurementError::IoError("stderr not captured".to_string()))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let (out_read, err_read, status) = tokio::join!(
        stdout_pipe.read_to_end(&mut stdout),
        stderr_pipe.read_to_end(&mut stderr),
        child.wait()
    );

    out_read.map_err(|e| MeasurementError::IoError(e.to_string()))?;
    err_read.map_err(|e| MeasurementError::IoError(e.to_string()))?;
    let status = status.map_err(|e| MeasurementError::IoError(e.to_string()))?;

    Ok((status, stdout, stderr))
}

/// How a tool that overran its deadline went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    /// Reaped before any signal was needed
    AlreadyExited,
    /// Exited within the grace period after SIGTERM
    Graceful,
    Killed,
}

/// SIGTERM first, SIGKILL if the tool outlives the grace period
async fn terminate(child: &mut Child) -> Termination {
    let Some(pid) = child.id() else {
        debug!("Measurement tool already exited, nothing to terminate");
        return Termination::AlreadyExited;
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        info!(pid, "Sending SIGTERM to measurement tool");
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {
                if timeout(GRACEFUL_KILL_TIMEOUT, child.wait()).await.is_ok() {
                    return Termination::Graceful;
                }
                warn!(pid, "Measurement tool did not exit after SIGTERM, sending SIGKILL");
            }
            Err(e) => warn!(pid, error = %e, "SIGTERM failed, sending SIGKILL"),
        }
    }

    if let Err(e) = child.kill().await {
        warn!(pid, error = %e, "SIGKILL failed");
    }
    Termination::Killed
}
