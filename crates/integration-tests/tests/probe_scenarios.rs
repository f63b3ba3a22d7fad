//! End-to-end probe runs against a real SQLite file and a real control file
//!
//! The operator is simulated from inside the measurement: it edits the
//! control file while a cycle is in flight, the way a person would between
//! two polls.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use netrecord_core::application::probe::{ProbeOutcome, StopReason, StopTrigger};
use netrecord_core::application::{shutdown_channel, ProbeLoop, RecordBuilder};
use netrecord_core::domain::{Endpoint, RecordRow, Throughput};
use netrecord_core::port::speed_meter::mocks::{MockBehavior, MockSpeedMeter};
use netrecord_core::port::time_provider::mocks::SteppingTimeProvider;
use netrecord_core::port::{MeasurementOutcome, RecordStore, SpeedMeter};
use netrecord_infra_sqlite::SqliteRecordStore;
use netrecord_infra_system::FileControlSignal;

const PRIMARY: u32 = 13661;
const BACKUP: u32 = 4997;
const INTERVAL: Duration = Duration::from_millis(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn primary() -> Endpoint {
    Endpoint::new(PRIMARY, "Vialis, Woippy")
}

fn backup() -> Endpoint {
    Endpoint::new(BACKUP, "inexio, Saarlouis")
}

fn ten_am() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn throughput(ping_ms: f64, download_bps: f64, upload_bps: f64) -> Throughput {
    Throughput {
        ping_ms,
        download_bps,
        upload_bps,
    }
}

/// What the simulated operator does to the control file during a measurement
#[derive(Clone, Copy)]
enum Operator {
    Idle,
    WriteStop,
    DeleteFile,
}

/// Delegates to an inner meter, then lets the operator act
struct OperatorMeter {
    inner: Arc<dyn SpeedMeter>,
    control_path: PathBuf,
    operator: Operator,
}

#[async_trait]
impl SpeedMeter for OperatorMeter {
    async fn measure(&self, endpoint: &Endpoint) -> MeasurementOutcome {
        let outcome = self.inner.measure(endpoint).await;
        match self.operator {
            Operator::Idle => {}
            Operator::WriteStop => std::fs::write(&self.control_path, "stop\n").unwrap(),
            Operator::DeleteFile => std::fs::remove_file(&self.control_path).unwrap(),
        }
        outcome
    }
}

/// Never finishes on its own
struct HangingMeter;

#[async_trait]
impl SpeedMeter for HangingMeter {
    async fn measure(&self, _endpoint: &Endpoint) -> MeasurementOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(throughput(1.0, 1.0, 1.0))
    }
}

/// Temp directory holding one database and one control file
struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("netrecord_probe_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    fn db_path(&self) -> PathBuf {
        self.dir.join("network_record.db")
    }

    fn control_path(&self) -> PathBuf {
        self.dir.join("network_record_start_stop")
    }

    fn control_content(&self) -> String {
        std::fs::read_to_string(self.control_path()).unwrap()
    }

    fn operator_meter(&self, inner: MockSpeedMeter, operator: Operator) -> Arc<dyn SpeedMeter> {
        Arc::new(OperatorMeter {
            inner: Arc::new(inner),
            control_path: self.control_path(),
            operator,
        })
    }

    async fn probe(
        &self,
        meter: Arc<dyn SpeedMeter>,
        clock: SteppingTimeProvider,
        control_path: &Path,
    ) -> ProbeLoop {
        let store = SqliteRecordStore::connect(&self.db_path(), CONNECT_TIMEOUT)
            .await
            .unwrap();
        store.create_schema().await.unwrap();

        ProbeLoop::new(
            RecordBuilder::new(meter, primary(), backup()),
            Box::new(store),
            Arc::new(FileControlSignal::new(control_path)),
            Arc::new(clock),
            INTERVAL,
        )
    }

    /// Run to completion with no process signal
    async fn run(&self, meter: Arc<dyn SpeedMeter>, clock: SteppingTimeProvider) -> ProbeOutcome {
        let probe = self.probe(meter, clock, &self.control_path()).await;
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        probe.run(shutdown_rx).await
    }

    async fn rows(&self) -> Vec<RecordRow> {
        let store = SqliteRecordStore::connect(&self.db_path(), CONNECT_TIMEOUT)
            .await
            .unwrap();
        let rows = store.rows().await.unwrap();
        store.close().await;
        rows
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[tokio::test]
async fn test_scenario_a_primary_success() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Succeed(throughput(12.3, 50_000_000.0, 10_000_000.0)))
        .with(BACKUP, MockBehavior::Fail("must not be called".into()));

    let outcome = ws
        .run(
            ws.operator_meter(meter.clone(), Operator::WriteStop),
            SteppingTimeProvider::fixed(ten_am()),
        )
        .await;

    assert_eq!(outcome, ProbeOutcome::Stopped(StopReason::ControlFile));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(meter.calls(), vec![PRIMARY]);

    let rows = ws.rows().await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!((row.date.as_str(), row.hour.as_str()), ("2024-01-01", "10:00:00"));
    assert_eq!(row.main_name, "Vialis, Woippy");
    assert_eq!(
        (row.ping_main, row.download_main, row.upload_main),
        (12.3, 50_000_000.0, 10_000_000.0)
    );
    assert_eq!(row.backup_name, "inexio, Saarlouis");
    assert_eq!(
        (row.ping_backup, row.download_backup, row.upload_backup),
        (-1.0, -1.0, -1.0)
    );
}

#[tokio::test]
async fn test_scenario_b_backup_after_primary_failure() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Fail("Cannot retrieve speedtest configuration".into()))
        .with(BACKUP, MockBehavior::Succeed(throughput(30.0, 5_000_000.0, 1_000_000.0)));

    let outcome = ws
        .run(
            ws.operator_meter(meter.clone(), Operator::WriteStop),
            SteppingTimeProvider::fixed(ten_am()),
        )
        .await;

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(meter.calls(), vec![PRIMARY, BACKUP]);

    let row = &ws.rows().await[0];
    assert_eq!((row.ping_main, row.download_main, row.upload_main), (0.0, 0.0, 0.0));
    assert_eq!(
        (row.ping_backup, row.download_backup, row.upload_backup),
        (30.0, 5_000_000.0, 1_000_000.0)
    );
}

#[tokio::test]
async fn test_scenario_c_both_endpoints_fail() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Timeout(Duration::from_secs(180)))
        .with(BACKUP, MockBehavior::Fail("network unreachable".into()));

    let outcome = ws
        .run(
            ws.operator_meter(meter.clone(), Operator::WriteStop),
            SteppingTimeProvider::fixed(ten_am()),
        )
        .await;

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(meter.call_count_for(BACKUP), 1);

    let row = &ws.rows().await[0];
    assert_eq!((row.ping_main, row.download_main, row.upload_main), (0.0, 0.0, 0.0));
    assert_eq!(
        (row.ping_backup, row.download_backup, row.upload_backup),
        (0.0, 0.0, 0.0)
    );
}

#[tokio::test]
async fn test_scenario_d_operator_stop_drains() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Succeed(throughput(12.3, 50_000_000.0, 10_000_000.0)));

    let outcome = ws
        .run(
            ws.operator_meter(meter, Operator::WriteStop),
            SteppingTimeProvider::new(ten_am(), chrono::Duration::seconds(1)),
        )
        .await;

    assert_eq!(outcome, ProbeOutcome::Stopped(StopReason::ControlFile));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(ws.control_content(), "stop");
    assert_eq!(ws.rows().await.len(), 1);
}

#[tokio::test]
async fn test_several_cycles_until_stop() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Succeed(throughput(12.3, 50_000_000.0, 10_000_000.0)));
    let clock = SteppingTimeProvider::new(ten_am(), chrono::Duration::minutes(15));

    let probe = ws
        .probe(
            ws.operator_meter(meter.clone(), Operator::Idle),
            clock,
            &ws.control_path(),
        )
        .await;
    let (_shutdown_tx, shutdown_rx) = shutdown_channel();
    let run = tokio::spawn(probe.run(shutdown_rx));

    // Let a few cycles complete, then stop the way an operator would
    while meter.calls().len() < 3 {
        tokio::time::sleep(INTERVAL).await;
    }
    // Atomic replace: the probe may poll from a blocking thread at any moment
    let staged = ws.dir.join("control.tmp");
    std::fs::write(&staged, "STOP").unwrap();
    std::fs::rename(&staged, ws.control_path()).unwrap();
    let outcome = run.await.unwrap();

    assert_eq!(outcome, ProbeOutcome::Stopped(StopReason::ControlFile));
    let rows = ws.rows().await;
    assert!(rows.len() >= 3, "expected at least 3 records, got {}", rows.len());
    assert_eq!(rows[0].hour, "10:00:00");
    assert_eq!(rows[1].hour, "10:15:00");
    assert_eq!(ws.control_content(), "stop");
}

#[tokio::test]
async fn test_missing_control_file_is_control_failure() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Succeed(throughput(12.3, 50_000_000.0, 10_000_000.0)));

    let outcome = ws
        .run(
            ws.operator_meter(meter, Operator::DeleteFile),
            SteppingTimeProvider::fixed(ten_am()),
        )
        .await;

    assert!(matches!(outcome, ProbeOutcome::ControlSignalFailure(_)));
    assert_eq!(outcome.exit_code(), 1);
    // The record of the completed cycle is kept and the file is left in "stop"
    assert_eq!(ws.rows().await.len(), 1);
    assert_eq!(ws.control_content(), "stop");
}

#[tokio::test]
async fn test_same_second_collision_is_cycle_failure() {
    let ws = Workspace::new();
    let meter = MockSpeedMeter::new()
        .with(PRIMARY, MockBehavior::Succeed(throughput(12.3, 50_000_000.0, 10_000_000.0)));

    let outcome = ws
        .run(
            ws.operator_meter(meter, Operator::Idle),
            SteppingTimeProvider::fixed(ten_am()),
        )
        .await;

    assert!(matches!(outcome, ProbeOutcome::CycleFailure(_)));
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(ws.rows().await.len(), 1);
    assert_eq!(ws.control_content(), "stop");
}

#[tokio::test]
async fn test_unwritable_control_file_is_startup_failure() {
    let ws = Workspace::new();
    let unreachable = ws.dir.join("missing").join("network_record_start_stop");

    let probe = ws
        .probe(
            ws.operator_meter(MockSpeedMeter::new(), Operator::Idle),
            SteppingTimeProvider::fixed(ten_am()),
            &unreachable,
        )
        .await;
    let (_shutdown_tx, shutdown_rx) = shutdown_channel();
    let outcome = probe.run(shutdown_rx).await;

    assert!(matches!(outcome, ProbeOutcome::StartupFailure(_)));
    assert_eq!(outcome.exit_code(), 3);
    assert!(ws.rows().await.is_empty());
}

#[tokio::test]
async fn test_interrupt_during_measurement_abandons_cycle() {
    let ws = Workspace::new();
    let probe = ws
        .probe(
            Arc::new(HangingMeter),
            SteppingTimeProvider::fixed(ten_am()),
            &ws.control_path(),
        )
        .await;
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.shutdown(StopTrigger::Interrupt);
    });
    let outcome = tokio::time::timeout(Duration::from_secs(10), probe.run(shutdown_rx))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ProbeOutcome::Stopped(StopReason::Signal(StopTrigger::Interrupt))
    );
    assert!(ws.rows().await.is_empty());
    assert_eq!(ws.control_content(), "stop");
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_tool_adapter_falls_back_to_backup() {
    use netrecord_core::port::time_provider::SystemTimeProvider;
    use netrecord_infra_system::speedtest_meter::DEFAULT_ENV_ALLOWLIST;
    use netrecord_infra_system::{SpeedtestCliMeter, SpeedtestSettings};

    let ws = Workspace::new();
    let script = format!(
        r#"if [ "$3" = "{primary}" ]; then
  echo 'Cannot retrieve speedtest configuration' >&2
  exit 1
fi
printf stop > '{control}'
printf '{{"ping": 30.0, "download": 5000000.0, "upload": 1000000.0, "server": {{"id": "{backup}"}}}}'"#,
        primary = PRIMARY,
        backup = BACKUP,
        control = ws.control_path().display(),
    );
    let meter = SpeedtestCliMeter::new(
        Arc::new(SystemTimeProvider),
        SpeedtestSettings {
            program: "sh".to_string(),
            program_args: vec!["-c".to_string(), script, "speedtest-cli".to_string()],
            tool_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(30),
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
        },
    );

    let outcome = ws
        .run(Arc::new(meter), SteppingTimeProvider::fixed(ten_am()))
        .await;

    assert_eq!(outcome, ProbeOutcome::Stopped(StopReason::ControlFile));
    let row = &ws.rows().await[0];
    assert_eq!((row.ping_main, row.download_main, row.upload_main), (0.0, 0.0, 0.0));
    assert_eq!(
        (row.ping_backup, row.download_backup, row.upload_backup),
        (30.0, 5_000_000.0, 1_000_000.0)
    );
}
