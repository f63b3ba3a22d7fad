// Measurement Record Domain Model

use super::error::{DomainError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Sentinel stored when an attempt was made but produced no usable result
pub const FAILED_REAL: f64 = 0.0;

/// Sentinel stored when no attempt was made (backup skipped)
pub const NOT_MEASURED_REAL: f64 = -1.0;

/// Text formats of the `date` and `hour` key columns
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const HOUR_FORMAT: &str = "%H:%M:%S";

/// A measurement target known to the speed measurement tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub server_id: u32,
    pub name: String,
}

impl Endpoint {
    pub fn new(server_id: u32, name: impl Into<String>) -> Self {
        Self {
            server_id,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.name, self.server_id)
    }
}

/// Values reported by one successful measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub ping_ms: f64,
    pub download_bps: f64,
    pub upload_bps: f64,
}

impl Throughput {
    /// True when all three values equal one stored sentinel, so the row
    /// would read back as a failed or skipped attempt
    pub fn collides_with_sentinel(&self) -> bool {
        !matches!(
            Reading::from_values(self.ping_ms, self.download_bps, self.upload_bps),
            Reading::Measured(_)
        )
    }
}

/// Outcome of one endpoint slot in a record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reading {
    Measured(Throughput),
    Failed,
    NotMeasured,
}

impl Reading {
    /// Stored `(ping, download, upload)` triplet, sentinels included
    pub fn to_values(&self) -> (f64, f64, f64) {
        match self {
            Reading::Measured(t) => (t.ping_ms, t.download_bps, t.upload_bps),
            Reading::Failed => (FAILED_REAL, FAILED_REAL, FAILED_REAL),
            Reading::NotMeasured => (NOT_MEASURED_REAL, NOT_MEASURED_REAL, NOT_MEASURED_REAL),
        }
    }

    /// Decode a stored triplet. A triplet made only of one sentinel is that sentinel.
    pub fn from_values(ping: f64, download: f64, upload: f64) -> Self {
        let all = |v: f64| ping == v && download == v && upload == v;
        if all(NOT_MEASURED_REAL) {
            Reading::NotMeasured
        } else if all(FAILED_REAL) {
            Reading::Failed
        } else {
            Reading::Measured(Throughput {
                ping_ms: ping,
                download_bps: download,
                upload_bps: upload,
            })
        }
    }

    pub fn throughput(&self) -> Option<&Throughput> {
        match self {
            Reading::Measured(t) => Some(t),
            _ => None,
        }
    }
}

/// One row of the `records` table, in column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub date: String,
    pub hour: String,
    pub main_name: String,
    pub ping_main: f64,
    pub download_main: f64,
    pub upload_main: f64,
    pub backup_name: String,
    pub ping_backup: f64,
    pub download_backup: f64,
    pub upload_backup: f64,
}

/// Immutable result of one probe cycle
///
/// Invariants (enforced by the constructors):
/// - primary measured => backup not measured
/// - primary failed => backup measured or failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    taken_at: NaiveDateTime,
    primary_name: String,
    primary: Reading,
    backup_name: String,
    backup: Reading,
}

impl MeasurementRecord {
    /// Record for a cycle where the primary endpoint answered
    pub fn primary_succeeded(
        taken_at: NaiveDateTime,
        primary: &Endpoint,
        metrics: Throughput,
        backup: &Endpoint,
    ) -> Self {
        Self {
            taken_at: truncate_to_second(taken_at),
            primary_name: primary.name.clone(),
            primary: Reading::Measured(metrics),
            backup_name: backup.name.clone(),
            backup: Reading::NotMeasured,
        }
    }

    /// Record for a cycle where the primary failed and the backup was tried
    pub fn primary_failed(
        taken_at: NaiveDateTime,
        primary: &Endpoint,
        backup: &Endpoint,
        backup_metrics: Option<Throughput>,
    ) -> Self {
        Self {
            taken_at: truncate_to_second(taken_at),
            primary_name: primary.name.clone(),
            primary: Reading::Failed,
            backup_name: backup.name.clone(),
            backup: backup_metrics.map_or(Reading::Failed, Reading::Measured),
        }
    }

    pub fn taken_at(&self) -> NaiveDateTime {
        self.taken_at
    }

    pub fn date(&self) -> NaiveDate {
        self.taken_at.date()
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.taken_at.time()
    }

    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    pub fn primary(&self) -> &Reading {
        &self.primary
    }

    pub fn backup_name(&self) -> &str {
        &self.backup_name
    }

    pub fn backup(&self) -> &Reading {
        &self.backup
    }

    /// Primary key values `(date, hour)` as stored
    pub fn key(&self) -> (String, String) {
        (
            self.taken_at.format(DATE_FORMAT).to_string(),
            self.taken_at.format(HOUR_FORMAT).to_string(),
        )
    }

    pub fn to_row(&self) -> RecordRow {
        let (date, hour) = self.key();
        let (ping_main, download_main, upload_main) = self.primary.to_values();
        let (ping_backup, download_backup, upload_backup) = self.backup.to_values();
        RecordRow {
            date,
            hour,
            main_name: self.primary_name.clone(),
            ping_main,
            download_main,
            upload_main,
            backup_name: self.backup_name.clone(),
            ping_backup,
            download_backup,
            upload_backup,
        }
    }

    /// Rebuild a record from a stored row, rejecting rows that break the invariants
    pub fn from_row(row: RecordRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT).map_err(|e| {
            DomainError::InvalidTimestamp {
                value: row.date.clone(),
                reason: e.to_string(),
            }
        })?;
        let time = NaiveTime::parse_from_str(&row.hour, HOUR_FORMAT).map_err(|e| {
            DomainError::InvalidTimestamp {
                value: row.hour.clone(),
                reason: e.to_string(),
            }
        })?;

        let primary = Reading::from_values(row.ping_main, row.download_main, row.upload_main);
        let backup = Reading::from_values(row.ping_backup, row.download_backup, row.upload_backup);

        let inconsistent = |reason: &str| DomainError::InconsistentRecord {
            date: row.date.clone(),
            hour: row.hour.clone(),
            reason: reason.to_string(),
        };
        match (&primary, &backup) {
            (Reading::Measured(_), Reading::NotMeasured) => {}
            (Reading::Measured(_), _) => {
                return Err(inconsistent("backup measured although primary succeeded"))
            }
            (Reading::Failed, Reading::NotMeasured) => {
                return Err(inconsistent("backup not attempted after primary failure"))
            }
            (Reading::Failed, _) => {}
            (Reading::NotMeasured, _) => {
                return Err(inconsistent("primary is never skipped"))
            }
        }

        Ok(Self {
            taken_at: date.and_time(time),
            primary_name: row.main_name,
            primary,
            backup_name: row.backup_name,
            backup,
        })
    }
}

fn truncate_to_second(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(h, m, s, 750)
            .unwrap()
    }

    fn endpoints() -> (Endpoint, Endpoint) {
        (
            Endpoint::new(13661, "Vialis, Woippy"),
            Endpoint::new(4997, "inexio, Saarlouis"),
        )
    }

    #[test]
    fn test_primary_success_row() {
        let (primary, backup) = endpoints();
        let metrics = Throughput {
            ping_ms: 12.3,
            download_bps: 50_000_000.0,
            upload_bps: 10_000_000.0,
        };
        let row = MeasurementRecord::primary_succeeded(at(10, 0, 0), &primary, metrics, &backup)
            .to_row();

        assert_eq!(row.date, "2024-01-01");
        assert_eq!(row.hour, "10:00:00");
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

    #[test]
    fn test_both_failed_row_uses_failed_sentinel() {
        let (primary, backup) = endpoints();
        let row = MeasurementRecord::primary_failed(at(8, 30, 5), &primary, &backup, None).to_row();

        assert_eq!(row.hour, "08:30:05");
        assert_eq!((row.ping_main, row.download_main, row.upload_main), (0.0, 0.0, 0.0));
        assert_eq!(
            (row.ping_backup, row.download_backup, row.upload_backup),
            (0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_from_row_restores_record() {
        let (primary, backup) = endpoints();
        let record = MeasurementRecord::primary_failed(
            at(23, 59, 59),
            &primary,
            &backup,
            Some(Throughput {
                ping_ms: 30.0,
                download_bps: 5_000_000.0,
                upload_bps: 1_000_000.0,
            }),
        );

        let restored = MeasurementRecord::from_row(record.to_row()).unwrap();
        assert_eq!(restored, record);
        assert_eq!(restored.primary(), &Reading::Failed);
    }

    #[test]
    fn test_from_row_rejects_skipped_backup_after_failure() {
        let (primary, backup) = endpoints();
        let mut row = MeasurementRecord::primary_failed(at(1, 2, 3), &primary, &backup, None).to_row();
        row.ping_backup = NOT_MEASURED_REAL;
        row.download_backup = NOT_MEASURED_REAL;
        row.upload_backup = NOT_MEASURED_REAL;

        let err = MeasurementRecord::from_row(row).unwrap_err();
        assert!(matches!(err, DomainError::InconsistentRecord { .. }));
    }

    #[test]
    fn test_from_row_rejects_bad_hour() {
        let (primary, backup) = endpoints();
        let mut row = MeasurementRecord::primary_failed(at(1, 2, 3), &primary, &backup, None).to_row();
        row.hour = "25:00:00".to_string();

        assert!(matches!(
            MeasurementRecord::from_row(row),
            Err(DomainError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_reading_from_values() {
        assert_eq!(Reading::from_values(-1.0, -1.0, -1.0), Reading::NotMeasured);
        assert_eq!(Reading::from_values(0.0, 0.0, 0.0), Reading::Failed);
        assert!(matches!(
            Reading::from_values(0.0, 10.0, 0.0),
            Reading::Measured(_)
        ));
    }

    #[test]
    fn test_sentinel_valued_throughput_collides() {
        let throughput = |v: f64| Throughput {
            ping_ms: v,
            download_bps: v,
            upload_bps: v,
        };
        assert!(throughput(FAILED_REAL).collides_with_sentinel());
        assert!(throughput(NOT_MEASURED_REAL).collides_with_sentinel());
        assert!(!Throughput {
            ping_ms: 0.0,
            download_bps: 0.0,
            upload_bps: 1.0,
        }
        .collides_with_sentinel());
    }
}
