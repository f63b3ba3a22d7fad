// Report - read-only summary statistics over stored records

use crate::domain::{MeasurementRecord, Reading, Throughput};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Pings at or above this are treated as outliers by default (ms)
pub const DEFAULT_MAX_PING_MS: f64 = 1000.0;

/// Which samples take part in the statistics
#[derive(Debug, Clone)]
pub struct ReportFilter {
    /// Count failed attempts as zero-valued samples
    pub include_failed: bool,
    /// Drop measured samples whose ping is at or above this bound
    pub max_ping_ms: Option<f64>,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            include_failed: false,
            max_ping_ms: Some(DEFAULT_MAX_PING_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl MetricStats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, max, avg })
    }
}

/// Statistics for one endpoint slot (primary or backup)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub samples: usize,
    pub failed: usize,
    pub not_measured: usize,
    pub ping_ms: Option<MetricStats>,
    pub download_bps: Option<MetricStats>,
    pub upload_bps: Option<MetricStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub records: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub primary: SeriesSummary,
    pub backup: SeriesSummary,
}

pub fn summarize(records: &[MeasurementRecord], filter: &ReportFilter) -> Report {
    Report {
        records: records.len(),
        first: records.iter().map(|r| r.taken_at()).min(),
        last: records.iter().map(|r| r.taken_at()).max(),
        primary: summarize_series(records.iter().map(|r| r.primary()), filter),
        backup: summarize_series(records.iter().map(|r| r.backup()), filter),
    }
}

fn summarize_series<'a>(
    readings: impl Iterator<Item = &'a Reading>,
    filter: &ReportFilter,
) -> SeriesSummary {
    let mut summary = SeriesSummary::default();
    let mut kept: Vec<Throughput> = Vec::new();

    for reading in readings {
        match reading {
            Reading::Measured(t) => {
                if filter.max_ping_ms.map_or(true, |max| t.ping_ms < max) {
                    kept.push(*t);
                }
            }
            Reading::Failed => {
                summary.failed += 1;
                if filter.include_failed {
                    kept.push(Throughput {
                        ping_ms: 0.0,
                        download_bps: 0.0,
                        upload_bps: 0.0,
                    });
                }
            }
            Reading::NotMeasured => summary.not_measured += 1,
        }
    }

    summary.samples = kept.len();
    let column = |f: fn(&Throughput) -> f64| kept.iter().map(f).collect::<Vec<_>>();
    summary.ping_ms = MetricStats::from_values(&column(|t| t.ping_ms));
    summary.download_bps = MetricStats::from_values(&column(|t| t.download_bps));
    summary.upload_bps = MetricStats::from_values(&column(|t| t.upload_bps));
    summary
}
