//! Table rendering for records and reports

use netrecord_core::application::report::{MetricStats, Report, SeriesSummary};
use netrecord_core::domain::{MeasurementRecord, Reading, DATE_FORMAT, HOUR_FORMAT};
use tabled::{Table, Tabled};

const BITS_PER_MEGABIT: f64 = 1_000_000.0;

#[derive(Tabled)]
struct RecordLine {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Time")]
    hour: String,
    #[tabled(rename = "Primary")]
    primary: String,
    #[tabled(rename = "Backup")]
    backup: String,
}

#[derive(Tabled)]
struct SummaryLine {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Skipped")]
    not_measured: usize,
    #[tabled(rename = "Ping ms (min/avg/max)")]
    ping: String,
    #[tabled(rename = "Down Mbit/s (min/avg/max)")]
    download: String,
    #[tabled(rename = "Up Mbit/s (min/avg/max)")]
    upload: String,
}

/// One-cell rendering of a reading
pub fn reading_cell(name: &str, reading: &Reading) -> String {
    match reading {
        Reading::Measured(t) => format!(
            "{}: {:.1} ms, {:.2}/{:.2} Mbit/s",
            name,
            t.ping_ms,
            t.download_bps / BITS_PER_MEGABIT,
            t.upload_bps / BITS_PER_MEGABIT
        ),
        Reading::Failed => format!("{}: failed", name),
        Reading::NotMeasured => "-".to_string(),
    }
}

pub fn records_table(records: &[MeasurementRecord]) -> String {
    let lines: Vec<RecordLine> = records
        .iter()
        .map(|r| RecordLine {
            date: r.taken_at().format(DATE_FORMAT).to_string(),
            hour: r.taken_at().format(HOUR_FORMAT).to_string(),
            primary: reading_cell(r.primary_name(), r.primary()),
            backup: reading_cell(r.backup_name(), r.backup()),
        })
        .collect();
    Table::new(lines).to_string()
}

fn stats_cell(stats: Option<MetricStats>, scale: f64) -> String {
    match stats {
        Some(s) => format!(
            "{:.2} / {:.2} / {:.2}",
            s.min / scale,
            s.avg / scale,
            s.max / scale
        ),
        None => "n/a".to_string(),
    }
}

fn summary_line(endpoint: &str, series: &SeriesSummary) -> SummaryLine {
    SummaryLine {
        endpoint: endpoint.to_string(),
        samples: series.samples,
        failed: series.failed,
        not_measured: series.not_measured,
        ping: stats_cell(series.ping_ms, 1.0),
        download: stats_cell(series.download_bps, BITS_PER_MEGABIT),
        upload: stats_cell(series.upload_bps, BITS_PER_MEGABIT),
    }
}

pub fn report_table(report: &Report, primary_name: &str, backup_name: &str) -> String {
    Table::new(vec![
        summary_line(primary_name, &report.primary),
        summary_line(backup_name, &report.backup),
    ])
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use netrecord_core::domain::Throughput;

    #[test]
    fn test_reading_cell() {
        let measured = Reading::Measured(Throughput {
            ping_ms: 12.34,
            download_bps: 50_000_000.0,
            upload_bps: 10_000_000.0,
        });

        assert_eq!(
            reading_cell("Vialis", &measured),
            "Vialis: 12.3 ms, 50.00/10.00 Mbit/s"
        );
        assert_eq!(reading_cell("Vialis", &Reading::Failed), "Vialis: failed");
        assert_eq!(reading_cell("inexio", &Reading::NotMeasured), "-");
    }

    #[test]
    fn test_stats_cell_scales() {
        let stats = MetricStats {
            min: 1_000_000.0,
            max: 3_000_000.0,
            avg: 2_000_000.0,
        };
        assert_eq!(stats_cell(Some(stats), BITS_PER_MEGABIT), "1.00 / 2.00 / 3.00");
        assert_eq!(stats_cell(None, 1.0), "n/a");
    }
}
