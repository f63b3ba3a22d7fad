// Record Builder - primary/backup measurement policy

use crate::domain::{Endpoint, MeasurementRecord};
use crate::port::{MeasurementError, MeasurementOutcome, SpeedMeter};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds one record per cycle from the primary and, on failure, the backup endpoint
///
/// The backup is only measured after a primary failure, so the common path
/// costs a single measurement. Adapter failures never escape: they become
/// sentinel values in the record.
pub struct RecordBuilder {
    meter: Arc<dyn SpeedMeter>,
    primary: Endpoint,
    backup: Endpoint,
}

impl RecordBuilder {
    pub fn new(meter: Arc<dyn SpeedMeter>, primary: Endpoint, backup: Endpoint) -> Self {
        Self {
            meter,
            primary,
            backup,
        }
    }

    pub fn primary(&self) -> &Endpoint {
        &self.primary
    }

    pub fn backup(&self) -> &Endpoint {
        &self.backup
    }

    /// A success whose values read back as a sentinel is no success
    async fn measure(&self, endpoint: &Endpoint) -> MeasurementOutcome {
        let metrics = self.meter.measure(endpoint).await?;
        if metrics.collides_with_sentinel() {
            return Err(MeasurementError::MalformedOutput(format!(
                "values {}/{}/{} are indistinguishable from a sentinel",
                metrics.ping_ms, metrics.download_bps, metrics.upload_bps
            )));
        }
        Ok(metrics)
    }

    /// Measure and assemble the record stamped with `now`
    pub async fn build(&self, now: NaiveDateTime) -> MeasurementRecord {
        match self.measure(&self.primary).await {
            Ok(metrics) => {
                info!(
                    endpoint = %self.primary,
                    ping_ms = metrics.ping_ms,
                    download_bps = metrics.download_bps,
                    upload_bps = metrics.upload_bps,
                    "Primary measurement succeeded"
                );
                MeasurementRecord::primary_succeeded(now, &self.primary, metrics, &self.backup)
            }
            Err(primary_err) => {
                warn!(
                    endpoint = %self.primary,
                    error = %primary_err,
                    "Unable to get results from primary server, trying backup"
                );

                let backup_metrics = match self.measure(&self.backup).await {
                    Ok(metrics) => {
                        info!(
                            endpoint = %self.backup,
                            ping_ms = metrics.ping_ms,
                            download_bps = metrics.download_bps,
                            upload_bps = metrics.upload_bps,
                            "Backup measurement succeeded"
                        );
                        Some(metrics)
                    }
                    Err(backup_err) => {
                        warn!(
                            endpoint = %self.backup,
                            error = %backup_err,
                            "Unable to get results from backup server"
                        );
                        None
                    }
                };

                MeasurementRecord::primary_failed(now, &self.primary, &self.backup, backup_metrics)
            }
        }
    }
}
