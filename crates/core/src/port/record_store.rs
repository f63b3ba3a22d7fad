// Record Store Port (Interface)

use crate::domain::MeasurementRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

/// Read filter for historical records
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    /// Inclusive lower bound on `date`
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `date`
    pub to: Option<NaiveDate>,
    pub newest_first: bool,
    pub limit: Option<u32>,
}

impl RecordQuery {
    pub fn latest(limit: u32) -> Self {
        Self {
            newest_first: true,
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &MeasurementRecord) -> bool {
        let date = record.date();
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Durable storage of measurement records
///
/// The handle is acquired before construction (connect) and owned by a
/// single probe loop; `close` releases it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Ensure the records table exists (idempotent)
    async fn create_schema(&self) -> Result<()>;

    /// Append exactly one row; a duplicate `(date, hour)` is an error
    async fn insert(&self, record: &MeasurementRecord) -> Result<()>;

    /// Find a record by its key
    async fn find(&self, date: NaiveDate, time: NaiveTime) -> Result<Option<MeasurementRecord>>;

    /// List records matching the query, ordered by key. Rows that no longer
    /// decode into a valid record are skipped.
    async fn list(&self, query: &RecordQuery) -> Result<Vec<MeasurementRecord>>;

    /// Count all stored records
    async fn count(&self) -> Result<i64>;

    /// Release the underlying connection
    async fn close(&self);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::StorageError;
    use std::sync::{Arc, Mutex};

    /// In-memory store sharing its state between clones
    #[derive(Clone, Default)]
    pub struct MockRecordStore {
        records: Arc<Mutex<Vec<MeasurementRecord>>>,
        fail_inserts: Arc<Mutex<bool>>,
        close_count: Arc<Mutex<usize>>,
    }

    impl MockRecordStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_inserts(&self, fail: bool) {
            *self.fail_inserts.lock().unwrap() = fail;
        }

        pub fn records(&self) -> Vec<MeasurementRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn close_count(&self) -> usize {
            *self.close_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl RecordStore for MockRecordStore {
        async fn create_schema(&self) -> Result<()> {
            Ok(())
        }

        async fn insert(&self, record: &MeasurementRecord) -> Result<()> {
            if *self.fail_inserts.lock().unwrap() {
                return Err(StorageError::Query("disk I/O error".to_string()).into());
            }
            let mut records = self.records.lock().unwrap();
            if records.iter().any(|r| r.key() == record.key()) {
                let (date, hour) = record.key();
                return Err(StorageError::DuplicateKey { date, hour }.into());
            }
            records.push(record.clone());
            Ok(())
        }

        async fn find(
            &self,
            date: NaiveDate,
            time: NaiveTime,
        ) -> Result<Option<MeasurementRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.date() == date && r.time_of_day() == time)
                .cloned())
        }

        async fn list(&self, query: &RecordQuery) -> Result<Vec<MeasurementRecord>> {
            let mut found: Vec<_> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| query.matches(r))
                .cloned()
                .collect();
            found.sort_by_key(|r| r.taken_at());
            if query.newest_first {
                found.reverse();
            }
            if let Some(limit) = query.limit {
                found.truncate(limit as usize);
            }
            Ok(found)
        }

        async fn count(&self) -> Result<i64> {
            Ok(self.records.lock().unwrap().len() as i64)
        }

        async fn close(&self) {
            *self.close_count.lock().unwrap() += 1;
        }
    }
}
