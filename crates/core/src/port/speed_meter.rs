// Speed Meter Port
// Black-box network measurement against one endpoint

use crate::domain::{Endpoint, Throughput};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why a measurement attempt produced no usable result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Measurement timed out after {0:?}")]
    Timeout(Duration),

    #[error("Measurement tool exited with {exit_code:?}: {stderr}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Malformed measurement output: {0}")]
    MalformedOutput(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Outcome of one attempt: usable values or a classified failure
pub type MeasurementOutcome = Result<Throughput, MeasurementError>;

/// Speed Meter trait
///
/// Implementations never retry; fallback policy belongs to the caller.
#[async_trait]
pub trait SpeedMeter: Send + Sync {
    /// Measure ping, download and upload against `endpoint`
    ///
    /// # Errors
    /// - MeasurementError::SpawnFailed if the tool cannot be started
    /// - MeasurementError::Timeout if the attempt exceeds its deadline
    /// - MeasurementError::ToolFailed on non-zero exit
    /// - MeasurementError::MalformedOutput if required fields are missing
    async fn measure(&self, endpoint: &Endpoint) -> MeasurementOutcome;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Scripted response for one server
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed(Throughput),
        Fail(String),
        Timeout(Duration),
    }

    /// Mock Speed Meter with per-server behavior and a call log
    #[derive(Clone, Default)]
    pub struct MockSpeedMeter {
        behaviors: Arc<Mutex<HashMap<u32, MockBehavior>>>,
        calls: Arc<Mutex<Vec<u32>>>,
    }

    impl MockSpeedMeter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, server_id: u32, behavior: MockBehavior) -> Self {
            self.set(server_id, behavior);
            self
        }

        pub fn set(&self, server_id: u32, behavior: MockBehavior) {
            self.behaviors.lock().unwrap().insert(server_id, behavior);
        }

        /// Server ids in call order
        pub fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count_for(&self, server_id: u32) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|id| **id == server_id)
                .count()
        }
    }

    #[async_trait]
    impl SpeedMeter for MockSpeedMeter {
        async fn measure(&self, endpoint: &Endpoint) -> MeasurementOutcome {
            self.calls.lock().unwrap().push(endpoint.server_id);

            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(&endpoint.server_id)
                .cloned();

            match behavior {
                Some(MockBehavior::Succeed(t)) => Ok(t),
                Some(MockBehavior::Fail(msg)) => Err(MeasurementError::ToolFailed {
                    exit_code: Some(1),
                    stderr: msg,
                }),
                Some(MockBehavior::Timeout(d)) => Err(MeasurementError::Timeout(d)),
                None => Err(MeasurementError::SpawnFailed(format!(
                    "no mock behavior for server {}",
                    endpoint.server_id
                ))),
            }
        }
    }
}
