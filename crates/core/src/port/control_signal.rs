// Control Signal Port
// Cooperative, polled stop request shared with the operator

use crate::domain::ControlState;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ControlSignal: Send + Sync {
    /// Overwrite the shared token
    async fn write(&self, state: ControlState) -> Result<()>;

    /// Read and normalize the shared token
    ///
    /// Missing, unreadable or garbled content is an error, never an implicit stop.
    async fn read(&self) -> Result<ControlState>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::ControlSignalError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// In-memory control "file"
    ///
    /// Scripted contents are applied one per `read`, simulating an operator
    /// editing the file between polls. `None` simulates a missing file.
    #[derive(Clone, Default)]
    pub struct MockControlSignal {
        content: Arc<Mutex<Option<String>>>,
        scripted: Arc<Mutex<VecDeque<Option<String>>>>,
        writes: Arc<Mutex<Vec<ControlState>>>,
        /// Remaining successful writes; `None` means unlimited
        write_budget: Arc<Mutex<Option<usize>>>,
    }

    impl MockControlSignal {
        pub fn new() -> Self {
            Self::default()
        }

        /// Contents the operator puts in place before each successive read
        pub fn script_reads<I, S>(&self, contents: I)
        where
            I: IntoIterator<Item = Option<S>>,
            S: Into<String>,
        {
            let mut scripted = self.scripted.lock().unwrap();
            scripted.extend(contents.into_iter().map(|c| c.map(Into::into)));
        }

        pub fn set_fail_writes(&self, fail: bool) {
            *self.write_budget.lock().unwrap() = if fail { Some(0) } else { None };
        }

        /// Let the next `n` writes succeed, then fail every write
        pub fn fail_writes_after(&self, n: usize) {
            *self.write_budget.lock().unwrap() = Some(n);
        }

        pub fn writes(&self) -> Vec<ControlState> {
            self.writes.lock().unwrap().clone()
        }

        pub fn content(&self) -> Option<String> {
            self.content.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ControlSignal for MockControlSignal {
        async fn write(&self, state: ControlState) -> Result<()> {
            if let Some(left) = self.write_budget.lock().unwrap().as_mut() {
                if *left == 0 {
                    return Err(ControlSignalError::Unwritable {
                        path: "mock".to_string(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::PermissionDenied,
                            "read-only file system",
                        ),
                    }
                    .into());
                }
                *left -= 1;
            }
            self.writes.lock().unwrap().push(state);
            *self.content.lock().unwrap() = Some(state.as_str().to_string());
            Ok(())
        }

        async fn read(&self) -> Result<ControlState> {
            if let Some(next) = self.scripted.lock().unwrap().pop_front() {
                *self.content.lock().unwrap() = next;
            }
            match self.content.lock().unwrap().as_deref() {
                None => Err(ControlSignalError::Unreadable {
                    path: "mock".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                }
                .into()),
                Some(raw) => ControlState::parse(raw)
                    .map_err(|_| ControlSignalError::UnexpectedContent(raw.to_string()).into()),
            }
        }
    }
}
