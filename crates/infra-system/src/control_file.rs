// File-backed ControlSignal
// The operator stops the probe by writing "stop" into this file

use async_trait::async_trait;
use netrecord_core::domain::ControlState;
use netrecord_core::error::{ControlSignalError, Result};
use netrecord_core::port::ControlSignal;
use std::path::PathBuf;
use tracing::debug;

pub struct FileControlSignal {
    path: PathBuf,
}

impl FileControlSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl ControlSignal for FileControlSignal {
    async fn write(&self, state: ControlState) -> Result<()> {
        tokio::fs::write(&self.path, state.as_str())
            .await
            .map_err(|source| ControlSignalError::Unwritable {
                path: self.display_path(),
                source,
            })?;
        debug!(path = %self.path.display(), state = %state, "Control file written");
        Ok(())
    }

    async fn read(&self) -> Result<ControlState> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ControlSignalError::Unreadable {
                path: self.display_path(),
                source,
            })?;

        ControlState::parse(&raw).map_err(|_| ControlSignalError::UnexpectedContent(raw).into())
    }
}
