// Control Signal Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Token persisted in the control file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    Start,
    Stop,
}

impl ControlState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlState::Start => "start",
            ControlState::Stop => "stop",
        }
    }

    /// Normalize raw file content (trim + lowercase) into a state
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "start" => Ok(ControlState::Start),
            "stop" => Ok(ControlState::Stop),
            _ => Err(DomainError::UnknownControlState(raw.to_string())),
        }
    }
}

impl FromStr for ControlState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
