use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, Result};

/// Final outcome of an `Execution`. Ordered: `Success < Warning < Error`,
/// matching the ordering relied on by severity projection and by test
/// fixtures that compare statuses with `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Warning,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Warning => "warning",
            ExecutionStatus::Error => "error",
        }
    }

    pub fn from_str_ci(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(ExecutionStatus::Success),
            "warning" => Ok(ExecutionStatus::Warning),
            "error" => Ok(ExecutionStatus::Error),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }

    /// Projection used when building an event envelope.
    pub fn to_severity(&self) -> Severity {
        match self {
            ExecutionStatus::Success => Severity::Info,
            ExecutionStatus::Warning => Severity::Warning,
            ExecutionStatus::Error => Severity::Critical,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_ci(s)
    }
}

/// Event severity, derived from `ExecutionStatus` for RESULT events and
/// fixed to `Info` for TASK/LOG events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}
