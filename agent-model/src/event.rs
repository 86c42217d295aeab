//! Event envelope construction: index/publisher naming and the
//! type-polymorphic label map carried by every emitted event.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::status::Severity;
use crate::types::{Execution, ExecutionInstruction, Task};

const DEFAULT_HOSTNAME: &str = "localhost";

static HOSTNAME: OnceLock<String> = OnceLock::new();

/// Hostname, resolved once and cached for the process lifetime (it cannot
/// change while the process runs). Falls back to `"localhost"` if the OS
/// call fails, matching the original host-name helper's behaviour.
pub fn hostname() -> &'static str {
    HOSTNAME
        .get_or_init(|| {
            hostname_impl::get().unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
        })
        .as_str()
}

#[cfg(unix)]
mod hostname_impl {
    pub fn get() -> Option<String> {
        nix_free_get()
    }

    /// Avoids an extra dependency for a single syscall: shells out to
    /// `uname -n` is unnecessary — `libc::gethostname` would require a new
    /// crate, so this reads the kernel-exposed hostname file instead.
    fn nix_free_get() -> Option<String> {
        std::fs::read_to_string("/proc/sys/kernel/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(not(unix))]
mod hostname_impl {
    pub fn get() -> Option<String> {
        std::env::var("COMPUTERNAME").ok()
    }
}

/// Unix-seconds timestamp as a float, matching `ExecutionAttempt.executed`
/// and `Execution.requested`.
pub fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// `<prefix>-<hostname with dashes replaced by underscores>.<YYYY>.<MM>.<DD>`
pub fn format_index(prefix: &str) -> String {
    let sanitized = hostname().replace('-', "_");
    let now = chrono::Utc::now();
    format!(
        "{}-{}.{:04}.{:02}.{:02}",
        prefix,
        sanitized,
        now.format("%Y").to_string().parse::<u32>().unwrap_or(0),
        now.format("%m").to_string().parse::<u32>().unwrap_or(0),
        now.format("%d").to_string().parse::<u32>().unwrap_or(0)
    )
}

/// `<hostname>-<role-suffix>`, e.g. `host-scheduler` / `host-executor`.
pub fn format_publisher(role_suffix: &str) -> String {
    format!("{}-{}", hostname(), role_suffix)
}

/// The three event kinds carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Log,
    Task,
    Result,
}

/// Closed sum of label value shapes. Modelling this as an explicit enum
/// (rather than `dyn Any`) turns a type mismatch on the bus into a
/// structured decode error instead of a failed dynamic cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Task(Task),
    Instructions(ExecutionInstruction),
    Execution(Execution),
    Text(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LabelError {
    #[error("label {0:?} missing")]
    Missing(String),
    #[error("label {0:?} had the wrong shape")]
    WrongShape(String),
}

/// A fully-built event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub index: String,
    pub time: f64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub publisher: String,
    pub severity: Severity,
    pub labels: std::collections::HashMap<String, LabelValue>,
    pub message: String,
}

impl Event {
    fn new(
        index_prefix: &str,
        role_suffix: &str,
        event_type: EventType,
        severity: Severity,
        message: String,
        labels: std::collections::HashMap<String, LabelValue>,
    ) -> Self {
        Self {
            index: format_index(index_prefix),
            time: now_unix_seconds(),
            event_type,
            publisher: format_publisher(role_suffix),
            severity,
            labels,
            message,
        }
    }

    pub fn task(
        index_prefix: &str,
        role_suffix: &str,
        task: Task,
        instructions: ExecutionInstruction,
    ) -> Self {
        let mut labels = std::collections::HashMap::new();
        let message = format!("submitting task {}", task.name);
        labels.insert("task".to_string(), LabelValue::Task(task));
        labels.insert(
            "instructions".to_string(),
            LabelValue::Instructions(instructions),
        );
        Self::new(
            index_prefix,
            role_suffix,
            EventType::Task,
            Severity::Info,
            message,
            labels,
        )
    }

    pub fn result(index_prefix: &str, role_suffix: &str, execution: Execution) -> Self {
        let severity = execution.status.to_severity();
        let message = format!(
            "execution of {} finished with status {}",
            execution.task.name, execution.status
        );
        let mut labels = std::collections::HashMap::new();
        labels.insert("result".to_string(), LabelValue::Execution(execution));
        Self::new(
            index_prefix,
            role_suffix,
            EventType::Result,
            severity,
            message,
            labels,
        )
    }

    pub fn log(index_prefix: &str, role_suffix: &str, message: String) -> Self {
        Self::new(
            index_prefix,
            role_suffix,
            EventType::Log,
            Severity::Info,
            message,
            std::collections::HashMap::new(),
        )
    }

    pub fn label_task(&self) -> Result<&Task, LabelError> {
        match self.labels.get("task") {
            None => Err(LabelError::Missing("task".to_string())),
            Some(LabelValue::Task(t)) => Ok(t),
            Some(_) => Err(LabelError::WrongShape("task".to_string())),
        }
    }

    pub fn label_instructions(&self) -> Result<&ExecutionInstruction, LabelError> {
        match self.labels.get("instructions") {
            None => Err(LabelError::Missing("instructions".to_string())),
            Some(LabelValue::Instructions(i)) => Ok(i),
            Some(_) => Err(LabelError::WrongShape("instructions".to_string())),
        }
    }

    pub fn label_execution(&self) -> Result<&Execution, LabelError> {
        match self.labels.get("result") {
            None => Err(LabelError::Missing("result".to_string())),
            Some(LabelValue::Execution(e)) => Ok(e),
            Some(_) => Err(LabelError::WrongShape("result".to_string())),
        }
    }
}
