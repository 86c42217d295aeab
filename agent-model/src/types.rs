use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::{MetricPredicate, ResultPredicate};
use crate::status::ExecutionStatus;

/// A named shell command. Unique by `name` within a process, immutable
/// after load, lives for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub command: String,
}

/// Retry/timeout/mute/cool-down policy attached to a schedule item or a
/// reaction. Copied (not referenced) into each `Job` built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInstruction {
    #[serde(rename = "timeout", default)]
    pub timeout_s: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(rename = "coolDown", default)]
    pub cool_down_s: u64,
    #[serde(rename = "muteOn", default)]
    pub mute_on: HashSet<i32>,
}

fn default_retries() -> u32 {
    1
}

impl ExecutionInstruction {
    /// Normalises `retries` up to 1, matching the dispatch path's rule
    /// that a configured `0` means "try once".
    pub fn normalized(mut self) -> Self {
        if self.retries == 0 {
            self.retries = 1;
        }
        self
    }
}

impl Default for ExecutionInstruction {
    fn default() -> Self {
        Self {
            timeout_s: 0,
            retries: 1,
            cool_down_s: 0,
            mute_on: HashSet::new(),
        }
    }
}

/// A task registered on the firing wheel at a fixed interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub task: String,
    pub interval: String,
    pub instructions: ExecutionInstruction,
}

/// Declarative rule turning a matching RESULT or metric sample into a new
/// TASK. Canonical tagged shape: either variant shares `reaction_task` and
/// `instructions`; the other carried field names the thing being watched.
#[derive(Debug, Clone)]
pub enum Reaction {
    OnResult {
        of_task: String,
        condition: ResultPredicate,
        reaction_task: String,
        instructions: ExecutionInstruction,
    },
    OnMetric {
        of_metric: String,
        condition: MetricPredicate,
        reaction_task: String,
        instructions: ExecutionInstruction,
    },
}

impl Reaction {
    pub fn reaction_task(&self) -> &str {
        match self {
            Reaction::OnResult { reaction_task, .. } => reaction_task,
            Reaction::OnMetric { reaction_task, .. } => reaction_task,
        }
    }

    pub fn instructions(&self) -> &ExecutionInstruction {
        match self {
            Reaction::OnResult { instructions, .. } => instructions,
            Reaction::OnMetric { instructions, .. } => instructions,
        }
    }
}

/// One invocation of the child process belonging to a single `Job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    /// Unix seconds at which the attempt started.
    pub executed: f64,
    /// Seconds of CPU or wall time, depending on the executor's configured
    /// duration metric; see `agent-executor::config::DurationMetric`.
    pub duration: f64,
    #[serde(rename = "returnCode")]
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Record of a task's execution, published as the `result` label of a
/// RESULT event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub task: Task,
    pub requested: f64,
    pub requestor: String,
    pub executor: String,
    pub attempts: Vec<ExecutionAttempt>,
    pub status: ExecutionStatus,
}

impl Execution {
    pub fn new(task: Task, requested: f64, requestor: String, executor: String) -> Self {
        Self {
            task,
            requested,
            requestor,
            executor,
            attempts: Vec::new(),
            status: ExecutionStatus::Success,
        }
    }

    /// Convenience constructor used by tests across the workspace to build
    /// a minimal `Execution` without a full Task/ScheduleItem context.
    #[cfg(test)]
    pub fn new_for_test(task_name: &str, requestor: &str, _unused: &str, executor: &str) -> Self {
        Self::new(
            Task {
                name: task_name.to_string(),
                command: "true".to_string(),
            },
            0.0,
            requestor.to_string(),
            executor.to_string(),
        )
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
