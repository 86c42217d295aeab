use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("scheduled task {0:?} was not found in the task list")]
    UnknownScheduledTask(String),

    #[error("reaction target task {0:?} was not found in the task list")]
    UnknownReactionTask(String),

    #[error("reaction ofTask target {0:?} was not found in the task list")]
    UnknownOfTask(String),

    #[error("reaction must set exactly one of ofTask/ofMetric (task={reaction_task:?})")]
    AmbiguousReactionTarget { reaction_task: String },

    #[error("invalid schedule interval {interval:?} for task {task:?}: {source}")]
    InvalidInterval {
        task: String,
        interval: String,
        #[source]
        source: agent_model::ModelError,
    },

    #[error("invalid reaction condition {condition:?}: {source}")]
    InvalidCondition {
        condition: String,
        #[source]
        source: agent_model::ModelError,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
