use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to create work directory {path:?}: {source}")]
    WorkDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to materialise script for command: {0}")]
    ScriptWrite(#[source] std::io::Error),

    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
