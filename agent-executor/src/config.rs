use serde::Deserialize;

use crate::error::{ExecutorError, Result};

fn default_true() -> bool {
    true
}

fn default_log_index_prefix() -> String {
    "agentlogs".to_string()
}

fn default_work_directory() -> String {
    "/var/lib/sg-agent".to_string()
}

fn default_shell_path() -> String {
    "/bin/bash".to_string()
}

fn default_workers() -> usize {
    3
}

/// Basis for the `duration` field recorded on each `ExecutionAttempt`. The
/// source material records CPU time; the test fixtures assert wall-clock
/// thresholds. Rather than guess, this is a configuration knob: `wall` is
/// the default because it's what Rust's `Instant` gives for free and what
/// the timeout-enforcement scenario actually measures; `cpu` is a
/// best-effort approximation sampled from `/proc/<pid>/stat` while the
/// child runs (Linux only — falls back to wall time elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationMetric {
    Wall,
    Cpu,
}

impl Default for DurationMetric {
    fn default() -> Self {
        DurationMetric::Wall
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(rename = "logActions", default = "default_true")]
    pub log_actions: bool,
    #[serde(rename = "logIndexPrefix", default = "default_log_index_prefix")]
    pub log_index_prefix: String,
    #[serde(rename = "workDirectory", default = "default_work_directory")]
    pub work_directory: String,
    #[serde(rename = "shellPath", default = "default_shell_path")]
    pub shell_path: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(rename = "durationMetric", default)]
    pub duration_metric: DurationMetric,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            log_actions: true,
            log_index_prefix: default_log_index_prefix(),
            work_directory: default_work_directory(),
            shell_path: default_shell_path(),
            workers: default_workers(),
            duration_metric: DurationMetric::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ExecutorError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: ExecutorConfig = serde_yaml::from_str(&text)?;
        config.ensure_work_directory()?;
        Ok(config)
    }

    /// Creates `work_directory` with mode 0700 if it does not already
    /// exist, matching the original `Config()` bootstrap step.
    pub fn ensure_work_directory(&self) -> Result<()> {
        let path = std::path::Path::new(&self.work_directory);
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(path).map_err(|source| ExecutorError::WorkDirectory {
            path: self.work_directory.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(path, perms).map_err(|source| ExecutorError::WorkDirectory {
                path: self.work_directory.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
