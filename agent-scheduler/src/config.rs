use serde::Deserialize;

use agent_model::{ExecutionInstruction, ScheduleItem, Task};

use crate::error::{Result, SchedulerError};

fn default_true() -> bool {
    true
}

fn default_log_index_prefix() -> String {
    "agentlogs".to_string()
}

/// Raw reaction shape as it appears in YAML: exactly one of `of_task` /
/// `of_metric` must be set; validated and resolved into `agent_model::Reaction`
/// when the registry is built.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReaction {
    #[serde(rename = "ofTask", default)]
    pub of_task: Option<String>,
    #[serde(rename = "ofMetric", default)]
    pub of_metric: Option<String>,
    pub condition: String,
    pub reaction: String,
    #[serde(default)]
    pub instructions: ExecutionInstruction,
}

/// Deserialized scheduler configuration, matching the External Interfaces
/// YAML shape.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(rename = "logActions", default = "default_true")]
    pub log_actions: bool,
    #[serde(rename = "logIndexPrefix", default = "default_log_index_prefix")]
    pub log_index_prefix: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
    #[serde(default)]
    pub reactions: Vec<RawReaction>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            log_actions: true,
            log_index_prefix: default_log_index_prefix(),
            tasks: Vec::new(),
            schedule: Vec::new(),
            reactions: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SchedulerError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: SchedulerConfig = serde_yaml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_absent() {
        let yaml = r#"
tasks:
  - name: t1
    command: "echo hi"
schedule:
  - task: t1
    interval: 1s
    instructions:
      retries: 1
"#;
        let cfg: SchedulerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.log_actions);
        assert_eq!(cfg.log_index_prefix, "agentlogs");
        assert_eq!(cfg.tasks.len(), 1);
    }

    #[test]
    fn reaction_requires_condition_and_reaction_fields() {
        let yaml = r#"
ofTask: t1
condition: "status=error"
reaction: t2
"#;
        let r: RawReaction = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(r.of_task.as_deref(), Some("t1"));
        assert!(r.of_metric.is_none());
    }
}
