use std::collections::HashMap;

use agent_model::{parse_interval, MetricPredicate, Reaction, ResultPredicate, ScheduleItem, Task};

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};

/// The resolved Task/ScheduleItem/Reaction registry built once at
/// configuration load. Read-only for the remainder of the process
/// lifetime, so the inbound handlers need no locking around it.
pub struct Registry {
    pub tasks: HashMap<String, Task>,
    pub schedule: Vec<ScheduleItem>,
    pub result_reactions: HashMap<String, Vec<Reaction>>,
    pub metric_reactions: HashMap<String, Vec<Reaction>>,
}

impl Registry {
    pub fn build(config: &SchedulerConfig) -> Result<Self> {
        let tasks: HashMap<String, Task> = config
            .tasks
            .iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();

        for item in &config.schedule {
            if !tasks.contains_key(&item.task) {
                return Err(SchedulerError::UnknownScheduledTask(item.task.clone()));
            }
            parse_interval(&item.interval).map_err(|source| SchedulerError::InvalidInterval {
                task: item.task.clone(),
                interval: item.interval.clone(),
                source,
            })?;
        }

        let mut result_reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
        let mut metric_reactions: HashMap<String, Vec<Reaction>> = HashMap::new();

        for raw in &config.reactions {
            if !tasks.contains_key(&raw.reaction) {
                return Err(SchedulerError::UnknownReactionTask(raw.reaction.clone()));
            }

            match (&raw.of_task, &raw.of_metric) {
                (Some(of_task), None) => {
                    if !tasks.contains_key(of_task) {
                        return Err(SchedulerError::UnknownOfTask(of_task.clone()));
                    }
                    let condition = ResultPredicate::parse(&raw.condition).map_err(|source| {
                        SchedulerError::InvalidCondition {
                            condition: raw.condition.clone(),
                            source,
                        }
                    })?;
                    result_reactions
                        .entry(of_task.clone())
                        .or_default()
                        .push(Reaction::OnResult {
                            of_task: of_task.clone(),
                            condition,
                            reaction_task: raw.reaction.clone(),
                            instructions: raw.instructions.clone(),
                        });
                }
                (None, Some(of_metric)) => {
                    let condition = MetricPredicate::parse(&raw.condition).map_err(|source| {
                        SchedulerError::InvalidCondition {
                            condition: raw.condition.clone(),
                            source,
                        }
                    })?;
                    metric_reactions
                        .entry(of_metric.clone())
                        .or_default()
                        .push(Reaction::OnMetric {
                            of_metric: of_metric.clone(),
                            condition,
                            reaction_task: raw.reaction.clone(),
                            instructions: raw.instructions.clone(),
                        });
                }
                _ => {
                    return Err(SchedulerError::AmbiguousReactionTarget {
                        reaction_task: raw.reaction.clone(),
                    })
                }
            }
        }

        Ok(Self {
            tasks,
            schedule: config.schedule.clone(),
            result_reactions,
            metric_reactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;

    fn config_from(yaml: &str) -> SchedulerConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn unresolved_scheduled_task_fails() {
        let cfg = config_from(
            r#"
schedule:
  - task: missing
    interval: 1s
"#,
        );
        assert!(matches!(
            Registry::build(&cfg),
            Err(SchedulerError::UnknownScheduledTask(_))
        ));
    }

    #[test]
    fn reaction_with_both_targets_is_rejected() {
        let cfg = config_from(
            r#"
tasks:
  - name: t1
    command: "echo hi"
  - name: t2
    command: "echo bye"
reactions:
  - ofTask: t1
    ofMetric: m
    condition: "status=error"
    reaction: t2
"#,
        );
        assert!(matches!(
            Registry::build(&cfg),
            Err(SchedulerError::AmbiguousReactionTarget { .. })
        ));
    }

    #[test]
    fn reactions_on_same_key_preserve_declaration_order() {
        let cfg = config_from(
            r#"
tasks:
  - name: t1
    command: "echo hi"
  - name: t2
    command: "echo a"
  - name: t3
    command: "echo b"
reactions:
  - ofTask: t1
    condition: "status=error"
    reaction: t2
  - ofTask: t1
    condition: "status=warning"
    reaction: t3
"#,
        );
        let registry = Registry::build(&cfg).unwrap();
        let reactions = &registry.result_reactions["t1"];
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[0].reaction_task(), "t2");
        assert_eq!(reactions[1].reaction_task(), "t3");
    }
}
