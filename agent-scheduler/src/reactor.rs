use std::sync::Arc;
use std::time::Duration;

use agent_bus::{EventBus, RecvError};
use agent_model::{
    parse_interval, Event, EventType, Execution, ExecutionInstruction, MetricSample,
};
use futures::stream::{select_all, StreamExt};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::registry::Registry;
use crate::config::SchedulerConfig;

const ROLE_SUFFIX: &str = "scheduler";

/// Owns the Task/ScheduleItem/Reaction registry, drives the firing wheel
/// and turns RESULT events and pushed metric samples into new TASK events.
pub struct Scheduler {
    registry: Registry,
    log_actions: bool,
    log_index_prefix: String,
    bus: Arc<dyn EventBus>,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig, bus: Arc<dyn EventBus>) -> crate::error::Result<Self> {
        let registry = Registry::build(config)?;
        Ok(Self {
            registry,
            log_actions: config.log_actions,
            log_index_prefix: config.log_index_prefix.clone(),
            bus,
        })
    }

    /// Runs until `cancel` fires, then drains: the firing wheel stops
    /// producing new ticks and the bus subscription is dropped. No partial
    /// dispatch is left in flight since dispatch is synchronous (a single
    /// bus publish) relative to this loop.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticks = self.build_tick_stream();
        let mut results = self.bus.subscribe();

        info!("scheduler starting, {} scheduled item(s)", self.registry.schedule.len());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
                tick = ticks.next() => {
                    match tick {
                        Some(idx) => self.fire_scheduled(idx).await,
                        None => {
                            // No scheduled items at all; only cancellation can end the loop.
                            cancel.cancelled().await;
                            break;
                        }
                    }
                }
                incoming = results.recv() => {
                    match incoming {
                        Ok(event) => self.on_bus_event(event).await,
                        Err(RecvError::Closed) => {
                            warn!("event bus closed while scheduler was running");
                            break;
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(skipped = n, "scheduler lagged behind the event bus");
                        }
                    }
                }
            }
        }
    }

    fn build_tick_stream(&self) -> std::pin::Pin<Box<dyn futures::Stream<Item = usize> + Send>> {
        let streams: Vec<_> = self
            .registry
            .schedule
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let period = parse_interval(&item.interval)
                    .unwrap_or(Duration::from_secs(1))
                    .max(Duration::from_millis(1));
                let interval = tokio::time::interval(period);
                IntervalStream::new(interval).map(move |_| idx)
            })
            .collect();
        Box::pin(select_all(streams))
    }

    async fn fire_scheduled(&self, idx: usize) {
        let Some(item) = self.registry.schedule.get(idx) else {
            return;
        };
        debug!(task = %item.task, "schedule tick");
        self.dispatch(&item.task, item.instructions.clone()).await;
    }

    /// Own-emit filtering: LOG and TASK events are discarded without
    /// inspection to prevent feedback loops; only RESULT is acted on.
    async fn on_bus_event(&self, event: Event) {
        if event.event_type != EventType::Result {
            return;
        }
        let Ok(execution) = event.label_execution() else {
            warn!("RESULT event carried a malformed result label, dropping");
            return;
        };
        self.on_result(execution.clone()).await;
    }

    #[instrument(skip(self, execution), fields(task = %execution.task.name))]
    async fn on_result(&self, execution: Execution) {
        let Some(reactions) = self.registry.result_reactions.get(&execution.task.name) else {
            return;
        };
        for reaction in reactions {
            if let agent_model::Reaction::OnResult {
                condition,
                reaction_task,
                instructions,
                ..
            } = reaction
            {
                if condition.eval(&execution) {
                    self.dispatch(reaction_task, instructions.clone()).await;
                }
            }
        }
    }

    /// Push entry point for externally delivered metric samples.
    #[instrument(skip(self, label_keys, label_vals))]
    pub async fn on_metric(
        &self,
        name: &str,
        time: f64,
        kind: &str,
        interval: &str,
        value: f64,
        label_keys: &[String],
        label_vals: &[String],
    ) {
        let Some(reactions) = self.registry.metric_reactions.get(name) else {
            return;
        };
        let sample = MetricSample {
            name,
            time,
            kind,
            interval,
            value,
            label_keys,
            label_vals,
        };
        for reaction in reactions {
            if let agent_model::Reaction::OnMetric {
                condition,
                reaction_task,
                instructions,
                ..
            } = reaction
            {
                if condition.eval(&sample) {
                    self.dispatch(reaction_task, instructions.clone()).await;
                }
            }
        }
    }

    /// Dispatch path shared by the firing wheel, RESULT reactions and
    /// metric reactions: normalise retries, emit TASK, optionally emit LOG.
    async fn dispatch(&self, task_name: &str, instructions: ExecutionInstruction) {
        let Some(task) = self.registry.tasks.get(task_name) else {
            warn!(task = task_name, "dispatch target not found in registry");
            return;
        };
        let instructions = instructions.normalized();
        let event = Event::task(&self.log_index_prefix, ROLE_SUFFIX, task.clone(), instructions);
        self.bus.publish(event);

        if self.log_actions {
            let log = Event::log(
                &self.log_index_prefix,
                ROLE_SUFFIX,
                format!("submitted task {task_name}"),
            );
            self.bus.publish(log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_bus::InProcessBus;
    use agent_model::ExecutionAttempt;
    use agent_model::{ExecutionStatus, Task};

    fn scheduler_with(yaml: &str, bus: Arc<dyn EventBus>) -> Scheduler {
        let config: SchedulerConfig = serde_yaml::from_str(yaml).unwrap();
        Scheduler::new(&config, bus).unwrap()
    }

    #[tokio::test]
    async fn reaction_on_result_dispatches_new_task() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let scheduler = scheduler_with(
            r#"
tasks:
  - name: t1
    command: "echo hi"
  - name: t2
    command: "echo bye"
reactions:
  - ofTask: t1
    condition: "status=error"
    reaction: t2
"#,
            bus.clone(),
        );

        let mut rx = bus.subscribe();

        let mut execution = Execution::new(
            Task { name: "t1".to_string(), command: "echo hi".to_string() },
            0.0,
            "x-scheduler".to_string(),
            "x-executor".to_string(),
        );
        execution.status = ExecutionStatus::Error;
        execution.attempts.push(ExecutionAttempt {
            executed: 0.0,
            duration: 0.1,
            return_code: 1,
            stdout: String::new(),
            stderr: String::new(),
        });

        scheduler.on_result(execution).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Task);
        assert_eq!(event.label_task().unwrap().name, "t2");
    }

    #[tokio::test]
    async fn metric_reaction_respects_threshold() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let scheduler = scheduler_with(
            r#"
tasks:
  - name: t1
    command: "echo hi"
reactions:
  - ofMetric: m
    condition: "value>=10"
    reaction: t1
"#,
            bus.clone(),
        );
        let mut rx = bus.subscribe();

        scheduler
            .on_metric("m", 0.0, "gauge", "1s", 9.0, &[], &[])
            .await;
        scheduler
            .on_metric("m", 0.0, "gauge", "1s", 11.0, &[], &[])
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Task);
        assert_eq!(event.label_task().unwrap().name, "t1");
    }

    #[tokio::test]
    async fn own_emit_filtering_ignores_task_and_log() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let scheduler = scheduler_with(
            r#"
tasks:
  - name: t1
    command: "echo hi"
"#,
            bus.clone(),
        );
        // TASK/LOG events must not panic or be mistaken for RESULT.
        scheduler
            .on_bus_event(Event::log("agentlogs", "executor", "noise".to_string()))
            .await;
    }
}
