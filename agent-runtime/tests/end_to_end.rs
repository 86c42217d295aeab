use std::sync::Arc;
use std::time::Duration;

use agent_bus::{EventBus, InProcessBus};
use agent_executor::{Executor, ExecutorConfig};
use agent_model::EventType;
use agent_scheduler::{Scheduler, SchedulerConfig};
use tokio_util::sync::CancellationToken;

fn executor_config(work_dir: &std::path::Path) -> ExecutorConfig {
    ExecutorConfig {
        work_directory: work_dir.display().to_string(),
        workers: 2,
        log_actions: false,
        ..Default::default()
    }
}

/// Scenario 6: a RESULT matching a reaction's predicate produces a new
/// TASK for the reaction's target, which the executor in turn runs.
#[tokio::test]
async fn reaction_on_error_result_chains_into_a_second_task() {
    let dir = tempfile::tempdir().unwrap();
    let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());

    let scheduler_yaml = r#"
logActions: false
tasks:
  - name: flaky
    command: "exit 3"
  - name: notify
    command: "echo notified"
schedule:
  - task: flaky
    interval: 1s
    instructions:
      retries: 1
reactions:
  - ofTask: flaky
    condition: "status=error"
    reaction: notify
    instructions:
      retries: 1
"#;
    let scheduler_config: SchedulerConfig = serde_yaml::from_str(scheduler_yaml).unwrap();
    let scheduler = Scheduler::new(&scheduler_config, bus.clone()).unwrap();
    let executor = Arc::new(Executor::new(executor_config(dir.path()), bus.clone()));

    let cancel = CancellationToken::new();
    let scheduler_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };
    let executor_handle = {
        let cancel = cancel.clone();
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(cancel).await })
    };

    let mut observer = bus.subscribe();
    let mut seen_notify_task = false;

    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = observer.recv().await.unwrap();
            if event.event_type == EventType::Task {
                if let Ok(task) = event.label_task() {
                    if task.name == "notify" {
                        seen_notify_task = true;
                        break;
                    }
                }
            }
        }
    })
    .await;

    assert!(outcome.is_ok(), "timed out waiting for the chained task");
    assert!(seen_notify_task);

    cancel.cancel();
    let _ = scheduler_handle.await;
    let _ = executor_handle.await;
}

/// Scenario 1: a single scheduled tick that succeeds produces one TASK and
/// one RESULT with a single successful attempt.
#[tokio::test]
async fn scheduled_task_succeeds_on_first_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());

    let scheduler_yaml = r#"
logActions: false
tasks:
  - name: t1
    command: "echo hi"
schedule:
  - task: t1
    interval: 1s
    instructions:
      retries: 1
"#;
    let scheduler_config: SchedulerConfig = serde_yaml::from_str(scheduler_yaml).unwrap();
    let scheduler = Scheduler::new(&scheduler_config, bus.clone()).unwrap();
    let executor = Arc::new(Executor::new(executor_config(dir.path()), bus.clone()));

    let cancel = CancellationToken::new();
    let scheduler_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };
    let executor_handle = {
        let cancel = cancel.clone();
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(cancel).await })
    };

    let mut observer = bus.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = observer.recv().await.unwrap();
            if event.event_type == EventType::Result {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for a RESULT event");

    let execution = result.label_execution().unwrap();
    assert_eq!(execution.task.name, "t1");
    assert_eq!(execution.attempts.len(), 1);
    assert_eq!(execution.attempts[0].return_code, 0);
    assert_eq!(execution.attempts[0].stdout, "hi\n");

    cancel.cancel();
    let _ = scheduler_handle.await;
    let _ = executor_handle.await;
}
