use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use agent_bus::{EventBus, RecvError};
use agent_model::event::{format_publisher, now_unix_seconds};
use agent_model::{Event, EventType, Execution, ExecutionAttempt};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ExecutorConfig;
use crate::decide::{decide, Decision};
use crate::duration;
use crate::job::Job;
use crate::script_cache::ScriptCache;

const ROLE_SUFFIX: &str = "executor";

/// Channel depth standing in for the "unbuffered" channel described in the
/// concurrency model: tokio has no true rendezvous channel, so capacity 1
/// is the closest analogue — a producer can hand off at most one pending
/// Job before blocking on the next send, which still gives workers natural
/// backpressure.
const INTAKE_CHANNEL_CAPACITY: usize = 1;

/// Consumes TASK events, supervises child processes through the
/// retry/mute/cool-down state machine, and emits terminal RESULT events.
pub struct Executor {
    config: ExecutorConfig,
    scripts: ScriptCache,
    run_list: StdMutex<HashSet<String>>,
    bus: Arc<dyn EventBus>,
}

impl Executor {
    pub fn new(config: ExecutorConfig, bus: Arc<dyn EventBus>) -> Self {
        let scripts = ScriptCache::new(config.work_directory.clone(), config.shell_path.clone());
        Self {
            config,
            scripts,
            run_list: StdMutex::new(HashSet::new()),
            bus,
        }
    }

    /// Runs until `cancel` fires: stops accepting new TASK events, closes
    /// the intake channel, and waits for every worker to drain its current
    /// Job to a natural terminal state before returning.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let (tx, rx) = mpsc::channel::<Job>(INTAKE_CHANNEL_CAPACITY);
        let rx = Arc::new(AsyncMutex::new(rx));

        info!(workers = self.config.workers, "executor starting");

        let mut workers = Vec::with_capacity(self.config.workers);
        for worker_id in 0..self.config.workers {
            let this = Arc::clone(&self);
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                this.worker_loop(worker_id, rx).await;
            }));
        }

        let mut tasks_sub = self.bus.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("executor shutting down intake");
                    break;
                }
                incoming = tasks_sub.recv() => {
                    match incoming {
                        Ok(event) if event.event_type == EventType::Task => {
                            self.on_task_event(event, &tx, &cancel).await;
                        }
                        Ok(_) => {
                            // Own-emit filtering: ignore LOG/RESULT, the executor only acts on TASK.
                        }
                        Err(RecvError::Closed) => {
                            warn!("event bus closed while executor was running");
                            break;
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(skipped = n, "executor lagged behind the event bus");
                        }
                    }
                }
            }
        }

        drop(tx);
        for worker in workers {
            let _ = worker.await;
        }
        info!("executor drained, all workers exited");
    }

    #[instrument(skip(self, event, tx, cancel))]
    async fn on_task_event(
        &self,
        event: Event,
        tx: &mpsc::Sender<Job>,
        cancel: &CancellationToken,
    ) {
        let task = match event.label_task() {
            Ok(t) => t.clone(),
            Err(err) => {
                warn!(%err, "TASK event missing a well-formed task label, dropping");
                return;
            }
        };
        let instructions = match event.label_instructions() {
            Ok(i) => i.clone(),
            Err(err) => {
                warn!(%err, task = %task.name, "TASK event missing instructions, dropping");
                return;
            }
        };

        {
            let mut run_list = self.run_list.lock().expect("run list mutex poisoned");
            if run_list.contains(&task.name) {
                warn!(task = %task.name, "duplicate TASK while one is already in flight, dropping");
                return;
            }
            run_list.insert(task.name.clone());
        }

        let execution = Execution::new(
            task.clone(),
            now_unix_seconds(),
            event.publisher.clone(),
            format_publisher(ROLE_SUFFIX),
        );
        let job = Job::new(execution, instructions);

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!(task = %task.name, "shutting down, abandoning submission");
                self.run_list.lock().expect("run list mutex poisoned").remove(&task.name);
            }
            result = tx.send(job) => {
                if result.is_err() {
                    warn!(task = %task.name, "intake channel closed, abandoning submission");
                    self.run_list.lock().expect("run list mutex poisoned").remove(&task.name);
                }
            }
        }
    }

    async fn worker_loop(&self, worker_id: usize, rx: Arc<AsyncMutex<mpsc::Receiver<Job>>>) {
        debug!(worker_id, "worker starting");
        loop {
            let job = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            match job {
                Some(job) => self.process_job(job).await,
                None => break,
            }
        }
        debug!(worker_id, "worker exiting, channel closed");
    }

    /// The per-Job retry/mute/cool-down loop: run an attempt, record it,
    /// decide whether to stop, optionally cool down, repeat.
    #[instrument(skip(self, job), fields(task = %job.execution.task.name))]
    async fn process_job(&self, mut job: Job) {
        loop {
            let attempt = self.run_once(&job).await;
            let rc = attempt.return_code;
            job.execution.attempts.push(attempt);

            if self.config.log_actions {
                let msg = format!(
                    "task {} attempt {} finished with rc={}",
                    job.execution.task.name,
                    job.execution.attempts.len(),
                    rc
                );
                self.bus
                    .publish(Event::log(&self.config.log_index_prefix, ROLE_SUFFIX, msg));
            }

            match decide(&job.instructions, &job.execution.attempts) {
                Decision::Terminal(status) => {
                    job.execution.status = status;
                    break;
                }
                Decision::Retry => {
                    if job.instructions.cool_down_s > 0 {
                        tokio::time::sleep(Duration::from_secs(job.instructions.cool_down_s)).await;
                    }
                }
            }
        }

        let task_name = job.execution.task.name.clone();
        let result_event = Event::result(&self.config.log_index_prefix, ROLE_SUFFIX, job.execution);
        self.bus.publish(result_event);
        self.run_list
            .lock()
            .expect("run list mutex poisoned")
            .remove(&task_name);
    }

    /// Runs the job's command once to completion (or to its per-attempt
    /// deadline), producing a single `ExecutionAttempt`.
    async fn run_once(&self, job: &Job) -> ExecutionAttempt {
        let executed_at = now_unix_seconds();
        let start = Instant::now();

        let script_path = match self.scripts.get_or_create(&job.execution.task.command) {
            Ok(path) => path,
            Err(err) => {
                warn!(%err, "failed to materialise script, recording as a failed attempt");
                return ExecutionAttempt {
                    executed: executed_at,
                    duration: start.elapsed().as_secs_f64(),
                    return_code: -1,
                    stdout: String::new(),
                    stderr: err.to_string(),
                };
            }
        };

        let mut command = Command::new(&self.config.shell_path);
        command
            .arg(&script_path)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(%err, "failed to spawn child process, recording as a failed attempt");
                return ExecutionAttempt {
                    executed: executed_at,
                    duration: start.elapsed().as_secs_f64(),
                    return_code: -1,
                    stdout: String::new(),
                    stderr: err.to_string(),
                };
            }
        };

        let pid = child.id();
        let cpu_sample: Arc<StdMutex<Option<f64>>> = Arc::new(StdMutex::new(None));
        let sampler = self.spawn_cpu_sampler(pid, Arc::clone(&cpu_sample));

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let return_code = if job.instructions.timeout_s > 0 {
            let deadline = Duration::from_secs(job.instructions.timeout_s);
            match tokio::time::timeout(deadline, child.wait()).await {
                Ok(Ok(status)) => status.code().unwrap_or(-1),
                Ok(Err(err)) => {
                    warn!(%err, "error waiting on child process");
                    -1
                }
                Err(_elapsed) => {
                    warn!(timeout_s = job.instructions.timeout_s, "attempt exceeded its deadline, killing child");
                    let _ = child.kill().await;
                    child.wait().await.ok().and_then(|s| s.code()).unwrap_or(-1)
                }
            }
        } else {
            match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(err) => {
                    warn!(%err, "error waiting on child process");
                    -1
                }
            }
        };

        if let Some(handle) = sampler {
            handle.abort();
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let wall_elapsed = start.elapsed();
        let cpu_sample_value = *cpu_sample.lock().expect("cpu sample mutex poisoned");

        ExecutionAttempt {
            executed: executed_at,
            duration: duration::resolve(self.config.duration_metric, wall_elapsed, cpu_sample_value),
            return_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        }
    }

    fn spawn_cpu_sampler(
        &self,
        pid: Option<u32>,
        slot: Arc<StdMutex<Option<f64>>>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.duration_metric != crate::config::DurationMetric::Cpu {
            return None;
        }
        let pid = pid?;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(50));
            loop {
                ticker.tick().await;
                match duration::sample_child_cpu_seconds(pid) {
                    Some(v) => *slot.lock().expect("cpu sample mutex poisoned") = Some(v),
                    None => break,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_bus::InProcessBus;
    use agent_model::{ExecutionInstruction, Task};
    use std::collections::HashSet as StdHashSet;

    fn task_event(name: &str, command: &str, instructions: ExecutionInstruction) -> Event {
        Event::task(
            "agentlogs",
            "scheduler",
            Task {
                name: name.to_string(),
                command: command.to_string(),
            },
            instructions,
        )
    }

    #[tokio::test]
    async fn single_success_produces_one_attempt() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let dir = tempfile::tempdir().unwrap();
        let config = ExecutorConfig {
            work_directory: dir.path().display().to_string(),
            workers: 1,
            log_actions: false,
            ..Default::default()
        };
        let executor = Arc::new(Executor::new(config, bus.clone()));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let executor = Arc::clone(&executor);
            let cancel = cancel.clone();
            async move { executor.run(cancel).await }
        });

        let mut results = bus.subscribe();
        // Give the spawned run() loop a chance to reach its own subscribe()
        // call before we publish, since broadcast subscribers only see
        // messages sent after they subscribed.
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish(task_event(
            "t1",
            "echo hi",
            ExecutionInstruction::default(),
        ));

        let result = loop {
            let event = results.recv().await.unwrap();
            if event.event_type == EventType::Result {
                break event;
            }
        };
        let execution = result.label_execution().unwrap();
        assert_eq!(execution.attempts.len(), 1);
        assert_eq!(execution.attempts[0].return_code, 0);
        assert_eq!(execution.status, agent_model::ExecutionStatus::Success);
        assert_eq!(execution.attempts[0].stdout, "hi\n");

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn duplicate_submit_is_dropped() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let dir = tempfile::tempdir().unwrap();
        let config = ExecutorConfig {
            work_directory: dir.path().display().to_string(),
            workers: 1,
            log_actions: false,
            ..Default::default()
        };
        let executor = Executor::new(config, bus.clone());
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);

        executor
            .on_task_event(
                task_event("dup", "sleep 1", ExecutionInstruction::default()),
                &tx,
                &cancel,
            )
            .await;

        let run_list: StdHashSet<String> = executor.run_list.lock().unwrap().clone();
        assert!(run_list.contains("dup"));

        // A second TASK for the same name while the first is in flight is dropped.
        let (tx2, mut rx2) = mpsc::channel(1);
        executor
            .on_task_event(
                task_event("dup", "sleep 1", ExecutionInstruction::default()),
                &tx2,
                &cancel,
            )
            .await;
        assert!(rx2.try_recv().is_err());
    }
}
