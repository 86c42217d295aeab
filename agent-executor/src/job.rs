use agent_model::{Execution, ExecutionInstruction};

/// Executor-internal record tracking one TASK from intake to terminal
/// RESULT. The source material's `currentRun` (stdout/stderr buffer,
/// child handle, cancellation handle) has no standalone struct here: each
/// attempt owns its child process and buffers as local state for the
/// duration of `run_once`, which is the natural Rust shape for
/// exclusively-owned, non-shared in-flight state — there is exactly one
/// worker touching a Job at a time, so nothing needs to reach into it from
/// outside that worker's call stack.
#[derive(Debug, Clone)]
pub struct Job {
    pub execution: Execution,
    pub instructions: ExecutionInstruction,
}

impl Job {
    pub fn new(execution: Execution, instructions: ExecutionInstruction) -> Self {
        Self {
            execution,
            instructions,
        }
    }
}
