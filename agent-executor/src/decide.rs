use agent_model::{ExecutionAttempt, ExecutionInstruction, ExecutionStatus};

/// Outcome of evaluating a Job's attempts against its instructions:
/// either another attempt is warranted, or the Job has reached one of its
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Terminal(ExecutionStatus),
}

/// Pure decision function, isolated from the I/O-driving per-Job loop so
/// it can be exercised directly without spawning a single process. Mirrors
/// the per-Job loop's `decide(job)` step.
///
/// Panics if `attempts` is empty — the data model's invariant is that this
/// is always called immediately after appending the attempt just run.
pub fn decide(instructions: &ExecutionInstruction, attempts: &[ExecutionAttempt]) -> Decision {
    let last = attempts.last().expect("decide requires at least one attempt");

    if last.return_code == 0 {
        return if attempts.len() == 1 {
            Decision::Terminal(ExecutionStatus::Success)
        } else {
            Decision::Terminal(ExecutionStatus::Warning)
        };
    }

    if instructions.mute_on.contains(&last.return_code) {
        return Decision::Terminal(ExecutionStatus::Warning);
    }

    if attempts.len() as u32 >= instructions.retries {
        Decision::Terminal(ExecutionStatus::Error)
    } else {
        Decision::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn attempt(rc: i32) -> ExecutionAttempt {
        ExecutionAttempt {
            executed: 0.0,
            duration: 0.0,
            return_code: rc,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn instructions(retries: u32, mute_on: &[i32]) -> ExecutionInstruction {
        ExecutionInstruction {
            timeout_s: 0,
            retries,
            cool_down_s: 0,
            mute_on: mute_on.iter().copied().collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn first_try_success_is_terminal_success() {
        let d = decide(&instructions(3, &[]), &[attempt(0)]);
        assert_eq!(d, Decision::Terminal(ExecutionStatus::Success));
    }

    #[test]
    fn success_after_failure_is_terminal_warning() {
        let d = decide(&instructions(3, &[]), &[attempt(3), attempt(0)]);
        assert_eq!(d, Decision::Terminal(ExecutionStatus::Warning));
    }

    #[test]
    fn muted_failure_is_terminal_warning_with_no_further_retry() {
        let d = decide(&instructions(3, &[2]), &[attempt(2)]);
        assert_eq!(d, Decision::Terminal(ExecutionStatus::Warning));
    }

    #[test]
    fn failure_not_yet_exhausted_retries() {
        let d = decide(&instructions(3, &[]), &[attempt(3)]);
        assert_eq!(d, Decision::Retry);
    }

    #[test]
    fn failure_exhausting_retries_is_terminal_error() {
        let d = decide(&instructions(2, &[]), &[attempt(3), attempt(3)]);
        assert_eq!(d, Decision::Terminal(ExecutionStatus::Error));
    }
}
