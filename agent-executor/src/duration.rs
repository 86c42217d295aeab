use std::time::Duration;

use crate::config::DurationMetric;

/// Assumed kernel clock tick rate used to convert `/proc/<pid>/stat`
/// utime/stime fields to seconds. `100` is the value on essentially every
/// Linux distribution; reading the real `sysconf(_SC_CLK_TCK)` would pull
/// in a libc binding for one constant that never changes in practice.
#[cfg(target_os = "linux")]
const CLK_TCK: f64 = 100.0;

/// Best-effort sample of a running child's CPU time (user+system), read
/// from `/proc/<pid>/stat`. Returns `None` if the process has already
/// exited or the platform isn't Linux; callers fall back to wall time.
#[cfg(target_os = "linux")]
pub fn sample_child_cpu_seconds(pid: u32) -> Option<f64> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the `(comm)` parenthesised group are space-separated;
    // the comm field itself may contain spaces, so split after the last ')'.
    let after_comm = stat.rsplit_once(')')?.1;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // utime is field 14, stime is field 15 counting from field 1 = pid;
    // after stripping "pid (comm)" we're at field 3, so index 11/12 here.
    let utime: f64 = fields.get(11)?.parse().ok()?;
    let stime: f64 = fields.get(12)?.parse().ok()?;
    Some((utime + stime) / CLK_TCK)
}

#[cfg(not(target_os = "linux"))]
pub fn sample_child_cpu_seconds(_pid: u32) -> Option<f64> {
    None
}

/// Resolves the final recorded `duration` for an attempt given the
/// configured metric, the wall-clock elapsed time, and the last CPU
/// sample taken while the child was running (if any).
pub fn resolve(metric: DurationMetric, wall_elapsed: Duration, last_cpu_sample: Option<f64>) -> f64 {
    match metric {
        DurationMetric::Wall => wall_elapsed.as_secs_f64(),
        DurationMetric::Cpu => last_cpu_sample.unwrap_or_else(|| wall_elapsed.as_secs_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_metric_uses_elapsed_time_regardless_of_sample() {
        let d = resolve(DurationMetric::Wall, Duration::from_secs(2), Some(99.0));
        assert_eq!(d, 2.0);
    }

    #[test]
    fn cpu_metric_falls_back_to_wall_when_no_sample() {
        let d = resolve(DurationMetric::Cpu, Duration::from_secs(2), None);
        assert_eq!(d, 2.0);
    }

    #[test]
    fn cpu_metric_uses_sample_when_present() {
        let d = resolve(DurationMetric::Cpu, Duration::from_secs(2), Some(0.4));
        assert_eq!(d, 0.4);
    }
}
