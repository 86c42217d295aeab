//! The Executor: a worker pool that materialises TASK requests into
//! supervised child processes with timeout, retry, mute-on-return-code
//! and cool-down semantics, emitting RESULT events.

pub mod config;
pub mod decide;
pub mod duration;
pub mod error;
pub mod executor;
pub mod job;
pub mod script_cache;

pub use config::{DurationMetric, ExecutorConfig};
pub use decide::{decide, Decision};
pub use error::ExecutorError;
pub use executor::Executor;
pub use job::Job;
pub use script_cache::ScriptCache;
