//! Parses and evaluates the two predicate dialects: `ResultPredicate`,
//! matched against a finished `Execution`, and `MetricPredicate`, matched
//! against a pushed metric sample. Both are parsed once at configuration
//! time into an AST and evaluated repeatedly; evaluation never fails — a
//! malformed operand or bad regex simply evaluates to `false`.

use regex::Regex;

use crate::error::{ModelError, Result};
use crate::interval;
use crate::types::Execution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl NumericOp {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            NumericOp::Eq => lhs == rhs,
            NumericOp::Lt => lhs < rhs,
            NumericOp::Le => lhs <= rhs,
            NumericOp::Gt => lhs > rhs,
            NumericOp::Ge => lhs >= rhs,
        }
    }
}

/// Parsed `<selector>=<operand>` predicate evaluated against the last
/// attempt of an `Execution`. Only the selector keyword is validated at
/// parse time; the operand is kept as raw text and converted lazily in
/// `eval`, since spec policy is that a malformed operand (non-numeric
/// `rc`, unparsable `duration`, invalid `stdout`/`stderr` regex) makes the
/// predicate evaluate `false` rather than fail configuration load.
#[derive(Debug, Clone)]
pub enum ResultPredicate {
    Status(String),
    ReturnCode(String),
    DurationAtLeast(String),
    Stdout(String),
    Stderr(String),
}

impl ResultPredicate {
    pub fn parse(raw: &str) -> Result<Self> {
        let (selector, operand) = split_selector(raw)
            .ok_or_else(|| ModelError::InvalidResultPredicate(raw.to_string()))?;

        match selector {
            "status" => Ok(ResultPredicate::Status(operand.to_string())),
            "rc" => Ok(ResultPredicate::ReturnCode(operand.to_string())),
            "duration" => Ok(ResultPredicate::DurationAtLeast(operand.to_string())),
            "stdout" => Ok(ResultPredicate::Stdout(operand.to_string())),
            "stderr" => Ok(ResultPredicate::Stderr(operand.to_string())),
            _ => Err(ModelError::InvalidResultPredicate(raw.to_string())),
        }
    }

    /// Evaluates against `execution.attempts[last]`. An empty attempts
    /// sequence is undefined input per the data model invariants and is
    /// treated here as a non-match rather than a panic. A bad operand
    /// (unknown status word, non-numeric `rc`, unparsable `duration`,
    /// invalid regex) never raises — it just makes the predicate false.
    pub fn eval(&self, execution: &Execution) -> bool {
        let Some(last) = execution.attempts.last() else {
            return false;
        };
        match self {
            ResultPredicate::Status(want) => {
                match crate::status::ExecutionStatus::from_str_ci(want) {
                    Ok(want) => execution.status == want,
                    Err(_) => false,
                }
            }
            ResultPredicate::ReturnCode(raw) => match raw.parse::<i32>() {
                Ok(rc) => last.return_code == rc,
                Err(_) => false,
            },
            ResultPredicate::DurationAtLeast(raw) => match interval::parse_interval(raw) {
                Ok(min) => std::time::Duration::from_secs_f64(last.duration) >= min,
                Err(_) => false,
            },
            ResultPredicate::Stdout(pattern) => match Regex::new(pattern) {
                Ok(re) => re.is_match(&last.stdout),
                Err(_) => false,
            },
            ResultPredicate::Stderr(pattern) => match Regex::new(pattern) {
                Ok(re) => re.is_match(&last.stderr),
                Err(_) => false,
            },
        }
    }
}

/// Parsed metric predicate: either a numeric comparison against the
/// sample's value, or a label-equality match against its label map. The
/// numeric threshold is kept as raw text and parsed lazily in `eval` —
/// a bad operand evaluates `false` rather than failing configuration load.
#[derive(Debug, Clone)]
pub enum MetricPredicate {
    Value { op: NumericOp, threshold_raw: String },
    Label { key: String, value: String },
}

/// The metric sample shape delivered through the Reactor's `onMetric` push
/// entry point.
pub struct MetricSample<'a> {
    pub name: &'a str,
    pub time: f64,
    pub kind: &'a str,
    pub interval: &'a str,
    pub value: f64,
    pub label_keys: &'a [String],
    pub label_vals: &'a [String],
}

impl MetricPredicate {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("value") {
            let (op, num_str) = parse_numeric_op(rest)
                .ok_or_else(|| ModelError::InvalidMetricPredicate(raw.to_string()))?;
            return Ok(MetricPredicate::Value {
                op,
                threshold_raw: num_str.to_string(),
            });
        }

        if let Some((key, value)) = raw.split_once('=') {
            if key.is_empty() {
                return Err(ModelError::InvalidMetricPredicate(raw.to_string()));
            }
            return Ok(MetricPredicate::Label {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        Err(ModelError::InvalidMetricPredicate(raw.to_string()))
    }

    /// A non-numeric threshold never raises — it just makes the `value`
    /// predicate evaluate `false`.
    pub fn eval(&self, sample: &MetricSample<'_>) -> bool {
        match self {
            MetricPredicate::Value { op, threshold_raw } => match threshold_raw.parse::<f64>() {
                Ok(threshold) => op.apply(sample.value, threshold),
                Err(_) => false,
            },
            MetricPredicate::Label { key, value } => sample
                .label_keys
                .iter()
                .zip(sample.label_vals.iter())
                .any(|(k, v)| k == key && v == value),
        }
    }
}

fn split_selector(raw: &str) -> Option<(&str, &str)> {
    raw.split_once('=')
}

/// Parses the leading operator of a `value<op><number>` predicate body
/// (the text after the `value` keyword has already been stripped).
fn parse_numeric_op(rest: &str) -> Option<(NumericOp, &str)> {
    for (prefix, op) in [
        ("<=", NumericOp::Le),
        (">=", NumericOp::Ge),
        ("=", NumericOp::Eq),
        ("<", NumericOp::Lt),
        (">", NumericOp::Gt),
    ] {
        if let Some(num) = rest.strip_prefix(prefix) {
            return Some((op, num));
        }
    }
    None
}
