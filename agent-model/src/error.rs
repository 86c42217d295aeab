use thiserror::Error;

/// Errors raised while building or validating the shared data model.
///
/// Per the error handling design, only *configuration*-kind failures are
/// ever propagated as a hard error; everything else (transient OS failure,
/// bus type mismatch, predicate evaluation failure) is handled locally by
/// the caller and never constructs one of these.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid interval string: {0:?}")]
    InvalidInterval(String),

    #[error("invalid result predicate: {0:?}")]
    InvalidResultPredicate(String),

    #[error("invalid metric predicate: {0:?}")]
    InvalidMetricPredicate(String),

    #[error("unknown execution status: {0:?}")]
    UnknownStatus(String),

    #[error("reaction must set exactly one of ofTask/ofMetric: {0:?}")]
    AmbiguousReactionTarget(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
