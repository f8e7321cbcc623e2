use thiserror::Error;

/// Failure taxonomy shared by every stage of the density pipeline.
///
/// None of these are retried: the computation is deterministic over a fixed
/// snapshot of observations, so the same input fails the same way again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DensityError {
    /// A value violated the field's preconditions (non-finite or out of bounds).
    #[error("invalid observation: {0}")]
    Validation(String),
    /// The algorithm reached a state its own invariants rule out.
    #[error("internal consistency violated: {0}")]
    InternalConsistency(String),
    /// Merged output would grow past the configured point cap.
    #[error("density curve exceeds {limit} points (attempted {attempted})")]
    ResourceLimit { limit: usize, attempted: usize },
    #[error("unknown field: {0}")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, DensityError>;
