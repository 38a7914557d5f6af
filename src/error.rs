use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Everything that can abort a training run.
///
/// None of these are retried. The interrupt path is the only graceful exit
/// and is reported through `TrainOutcome`, not through an error.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A fail-fast precondition on the current batch did not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// The solver did not produce a named output the current stage needs.
    #[error("solver output `{0}` is not available")]
    MissingOutput(&'static str),

    #[error("could not install interrupt handler: {0}")]
    Signal(String),
}

impl TrainError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        TrainError::Invariant(msg.into())
    }

    pub fn shape(expected: impl ToString, got: impl ToString) -> Self {
        TrainError::ShapeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
