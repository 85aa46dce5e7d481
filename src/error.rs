use std::{fmt, io};

use machine_learning::{MlErr, initialization::RandErr};

/// The result type used across the tutorial harness.
pub type Result<T> = std::result::Result<T, TutorialError>;

/// All errors that can occur while setting up, training or evaluating a model.
///
/// Every variant is a configuration error: the run can't go on and nothing is retried.
#[derive(Debug)]
pub enum TutorialError {
    /// Invalid configuration, caught before any training step.
    InvalidConfig(String),
    /// The shape declared when binding doesn't match the supplied data.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A batch size below the accepted minimum.
    InvalidBatchSize { got: usize, min: usize },
    /// Parameters or optimizer used before being initialized.
    NotInitialized(&'static str),
    /// An error reported by the numeric backend.
    Ml(MlErr),
    /// The configuration file couldn't be read.
    Io(io::Error),
    /// The configuration file isn't valid JSON for a `TrainingConfig`.
    Json(serde_json::Error),
}

impl fmt::Display for TutorialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            Self::InvalidBatchSize { got, min } => {
                write!(f, "invalid batch size {got}, it must be at least {min}")
            }
            Self::NotInitialized(what) => write!(f, "{what} used before being initialized"),
            Self::Ml(e) => write!(f, "backend error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for TutorialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for TutorialError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<RandErr> for TutorialError {
    fn from(e: RandErr) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

impl From<io::Error> for TutorialError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for TutorialError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
