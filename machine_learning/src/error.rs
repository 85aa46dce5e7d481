use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidBatchSize {
        got: usize,
    },
    EmptyDataset,
    InvalidParam(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::InvalidBatchSize { got } => {
                write!(f, "Invalid batch size {got}, it must be greater than zero")
            }
            MlErr::EmptyDataset => write!(f, "The dataset has no samples"),
            MlErr::InvalidParam(msg) => write!(f, "Invalid parameter: {msg}"),
        }
    }
}

impl Error for MlErr {}
