use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsolationForestError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Training set has no rows")]
    EmptyDataset,

    #[error("Non-finite feature value at row {row}, column {col}")]
    NonFiniteValue { row: usize, col: usize },

    #[error("Corrupt model: {0}")]
    CorruptModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IsolationForestError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptModel(msg.into())
    }
}
