//! Error types for data preparation, training and persistence.

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Errors raised by the forecasting pipeline.
///
/// Every variant is detected before any windowing or training work begins,
/// so a failed call leaves nothing to clean up.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A parameter is outside its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The table is too short to produce a single window.
    #[error("insufficient data for {partition}: {rows} rows available, at least {required} required")]
    InsufficientData {
        partition: &'static str,
        rows: usize,
        required: usize,
    },

    /// A selected column has zero variance over the training range.
    #[error("column {column} ('{name}') has zero standard deviation over the training range")]
    DegenerateColumn { column: usize, name: String },

    /// Two arrays that must line up do not.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A required CSV column is absent from the header.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// A CSV field could not be parsed.
    #[error("line {line}: cannot parse '{value}' in column '{column}'")]
    Parse {
        line: usize,
        column: String,
        value: String,
    },

    /// Timestamps are not strictly increasing.
    #[error("line {line}: timestamp {timestamp} does not follow the previous row")]
    UnorderedTimestamps { line: usize, timestamp: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ForecastError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ForecastError::InvalidConfiguration(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ForecastError>;
