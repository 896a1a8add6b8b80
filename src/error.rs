//! Error types for the dashboard data layer.

use thiserror::Error;

/// Everything that can go wrong between reading a result set and producing
/// a chart-ready view.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Invalid date '{value}' at row {row}")]
    InvalidDate { row: usize, value: String },

    #[error("Invalid number '{value}' at row {row}, column '{column}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Quantile must be between 0 and 1, got {0}")]
    InvalidQuantile(f64),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for data layer operations.
pub type Result<T> = std::result::Result<T, DashboardError>;
