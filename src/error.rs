//! Ошибки конвейера и предсказателя

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing expected column `{0}`")]
    MissingColumn(String),

    #[error("Duplicate column `{0}`")]
    DuplicateColumn(String),

    #[error("Empty table: {0}")]
    EmptyTable(String),

    #[error("Row count mismatch in {context}: got {got}, expected {expected}")]
    RowMismatch {
        context: String,
        got: usize,
        expected: usize,
    },

    #[error("Column `{0}` is not numeric")]
    NonNumericColumn(String),

    #[error("Non-finite value {value:?} in numeric column `{column}`")]
    NonFiniteValue { column: String, value: String },

    #[error("Need {required} eligible features after exclusions, found {found}")]
    InsufficientFeatures { required: usize, found: usize },

    #[error("Feature mismatch: expected {expected:?}, got {got:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Feature `{0}` has zero variance and cannot be standardized")]
    ZeroVariance(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Unseen category {value:?} in column `{column}`")]
    UnseenCategory {
        column: String,
        value: Option<String>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Linfa error: {0}")]
    Linfa(#[from] linfa::Error),

    #[error("Dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("XGBoost error: {0}")]
    Booster(#[from] xgboost::XGBError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
