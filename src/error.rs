use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

/// Input-validation failures raised by the derivation and forecast engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown period '{period}' for segment '{segment}'")]
    UnknownPeriod { segment: String, period: String },

    #[error("segment '{segment}' has more than one record for period '{period}'")]
    DuplicatePeriod { segment: String, period: String },

    #[error("growth rate needs at least 2 observations, got {observed}")]
    InsufficientHistory { observed: usize },

    #[error("growth step {index} divides by a zero prior-period value")]
    DivisionByZero { index: usize },

    #[error("forecast horizon must be positive, got {0}")]
    InvalidHorizon(i64),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid record at data line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("Dataset contains no records")]
    EmptyDataset,

    #[error("Unknown segment: {0}")]
    UnknownSegment(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(_) | AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownSegment(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
