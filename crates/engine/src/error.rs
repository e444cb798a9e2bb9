use core_types::{CurrencyCode, FailureKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Ingest error: {0}")]
    Ingest(#[from] api_client::error::ApiError),

    #[error("Storage error: {0}")]
    Storage(#[source] database::DbError),

    #[error("Not enough stored reports for {currency}: required {required}, available {available}")]
    InsufficientData {
        currency: CurrencyCode,
        required: usize,
        available: usize,
    },

    #[error("Calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Scoring error: {0}")]
    Analyzer(#[from] analyzer::error::AnalyzerError),

    #[error("Currency {0} is not tracked by this engine")]
    NotTracked(CurrencyCode),

    #[error("No reports stored for {0}")]
    NoReports(CurrencyCode),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    /// Maps a failure to read a calculation window: too few rows stays a data
    /// problem, anything else is a storage problem.
    pub(crate) fn from_window_read(currency: &CurrencyCode, err: database::DbError) -> Self {
        match err {
            database::DbError::InsufficientData {
                requested,
                available,
                ..
            } => EngineError::InsufficientData {
                currency: currency.clone(),
                required: requested,
                available,
            },
            other => EngineError::Storage(other),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::Ingest(e) => e.kind(),
            EngineError::Storage(_) => FailureKind::StorageError,
            EngineError::InsufficientData { .. } => FailureKind::InsufficientData,
            EngineError::Analytics(e) => e.kind(),
            EngineError::Analyzer(e) => e.kind(),
            EngineError::NotTracked(_) | EngineError::NoReports(_) => FailureKind::DataNotFound,
            EngineError::Configuration(_) | EngineError::InvalidRequest(_) => {
                FailureKind::MalformedRecord
            }
        }
    }
}
