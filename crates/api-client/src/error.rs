use core_types::FailureKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream is unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("The upstream rejected the request ({0}): {1}")]
    Rejected(u16, String),

    #[error("No positioning data found: {0}")]
    NotFound(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),
}

impl ApiError {
    /// Maps the error onto the shared taxonomy. Transport problems are
    /// network errors; a body that cannot be decoded is a malformed record.
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Http(e) if e.is_decode() => FailureKind::MalformedRecord,
            ApiError::Http(_) | ApiError::Unavailable(_) | ApiError::Timeout(_) => {
                FailureKind::NetworkError
            }
            ApiError::NotFound(_) => FailureKind::DataNotFound,
            ApiError::Rejected(..) | ApiError::InvalidData(_) => FailureKind::MalformedRecord,
        }
    }
}
