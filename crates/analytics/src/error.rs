use core_types::FailureKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Not enough reports to perform calculation: required {required}, available {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid calculator parameter: {0}")]
    InvalidParameter(String),

    #[error("Malformed report window: {0}")]
    MalformedWindow(String),
}

impl AnalyticsError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalyticsError::InsufficientData { .. } => FailureKind::InsufficientData,
            AnalyticsError::InvalidParameter(_) | AnalyticsError::MalformedWindow(_) => {
                FailureKind::MalformedRecord
            }
        }
    }
}
