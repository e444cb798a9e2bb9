use crate::enums::FailureKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}

impl CoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CoreError::InvalidInput(..) => FailureKind::MalformedRecord,
        }
    }
}
