use core_types::{CurrencyCode, FailureKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid scoring configuration: {0}")]
    Config(#[from] configuration::ConfigError),

    #[error("Index result for {index} cannot be combined with momentum result for {momentum}")]
    MismatchedResults {
        index: CurrencyCode,
        momentum: CurrencyCode,
    },
}

impl AnalyzerError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::MalformedRecord
    }
}
