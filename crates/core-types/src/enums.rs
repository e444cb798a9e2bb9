use serde::{Deserialize, Serialize};
use std::fmt;

/// The failure taxonomy shared by every layer of the positioning engine.
///
/// Each crate keeps its own error enum, but all of them can be reduced to one
/// of these kinds. The aggregator uses it to explain why a currency is missing
/// from a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Transient transport failure. Retried once by the ingestor.
    NetworkError,
    /// No report exists for the requested currency/date.
    DataNotFound,
    /// Fewer reports than the calculation's minimum window.
    InsufficientData,
    /// A record failed schema or consistency validation.
    MalformedRecord,
    /// The persistence collaborator is unavailable or rejected a write.
    StorageError,
}

impl FailureKind {
    /// Only network failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::NetworkError)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::NetworkError => "network error",
            FailureKind::DataNotFound => "data not found",
            FailureKind::InsufficientData => "insufficient data",
            FailureKind::MalformedRecord => "malformed record",
            FailureKind::StorageError => "storage error",
        };
        f.write_str(label)
    }
}
