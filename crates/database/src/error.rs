use core_types::{CoreError, FailureKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Stored record is malformed: {0}")]
    Malformed(#[from] CoreError),

    #[error("Invalid store request: {0}")]
    InvalidRequest(String),

    #[error("Not enough reports for {currency}: requested {requested}, available {available}")]
    InsufficientData {
        currency: String,
        requested: usize,
        available: usize,
    },

    #[error("The requested data was not found in the database.")]
    NotFound,
}

impl DbError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DbError::InsufficientData { .. } => FailureKind::InsufficientData,
            DbError::NotFound => FailureKind::DataNotFound,
            DbError::Malformed(_) | DbError::InvalidRequest(_) => FailureKind::MalformedRecord,
            DbError::ConnectionConfigError(_)
            | DbError::QueryError(_)
            | DbError::MigrationError(_) => FailureKind::StorageError,
        }
    }
}
