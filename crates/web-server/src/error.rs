use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use core_types::FailureKind;
use engine::error::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(err) => match err.kind() {
                FailureKind::DataNotFound => StatusCode::NOT_FOUND,
                FailureKind::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
                FailureKind::MalformedRecord => StatusCode::BAD_REQUEST,
                FailureKind::NetworkError => StatusCode::BAD_GATEWAY,
                FailureKind::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed.");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = match &self {
            AppError::Engine(err) => Json(json!({ "error": error_message, "kind": err.kind() })),
            AppError::BadRequest(_) => Json(json!({ "error": error_message })),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: EngineError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn failure_kinds_map_to_status_codes() {
        let eur: core_types::CurrencyCode = "EUR".parse().unwrap();
        assert_eq!(status_of(EngineError::NotTracked(eur.clone())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(EngineError::InsufficientData {
                currency: eur,
                required: 10,
                available: 3
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(EngineError::InvalidRequest("from > to".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(EngineError::Storage(database::DbError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(EngineError::Ingest(api_client::error::ApiError::Unavailable(
                "HTTP 503".to_string()
            ))),
            StatusCode::BAD_GATEWAY
        );
    }
}
