//! Admissions API — error types.

use admissions_core::error::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The schema could not be provisioned.
    #[error("schema provisioning failed: {0}")]
    Provision(DomainError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::ApplicationNotFound(_) => {
                (StatusCode::NOT_FOUND, "application_not_found")
            }
            DomainError::AlreadyAdmitted { .. } => (StatusCode::CONFLICT, "already_admitted"),
            DomainError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::Unauthorized { .. } => (StatusCode::FORBIDDEN, "unauthorized"),
            DomainError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
            DomainError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn status_of(err: DomainError) -> StatusCode {
        let response = ApiError(err).into_response();
        response.status()
    }

    #[test]
    fn test_application_not_found_maps_to_404() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_of(DomainError::ApplicationNotFound(id)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_already_admitted_maps_to_409() {
        assert_eq!(
            status_of(DomainError::AlreadyAdmitted {
                student_id: Uuid::new_v4(),
                institution_id: Uuid::new_v4(),
                admitted_application_id: Uuid::new_v4(),
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_concurrency_conflict_maps_to_409() {
        assert_eq!(
            status_of(DomainError::ConcurrencyConflict {
                application_id: Uuid::new_v4(),
                expected: 1,
                actual: Some(2),
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(DomainError::Validation("bad input".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unauthorized_maps_to_403() {
        assert_eq!(
            status_of(DomainError::Unauthorized {
                actor_id: Uuid::new_v4(),
                institution_id: Uuid::new_v4(),
            }),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_store_unavailable_maps_to_503() {
        assert_eq!(
            status_of(DomainError::StoreUnavailable("connection refused".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_timeout_maps_to_504() {
        assert_eq!(
            status_of(DomainError::Timeout { timeout_ms: 5000 }),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        assert_eq!(
            status_of(DomainError::Infrastructure("bad row".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
