//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use projections::ProjectionError;
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga or domain error.
    Saga(SagaError),
    /// A read model could not catch up.
    Projection(ProjectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => (saga_status(&err), err.to_string()),
            ApiError::Projection(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::QueryNotFound(_) | SagaError::OrderNotFound(_) | SagaError::ProductNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        SagaError::Domain(DomainError::AggregateNotFound { .. }) => StatusCode::NOT_FOUND,
        SagaError::Notification { .. } => StatusCode::BAD_GATEWAY,
        e if e.is_invalid_input() => StatusCode::BAD_REQUEST,
        e if e.is_invalid_transition() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{AggregateId, ProductId};
    use domain::OrderError;

    use super::*;

    #[test]
    fn not_found_errors_map_to_404() {
        assert_eq!(
            saga_status(&SagaError::QueryNotFound(AggregateId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            saga_status(&SagaError::ProductNotFound(ProductId::new("X"))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn invalid_input_maps_to_400() {
        assert_eq!(
            saga_status(&SagaError::InvalidOrder("no lines".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            saga_status(&SagaError::Domain(DomainError::Order(OrderError::NoItems))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_transition_maps_to_409() {
        assert_eq!(
            saga_status(&SagaError::OrderNotReady("fulfilled".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn notification_failure_maps_to_502() {
        let err = SagaError::Notification {
            attempts: 3,
            reason: "channel down".into(),
        };
        assert_eq!(saga_status(&err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn infrastructure_errors_map_to_500() {
        assert_eq!(
            saga_status(&SagaError::Inventory("ledger offline".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
