//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use service::ServiceError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Service(err) => err.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(err) => match err {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::InvalidStatusTransition { .. }
                | ServiceError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
                ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ServiceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }
}

impl From<domain::ValidationError> for ApiError {
    fn from(err: domain::ValidationError) -> Self {
        ApiError::Service(ServiceError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        if status.is_server_error() {
            tracing::error!(error = %self, kind, "request failed");
        } else {
            tracing::debug!(error = %self, kind, "request rejected");
        }
        metrics::counter!(
            "http_errors_total",
            "kind" => kind,
            "status" => status.as_u16().to_string()
        )
        .increment(1);

        let body = ErrorBody {
            error: kind,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderId, OrderStatus, ValidationError};
    use order_store::RepositoryError;

    #[test]
    fn service_errors_map_to_statuses() {
        let cases = [
            (
                ServiceError::Validation(ValidationError::new("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::OrderNotFound(OrderId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::InvalidStatusTransition {
                    from: OrderStatus::Shipped,
                    to: OrderStatus::Cancelled,
                },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::ConcurrencyConflict {
                    order_id: OrderId::new(),
                    expected: 1,
                    actual: 2,
                },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Persistence(RepositoryError::DataIntegrity("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ServiceError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn bad_request_kind() {
        let err = ApiError::bad_request("invalid order id");
        assert_eq!(err.kind(), "BAD_REQUEST");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "invalid order id");
    }

    #[test]
    fn validation_error_converts() {
        let err = ApiError::from(ValidationError::new("email is required"));
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }
}
