use domain::{OrderError, OrderId, OrderStatus, ValidationError};
use order_store::RepositoryError;
use thiserror::Error;

/// Errors returned by the order use cases.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request or the resulting order failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The status change is not allowed from the current status.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Another writer updated the order first.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// The repository failed.
    #[error("Persistence error: {0}")]
    Persistence(#[source] RepositoryError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl ServiceError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            ServiceError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            ServiceError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            ServiceError::Persistence(_) => "PERSISTENCE_ERROR",
            ServiceError::Cancelled => "CANCELLED",
            ServiceError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// Returns true if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ConcurrencyConflict { .. }
                | ServiceError::Persistence(_)
                | ServiceError::DeadlineExceeded
        )
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => ServiceError::OrderNotFound(id),
            RepositoryError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            } => ServiceError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            },
            other => ServiceError::Persistence(other),
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(e) => ServiceError::Validation(e),
            OrderError::InvalidStatusTransition { from, to } => {
                ServiceError::InvalidStatusTransition { from, to }
            }
            OrderError::DataIntegrity(msg) => {
                ServiceError::Persistence(RepositoryError::DataIntegrity(msg))
            }
        }
    }
}

/// Result type for use case operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
