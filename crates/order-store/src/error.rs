use domain::{OrderError, OrderId};
use thiserror::Error;

/// Errors that can occur when interacting with the order repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No order with this id exists (or, for guarded writes, none matched).
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order with this id already exists.
    #[error("Order already exists: {0}")]
    Duplicate(OrderId),

    /// The stored version did not match the version the caller read.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row violates an order invariant.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

impl From<OrderError> for RepositoryError {
    fn from(err: OrderError) -> Self {
        RepositoryError::DataIntegrity(err.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
