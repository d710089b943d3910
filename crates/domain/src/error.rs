//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// A request or aggregate failed a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    /// Creates a validation error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the violation message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order or one of its inputs is invalid.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The requested status change is not in the transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Stored data violates an aggregate invariant.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
}

impl OrderError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "VALIDATION_ERROR",
            OrderError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            OrderError::DataIntegrity(_) => "DATA_INTEGRITY_ERROR",
        }
    }
}
