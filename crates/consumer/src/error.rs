//! Consumer error types.

use service::ServiceError;
use thiserror::Error;

/// Errors that can occur while handling a delivered message.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The payload is not a valid order event. Retrying cannot help.
    #[error("Event deserialization error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A use case called by the handler failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// A downstream service (notifications, warehouse, payments) failed.
    #[error("{service} service error: {reason}")]
    SideEffect {
        service: &'static str,
        reason: String,
    },
}

impl ConsumerError {
    pub fn side_effect(service: &'static str, reason: impl Into<String>) -> Self {
        ConsumerError::SideEffect {
            service,
            reason: reason.into(),
        }
    }

    /// Returns true if delivering the same message again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConsumerError::Decode(_) => false,
            ConsumerError::Service(err) => err.is_retryable(),
            ConsumerError::SideEffect { .. } => true,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsumerError::Decode(_) => "DECODE_ERROR",
            ConsumerError::Service(err) => err.kind(),
            ConsumerError::SideEffect { .. } => "SIDE_EFFECT_ERROR",
        }
    }
}

/// Result type for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;
