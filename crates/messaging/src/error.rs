use thiserror::Error;

/// Errors raised by a message transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport could not accept the message.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// A partition outside the configured range was addressed.
    #[error("Unknown partition: {0}")]
    UnknownPartition(usize),
}

/// Errors that can occur while publishing an order event.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport rejected the message.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl PublishError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        "PUBLISH_ERROR"
    }
}
