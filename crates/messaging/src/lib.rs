//! Messaging for order events.
//!
//! - [`EventPublisher`] is the capability the use cases publish through
//! - [`MessageTransport`] moves keyed messages; [`InMemoryTransport`] is a
//!   partitioned log with consumer-group offsets
//! - [`Delivery`] is what consumers receive

pub mod error;
pub mod message;
pub mod publisher;
pub mod transport;

pub use error::{PublishError, TransportError};
pub use message::{
    Delivery, HEADER_CONTENT_TYPE, HEADER_CUSTOMER_ID, HEADER_EVENT_ID, HEADER_EVENT_TYPE,
    HEADER_TIMESTAMP, Headers, OutboundMessage, RecordMetadata,
};
pub use publisher::{EventPublisher, InMemoryEventPublisher, TransportPublisher};
pub use transport::{InMemoryTransport, MessageTransport};
