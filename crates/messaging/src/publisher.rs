//! Order event publishing.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::OrderEvent;

use crate::{
    HEADER_CONTENT_TYPE, HEADER_CUSTOMER_ID, HEADER_EVENT_ID, HEADER_EVENT_TYPE,
    HEADER_TIMESTAMP, MessageTransport, OutboundMessage, PublishError, TransportError,
};

/// Publishes order events to downstream consumers.
///
/// Delivery is at-least-once and ordered per order id.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError>;
}

/// Encodes events as JSON and sends them over a [`MessageTransport`].
///
/// The message key is the order id; headers carry the event type, event
/// id, customer id, content type and the event timestamp (RFC 3339).
#[derive(Debug, Clone)]
pub struct TransportPublisher<T> {
    transport: T,
}

impl<T: MessageTransport> TransportPublisher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the transport message for an event.
    pub fn encode(event: &OrderEvent) -> Result<OutboundMessage, PublishError> {
        let payload = serde_json::to_vec(event)?;
        Ok(OutboundMessage::new(event.order_id().to_string(), payload)
            .with_header(HEADER_EVENT_TYPE, event.event_type().as_str())
            .with_header(HEADER_EVENT_ID, event.event_id().to_string())
            .with_header(HEADER_CUSTOMER_ID, event.customer_id().to_string())
            .with_header(HEADER_CONTENT_TYPE, "application/json")
            .with_header(HEADER_TIMESTAMP, event.timestamp().to_rfc3339()))
    }
}

#[async_trait]
impl<T: MessageTransport> EventPublisher for TransportPublisher<T> {
    #[tracing::instrument(
        skip(self, event),
        fields(
            order_id = %event.order_id(),
            event_id = %event.event_id(),
            event_type = %event.event_type()
        )
    )]
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        let message = Self::encode(event)?;
        let record = self.transport.send(message).await?;

        metrics::counter!(
            "order_events_published_total",
            "event_type" => event.event_type().as_str()
        )
        .increment(1);
        tracing::debug!(
            partition = record.partition,
            offset = record.offset,
            "Order event published"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<OrderEvent>,
    fail_on_publish: bool,
}

/// In-memory publisher for testing; records every event it accepts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject every following event.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.lock().fail_on_publish = fail;
    }

    /// Returns a copy of every published event, oldest first.
    pub fn published(&self) -> Vec<OrderEvent> {
        self.lock().published.clone()
    }

    /// Returns the number of published events.
    pub fn published_count(&self) -> usize {
        self.lock().published.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryPublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        let mut state = self.lock();
        if state.fail_on_publish {
            return Err(PublishError::Transport(TransportError::Unavailable(
                "publisher configured to fail".to_string(),
            )));
        }
        state.published.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryTransport;
    use domain::{CustomerId, EventType, Money, Order, OrderEvent};

    fn event() -> OrderEvent {
        let mut order = Order::new(CustomerId::new(), "buyer@example.com");
        order
            .add_item("SKU-1", "Widget", Money::from_cents(1099), 2)
            .unwrap();
        order.to_event(EventType::Created)
    }

    #[test]
    fn encode_sets_key_and_headers() {
        let event = event();
        let message = TransportPublisher::<InMemoryTransport>::encode(&event).unwrap();

        assert_eq!(message.key, event.order_id().to_string());
        assert_eq!(message.headers[HEADER_EVENT_TYPE], "order.created");
        assert_eq!(message.headers[HEADER_EVENT_ID], event.event_id().to_string());
        assert_eq!(
            message.headers[HEADER_CUSTOMER_ID],
            event.customer_id().to_string()
        );
        assert_eq!(message.headers[HEADER_CONTENT_TYPE], "application/json");
        assert!(chrono::DateTime::parse_from_rfc3339(&message.headers[HEADER_TIMESTAMP]).is_ok());

        let decoded: OrderEvent = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn publish_appends_to_transport() {
        let transport = InMemoryTransport::new(3);
        let publisher = TransportPublisher::new(transport.clone());
        let event = event();

        publisher.publish(&event).await.unwrap();

        let partition = transport.partition_for(&event.order_id().to_string());
        let delivery = transport.fetch(partition, 0).await.unwrap().unwrap();
        assert_eq!(delivery.header(HEADER_EVENT_TYPE), Some("order.created"));
        assert_eq!(transport.len().await, 1);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_publish_error() {
        let transport = InMemoryTransport::new(1);
        transport.set_fail_on_send(true).await;
        let publisher = TransportPublisher::new(transport);

        let err = publisher.publish(&event()).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
        assert_eq!(err.kind(), "PUBLISH_ERROR");
    }

    #[tokio::test]
    async fn in_memory_publisher_records_and_fails_on_demand() {
        let publisher = InMemoryEventPublisher::new();
        publisher.publish(&event()).await.unwrap();
        assert_eq!(publisher.published_count(), 1);

        publisher.set_fail_on_publish(true);
        assert!(publisher.publish(&event()).await.is_err());
        assert_eq!(publisher.published_count(), 1);
    }
}
