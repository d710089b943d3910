//! Order domain events.

use chrono::{DateTime, Utc};
use common::{CustomerId, EventId, FieldValue, Fields, OrderId};
use serde::{Deserialize, Serialize};

use crate::ValidationError;

use super::{Currency, Money, OrderStatus};

/// Kind of a published order event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "order.created")]
    Created,
    #[serde(rename = "order.confirmed")]
    Confirmed,
    #[serde(rename = "order.cancelled")]
    Cancelled,
    #[serde(rename = "order.shipped")]
    Shipped,
    #[serde(rename = "order.delivered")]
    Delivered,
    #[serde(rename = "order.refunded")]
    Refunded,
    #[serde(rename = "order.status_changed")]
    StatusChanged,
}

impl EventType {
    /// Every event type.
    pub const ALL: [EventType; 7] = [
        EventType::Created,
        EventType::Confirmed,
        EventType::Cancelled,
        EventType::Shipped,
        EventType::Delivered,
        EventType::Refunded,
        EventType::StatusChanged,
    ];

    /// Event emitted when an order enters `status` through a status update.
    pub fn for_status(status: OrderStatus) -> EventType {
        match status {
            OrderStatus::Confirmed => EventType::Confirmed,
            OrderStatus::Cancelled => EventType::Cancelled,
            OrderStatus::Shipped => EventType::Shipped,
            OrderStatus::Delivered => EventType::Delivered,
            OrderStatus::Refunded => EventType::Refunded,
            OrderStatus::Pending | OrderStatus::Processing => EventType::StatusChanged,
        }
    }

    /// Returns the wire name, e.g. `order.created`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "order.created",
            EventType::Confirmed => "order.confirmed",
            EventType::Cancelled => "order.cancelled",
            EventType::Shipped => "order.shipped",
            EventType::Delivered => "order.delivered",
            EventType::Refunded => "order.refunded",
            EventType::StatusChanged => "order.status_changed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| ValidationError::new(format!("unknown event type: {s}")))
    }
}

/// Immutable snapshot of an order at the moment something happened to it.
///
/// Built with [`Order::to_event`](super::Order::to_event); extra data is
/// attached through [`OrderEvent::with_data`] before publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    event_type: EventType,
    event_id: EventId,
    order_id: OrderId,
    customer_id: CustomerId,
    status: OrderStatus,
    total_amount: Money,
    currency: Currency,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    data: Fields,
}

impl OrderEvent {
    pub(crate) fn new(
        event_type: EventType,
        order_id: OrderId,
        customer_id: CustomerId,
        status: OrderStatus,
        total_amount: Money,
        currency: Currency,
        data: Fields,
    ) -> Self {
        Self {
            event_type,
            event_id: EventId::new(),
            order_id,
            customer_id,
            status,
            total_amount,
            currency,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Returns a copy of the event with one more data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &Fields {
        &self.data
    }

    /// Returns a string data entry.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(FieldValue::as_str)
    }

    /// Returns an integer data entry.
    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(FieldValue::as_i64)
    }
}
