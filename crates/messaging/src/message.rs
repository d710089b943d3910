use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub const HEADER_EVENT_TYPE: &str = "event-type";
pub const HEADER_EVENT_ID: &str = "event-id";
pub const HEADER_CUSTOMER_ID: &str = "customer-id";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_TIMESTAMP: &str = "timestamp";

/// Message headers, name to value.
pub type Headers = BTreeMap<String, String>;

/// A keyed message handed to a transport.
///
/// Messages with the same key always land in the same partition, so they
/// are delivered in the order they were sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: Headers,
}

impl OutboundMessage {
    pub fn new(key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            payload,
            headers: Headers::new(),
        }
    }

    /// Adds a header, replacing any previous value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Where a sent message was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMetadata {
    pub partition: usize,
    pub offset: u64,
}

/// A message as received by a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: Headers,
    pub partition: usize,
    pub offset: u64,
    pub timestamp: DateTime<Utc>,
}

impl Delivery {
    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_replaced_not_duplicated() {
        let message = OutboundMessage::new("key", b"{}".to_vec())
            .with_header(HEADER_EVENT_TYPE, "order.created")
            .with_header(HEADER_EVENT_TYPE, "order.shipped");

        assert_eq!(message.headers.len(), 1);
        assert_eq!(message.headers[HEADER_EVENT_TYPE], "order.shipped");
    }

    #[test]
    fn delivery_header_lookup() {
        let mut headers = Headers::new();
        headers.insert(HEADER_EVENT_ID.into(), "abc".into());
        let delivery = Delivery {
            key: "k".into(),
            payload: Vec::new(),
            headers,
            partition: 0,
            offset: 7,
            timestamp: Utc::now(),
        };
        assert_eq!(delivery.header(HEADER_EVENT_ID), Some("abc"));
        assert_eq!(delivery.header(HEADER_EVENT_TYPE), None);
    }
}
