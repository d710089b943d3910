//! Customer notification service trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{EventId, OrderId};

use crate::error::{ConsumerError, Result};

/// Message template a notification is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationTemplate {
    OrderCreated,
    OrderShipped,
    OrderDelivered,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::OrderCreated => "order_created",
            NotificationTemplate::OrderShipped => "order_shipped",
            NotificationTemplate::OrderDelivered => "order_delivered",
        }
    }
}

/// A notification to a customer about one order event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The triggering event; redelivering it must not notify twice.
    pub event_id: EventId,
    pub order_id: OrderId,
    pub template: NotificationTemplate,
    /// Email address, when the event carried one.
    pub recipient: Option<String>,
    pub tracking_number: Option<String>,
}

/// Sends customer notifications.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends a notification. Returns false if this event was already notified.
    async fn send(&self, notification: Notification) -> Result<bool>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<Notification>,
    seen: HashSet<EventId>,
    fail_on_send: bool,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail every following send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    /// Returns every notification sent, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .len()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, notification: Notification) -> Result<bool> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_send {
            return Err(ConsumerError::side_effect(
                "notification",
                "mail relay unavailable",
            ));
        }
        if !state.seen.insert(notification.event_id) {
            return Ok(false);
        }
        state.sent.push(notification);
        Ok(true)
    }
}
