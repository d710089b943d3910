//! Dispatch of delivered order events to their side effects.

use std::time::Duration;

use async_trait::async_trait;
use domain::{EventType, OrderEvent, OrderId};
use messaging::{Delivery, HEADER_EVENT_TYPE};
use order_store::OrderRepository;
use service::{GetOrder, RequestContext};
use tracing::Instrument;

use crate::Result;
use crate::services::{
    Notification, NotificationService, NotificationTemplate, PaymentService, WarehouseService,
};

/// Default time budget for the order lookups a handler makes.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Processes one delivered message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn deliver(&self, delivery: &Delivery) -> Result<()>;
}

/// Tracking number for a shipped order: `TRK-` and the first 8 characters
/// of the order id.
pub fn tracking_number(order_id: OrderId) -> String {
    let id = order_id.to_string();
    format!("TRK-{}", id.get(..8).unwrap_or(&id))
}

/// Routes order events by their `event-type` header.
///
/// | Event | Side effects |
/// |-------|--------------|
/// | `order.created` | confirmation email, stock reservation |
/// | `order.confirmed` | payment capture |
/// | `order.cancelled` | refund of the stored total, reservation release |
/// | `order.shipped` | shipping email with tracking number |
/// | `order.delivered` | delivery email |
/// | `order.refunded` | refund of the stored total |
///
/// Anything else, including `order.status_changed`, is logged and
/// acknowledged.
pub struct OrderEventHandler<R, N, W, P>
where
    R: OrderRepository + Clone,
    N: NotificationService,
    W: WarehouseService,
    P: PaymentService,
{
    get_order: GetOrder<R>,
    notifications: N,
    warehouse: W,
    payments: P,
    lookup_timeout: Duration,
}

impl<R, N, W, P> OrderEventHandler<R, N, W, P>
where
    R: OrderRepository + Clone,
    N: NotificationService,
    W: WarehouseService,
    P: PaymentService,
{
    pub fn new(repository: R, notifications: N, warehouse: W, payments: P) -> Self {
        Self {
            get_order: GetOrder::new(repository),
            notifications,
            warehouse,
            payments,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Sets the deadline for each order lookup.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    async fn on_created(&self, event: &OrderEvent) -> Result<()> {
        match event.data_str("email") {
            Some(email) => {
                let sent = self
                    .notifications
                    .send(Notification {
                        event_id: event.event_id(),
                        order_id: event.order_id(),
                        template: NotificationTemplate::OrderCreated,
                        recipient: Some(email.to_string()),
                        tracking_number: None,
                    })
                    .await?;
                tracing::info!(
                    email,
                    sent,
                    template = "order_created",
                    "Order created notification"
                );
            }
            None => tracing::debug!("Order created event carries no email"),
        }

        let item_count = event
            .data_i64("item_count")
            .and_then(|count| u64::try_from(count).ok())
            .unwrap_or(0);
        let reservation = self.warehouse.reserve(event.order_id(), item_count).await?;
        tracing::info!(
            reservation_id = %reservation.reservation_id,
            items_count = reservation.item_count,
            "Items reserved"
        );
        Ok(())
    }

    async fn on_confirmed(&self, event: &OrderEvent) -> Result<()> {
        let payment = self
            .payments
            .capture(event.order_id(), event.total_amount(), event.currency())
            .await?;
        tracing::info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            currency = %event.currency(),
            "Payment captured"
        );
        Ok(())
    }

    async fn on_cancelled(&self, event: &OrderEvent) -> Result<()> {
        let order = self.load_order(event.order_id()).await?;
        let refund = self
            .payments
            .refund(order.id(), order.total_amount(), order.currency())
            .await?;
        let released = self.warehouse.release(order.id()).await?;
        tracing::info!(
            refund_id = %refund.refund_id,
            refund_amount = %refund.amount,
            currency = %order.currency(),
            reservation_released = released,
            "Cancelled order refunded"
        );
        Ok(())
    }

    async fn on_shipped(&self, event: &OrderEvent) -> Result<()> {
        let tracking = tracking_number(event.order_id());
        let sent = self
            .notifications
            .send(Notification {
                event_id: event.event_id(),
                order_id: event.order_id(),
                template: NotificationTemplate::OrderShipped,
                recipient: event.data_str("email").map(str::to_string),
                tracking_number: Some(tracking.clone()),
            })
            .await?;
        tracing::info!(
            tracking_number = %tracking,
            estimated_delivery = "3-5 business days",
            sent,
            "Order shipped"
        );
        Ok(())
    }

    async fn on_delivered(&self, event: &OrderEvent) -> Result<()> {
        let sent = self
            .notifications
            .send(Notification {
                event_id: event.event_id(),
                order_id: event.order_id(),
                template: NotificationTemplate::OrderDelivered,
                recipient: event.data_str("email").map(str::to_string),
                tracking_number: None,
            })
            .await?;
        tracing::info!(delivered_at = %event.timestamp(), sent, "Order delivered");
        Ok(())
    }

    async fn on_refunded(&self, event: &OrderEvent) -> Result<()> {
        let order = self.load_order(event.order_id()).await?;
        let refund = self
            .payments
            .refund(order.id(), order.total_amount(), order.currency())
            .await?;
        tracing::info!(
            refund_id = %refund.refund_id,
            refund_amount = %refund.amount,
            currency = %order.currency(),
            items_count = order.line_count(),
            "Order refunded"
        );
        Ok(())
    }

    fn on_generic(&self, delivery: &Delivery) {
        tracing::info!(
            key = %delivery.key,
            partition = delivery.partition,
            offset = delivery.offset,
            "Processing generic message"
        );
        tracing::debug!(
            headers = ?delivery.headers,
            body_size = delivery.payload.len(),
            "Generic message content"
        );
    }

    async fn load_order(&self, order_id: OrderId) -> Result<domain::Order> {
        let ctx = RequestContext::with_timeout(self.lookup_timeout);
        Ok(self.get_order.execute(&ctx, order_id).await?)
    }
}

#[async_trait]
impl<R, N, W, P> MessageHandler for OrderEventHandler<R, N, W, P>
where
    R: OrderRepository + Clone,
    N: NotificationService,
    W: WarehouseService,
    P: PaymentService,
{
    #[tracing::instrument(
        skip(self, delivery),
        fields(partition = delivery.partition, offset = delivery.offset)
    )]
    async fn deliver(&self, delivery: &Delivery) -> Result<()> {
        let event_type = delivery
            .header(HEADER_EVENT_TYPE)
            .and_then(|value| value.parse::<EventType>().ok());

        let Some(event_type) = event_type.filter(|t| *t != EventType::StatusChanged) else {
            self.on_generic(delivery);
            return Ok(());
        };

        let event: OrderEvent = serde_json::from_slice(&delivery.payload)?;
        let span = tracing::info_span!(
            "order_event",
            event_type = %event_type,
            event_id = %event.event_id(),
            order_id = %event.order_id(),
            customer_id = %event.customer_id()
        );

        async {
            tracing::info!("Processing order event");
            match event_type {
                EventType::Created => self.on_created(&event).await,
                EventType::Confirmed => self.on_confirmed(&event).await,
                EventType::Cancelled => self.on_cancelled(&event).await,
                EventType::Shipped => self.on_shipped(&event).await,
                EventType::Delivered => self.on_delivered(&event).await,
                EventType::Refunded => self.on_refunded(&event).await,
                EventType::StatusChanged => {
                    self.on_generic(delivery);
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await
    }
}
