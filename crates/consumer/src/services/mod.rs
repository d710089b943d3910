//! Downstream services the consumer drives, with in-memory implementations.
//!
//! Every operation is idempotent: notifications are keyed by event id,
//! payments, refunds and reservations by order id.

pub mod notification;
pub mod payment;
pub mod warehouse;

pub use notification::{
    InMemoryNotificationService, Notification, NotificationService, NotificationTemplate,
};
pub use payment::{InMemoryPaymentService, PaymentResult, PaymentService, RefundResult};
pub use warehouse::{InMemoryWarehouseService, ReservationResult, WarehouseService};
