//! Order event consumer.
//!
//! [`ConsumerWorker`]s read each transport partition in offset order and
//! hand every record to an [`OrderEventHandler`], which triggers the
//! downstream side effects for the event type. Side effects go through the
//! service traits in [`services`] and are idempotent, so redelivery is
//! harmless.

pub mod error;
pub mod handler;
pub mod services;
pub mod worker;

pub use error::{ConsumerError, Result};
pub use handler::{DEFAULT_LOOKUP_TIMEOUT, MessageHandler, OrderEventHandler, tracking_number};
pub use services::{
    InMemoryNotificationService, InMemoryPaymentService, InMemoryWarehouseService, Notification,
    NotificationService, NotificationTemplate, PaymentResult, PaymentService, RefundResult,
    ReservationResult, WarehouseService,
};
pub use worker::{ConsumerWorker, WorkerConfig, spawn_workers};
