//! Order use cases.
//!
//! Each use case validates its input, works on the `Order` aggregate,
//! persists through an [`order_store::OrderRepository`] and then publishes
//! the resulting event through a [`messaging::EventPublisher`]. Persistence
//! decides the outcome; publishing is best effort.
//!
//! Every call takes a [`RequestContext`] that can cancel it or give it a
//! deadline.

pub mod commands;
pub mod context;
pub mod create_order;
pub mod error;
pub mod get_order;
pub mod list_orders;
mod publish;
pub mod service;
pub mod update_status;

pub use commands::{
    CreateOrderCommand, CreateOrderItem, CreateOrderResponse, ListOrdersQuery,
    ListOrdersResponse, UpdateOrderStatusCommand, UpdateOrderStatusResponse,
};
pub use context::{Interrupted, RequestContext};
pub use create_order::CreateOrder;
pub use error::{Result, ServiceError};
pub use get_order::GetOrder;
pub use list_orders::ListOrders;
pub use service::OrderService;
pub use update_status::{STATUS_CHANGE_REASON_KEY, UpdateOrderStatus};
