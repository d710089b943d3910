//! Domain layer for the order service.
//!
//! This crate provides the order lifecycle core:
//! - The `Order` aggregate with its line items, addresses and derived total
//! - The `OrderStatus` state machine
//! - `OrderEvent` snapshots published after every persisted change
//! - Exact fixed-point `Money`

pub mod error;
pub mod order;
pub mod validation;

pub use common::{CustomerId, EventId, FieldValue, Fields, ItemId, OrderId};
pub use error::{OrderError, ValidationError};
pub use order::{
    Address, AddressKind, Currency, EventType, Money, Order, OrderEvent, OrderItem, OrderParts,
    OrderStatus, ProductId,
};
pub use validation::validate_email;
