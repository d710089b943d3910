//! Order aggregate and related types.

mod aggregate;
mod events;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderParts};
pub use events::{EventType, OrderEvent};
pub use state::OrderStatus;
pub use value_objects::{Address, AddressKind, Currency, Money, OrderItem, ProductId};
