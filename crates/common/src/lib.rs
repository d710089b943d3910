//! Shared types used across the order service crates.
//!
//! - Typed identifiers (`OrderId`, `CustomerId`, `ItemId`, `EventId`)
//! - The closed `FieldValue` type used for metadata and event data

mod fields;
mod types;

pub use fields::{FieldValue, FieldValueError, Fields};
pub use types::{CustomerId, EventId, ItemId, OrderId};
