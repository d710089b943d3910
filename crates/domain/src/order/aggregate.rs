//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, FieldValue, Fields, ItemId, OrderId};
use serde::Serialize;

use crate::{OrderError, ValidationError};

use super::{
    Address, AddressKind, Currency, EventType, Money, OrderEvent, OrderItem, OrderStatus,
    ProductId,
};

/// Order aggregate root.
///
/// Owns its line items and addresses. The total amount is derived from the
/// items and always equals the exact sum of their line totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    email: String,
    status: OrderStatus,
    total_amount: Money,
    currency: Currency,
    items: Vec<OrderItem>,
    shipping_address: Option<Address>,
    billing_address: Option<Address>,
    metadata: Fields,

    /// Storage version for optimistic concurrency, starts at 1.
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Stored representation of an order, used to rehydrate an aggregate.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub email: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub currency: Currency,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub metadata: Fields,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty pending order in USD.
    pub fn new(customer_id: CustomerId, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            customer_id,
            email: email.into(),
            status: OrderStatus::Pending,
            total_amount: Money::zero(),
            currency: Currency::default(),
            items: Vec::new(),
            shipping_address: None,
            billing_address: None,
            metadata: Fields::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds an order from storage, re-checking the amount invariants.
    pub fn from_parts(parts: OrderParts) -> Result<Self, OrderError> {
        for item in &parts.items {
            if item.price.checked_multiply(item.quantity) != Some(item.total) {
                return Err(OrderError::DataIntegrity(format!(
                    "order {}: item {} total {} != {} x {}",
                    parts.id, item.id, item.total, item.price, item.quantity
                )));
            }
        }
        let sum = Money::checked_sum(parts.items.iter().map(|item| item.total));
        if sum != Some(parts.total_amount) {
            return Err(OrderError::DataIntegrity(format!(
                "order {}: total {} does not match item sum",
                parts.id, parts.total_amount
            )));
        }

        Ok(Self {
            id: parts.id,
            customer_id: parts.customer_id,
            email: parts.email,
            status: parts.status,
            total_amount: parts.total_amount,
            currency: parts.currency,
            items: parts.items,
            shipping_address: parts.shipping_address,
            billing_address: parts.billing_address,
            metadata: parts.metadata,
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    /// Returns the stored representation of this order.
    pub fn to_parts(&self) -> OrderParts {
        OrderParts {
            id: self.id,
            customer_id: self.customer_id,
            email: self.email.clone(),
            status: self.status,
            total_amount: self.total_amount,
            currency: self.currency.clone(),
            items: self.items.clone(),
            shipping_address: self.shipping_address.clone(),
            billing_address: self.billing_address.clone(),
            metadata: self.metadata.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn email(&self) -> &str {
        &self.email
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

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    /// Returns the address in the given slot.
    pub fn address(&self, kind: AddressKind) -> Option<&Address> {
        match kind {
            AddressKind::Shipping => self.shipping_address(),
            AddressKind::Billing => self.billing_address(),
        }
    }

    pub fn metadata(&self) -> &Fields {
        &self.metadata
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true while the order is still moving through fulfilment.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }
}

// Mutations
impl Order {
    /// Moves the order to `new_status` if the transition table allows it.
    ///
    /// On rejection the order is left untouched.
    pub fn transition(&mut self, new_status: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: new_status,
            });
        }
        self.status = new_status;
        self.touch();
        Ok(())
    }

    /// Appends a line item and recomputes the total.
    pub fn add_item(
        &mut self,
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Result<ItemId, OrderError> {
        let item = OrderItem::new(product_id, name, price, quantity)?;
        let total = self
            .total_amount
            .checked_add(item.total)
            .ok_or_else(|| ValidationError::new("order total overflows"))?;

        let id = item.id;
        self.items.push(item);
        self.total_amount = total;
        self.touch();
        Ok(id)
    }

    /// Removes a line item. Returns false, changing nothing, if absent.
    pub fn remove_item(&mut self, item_id: ItemId) -> bool {
        let Some(index) = self.items.iter().position(|item| item.id == item_id) else {
            return false;
        };
        self.items.remove(index);
        self.recalculate_total();
        self.touch();
        true
    }

    pub fn set_currency(&mut self, currency: Currency) {
        self.currency = currency;
        self.touch();
    }

    pub fn set_shipping_address(&mut self, address: Address) {
        self.set_address(AddressKind::Shipping, address);
    }

    pub fn set_billing_address(&mut self, address: Address) {
        self.set_address(AddressKind::Billing, address);
    }

    /// Replaces the address in the given slot.
    pub fn set_address(&mut self, kind: AddressKind, address: Address) {
        match kind {
            AddressKind::Shipping => self.shipping_address = Some(address),
            AddressKind::Billing => self.billing_address = Some(address),
        }
        self.touch();
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.metadata.insert(key.into(), value.into());
        self.touch();
    }

    /// Inserts every entry of `fields`, overwriting existing keys.
    pub fn merge_metadata(&mut self, fields: Fields) {
        self.metadata.extend(fields);
        self.touch();
    }

    /// Records the version assigned by the repository after a write.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn recalculate_total(&mut self) {
        // Removing lines from a sum that fit in i64 cannot overflow.
        self.total_amount =
            Money::checked_sum(self.items.iter().map(|item| item.total)).unwrap_or_default();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Order {
    /// Checks that the order is complete and internally consistent.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::new("order ID cannot be empty"));
        }
        if self.customer_id.is_nil() {
            return Err(ValidationError::new("customer ID cannot be empty"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::new("email cannot be empty"));
        }
        if self.items.is_empty() {
            return Err(ValidationError::new("order must have at least one item"));
        }
        if !self.total_amount.is_positive() {
            return Err(ValidationError::new(
                "total amount must be greater than zero",
            ));
        }
        for (i, item) in self.items.iter().enumerate() {
            item.validate()
                .map_err(|e| ValidationError::new(format!("item {i}: {}", e.message())))?;
        }
        if Money::checked_sum(self.items.iter().map(|item| item.total)) != Some(self.total_amount)
        {
            return Err(ValidationError::new(format!(
                "total amount ({}) doesn't match the sum of item totals",
                self.total_amount
            )));
        }
        for address in [&self.shipping_address, &self.billing_address]
            .into_iter()
            .flatten()
        {
            address.validate()?;
        }
        Ok(())
    }

    /// Snapshots the order into an event of the given type.
    ///
    /// The data always carries `email` and `item_count`.
    pub fn to_event(&self, event_type: EventType) -> OrderEvent {
        let mut data = Fields::new();
        data.insert("email".into(), self.email.clone().into());
        data.insert(
            "item_count".into(),
            FieldValue::Integer(i64::try_from(self.item_count()).unwrap_or(i64::MAX)),
        );

        OrderEvent::new(
            event_type,
            self.id,
            self.customer_id,
            self.status,
            self.total_amount,
            self.currency.clone(),
            data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order::new(CustomerId::new(), "buyer@example.com")
    }

    fn order_with_items() -> Order {
        let mut order = order();
        order
            .add_item("SKU-1", "Widget", Money::from_cents(1099), 2)
            .unwrap();
        order
            .add_item("SKU-2", "Gadget", Money::from_cents(500), 1)
            .unwrap();
        order
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = order_with_items();
        order.status = status;
        order
    }

    #[test]
    fn test_new_order_defaults() {
        let order = order();
        assert!(!order.id().is_nil());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.currency().as_str(), "USD");
        assert!(order.total_amount().is_zero());
        assert_eq!(order.version(), 1);
        assert!(order.items().is_empty());
    }

    #[test]
    fn test_add_items_sums_exactly() {
        let order = order_with_items();
        assert_eq!(order.total_amount().cents(), 2698);
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.line_count(), 2);
    }

    #[test]
    fn test_remove_item_recomputes_total() {
        let mut order = order_with_items();
        let first = order.items()[0].id;
        assert!(order.remove_item(first));
        assert_eq!(order.total_amount().cents(), 500);
        assert_eq!(order.line_count(), 1);
    }

    #[test]
    fn test_remove_unknown_item_changes_nothing() {
        let mut order = order_with_items();
        let before = order.clone();
        assert!(!order.remove_item(ItemId::new()));
        assert_eq!(order, before);
    }

    #[test]
    fn test_add_item_rejects_non_positive_values() {
        let mut order = order();
        let err = order
            .add_item("SKU-1", "Widget", Money::zero(), 1)
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert!(order.add_item("SKU-1", "Widget", Money::from_cents(1), 0).is_err());
        assert!(order.items().is_empty());
        assert!(order.total_amount().is_zero());
    }

    #[test]
    fn test_duplicate_products_are_separate_lines() {
        let mut order = order();
        order.add_item("SKU-1", "Widget", Money::from_cents(100), 1).unwrap();
        order.add_item("SKU-1", "Widget", Money::from_cents(100), 1).unwrap();
        assert_eq!(order.line_count(), 2);
        assert_eq!(order.total_amount().cents(), 200);
    }

    #[test]
    fn test_transition_follows_table() {
        let mut order = order_with_items();
        assert!(order.transition(OrderStatus::Confirmed).is_ok());
        assert_eq!(order.status(), OrderStatus::Confirmed);

        let mut pending = order_in(OrderStatus::Pending);
        let err = pending.transition(OrderStatus::Processing).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Processing,
            }
        );
        assert_eq!(pending.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_transition_concrete_cases() {
        assert!(order_in(OrderStatus::Shipped)
            .transition(OrderStatus::Cancelled)
            .is_err());
        assert!(order_in(OrderStatus::Delivered)
            .transition(OrderStatus::Refunded)
            .is_ok());
        assert!(order_in(OrderStatus::Cancelled)
            .transition(OrderStatus::Pending)
            .is_err());
    }

    #[test]
    fn test_rejected_transition_leaves_order_unchanged() {
        let mut order = order_in(OrderStatus::Refunded);
        let before = order.clone();
        assert!(order.transition(OrderStatus::Delivered).is_err());
        assert_eq!(order, before);
    }

    #[test]
    fn test_validate_requires_items() {
        let err = order().validate().unwrap_err();
        assert_eq!(err.message(), "order must have at least one item");

        let mut order = order();
        order.add_item("SKU-1", "Widget", Money::from_cents(100), 1).unwrap();
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nil_customer_and_empty_email() {
        let mut order = Order::new(CustomerId::nil(), "buyer@example.com");
        order.add_item("SKU-1", "Widget", Money::from_cents(100), 1).unwrap();
        assert!(order.validate().is_err());

        let mut order = Order::new(CustomerId::new(), "");
        order.add_item("SKU-1", "Widget", Money::from_cents(100), 1).unwrap();
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_validate_detects_total_drift() {
        let mut order = order_with_items();
        order.total_amount = Money::from_cents(2699);
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_to_event_snapshot() {
        let order = order_with_items();
        let event = order.to_event(EventType::Created);
        assert_eq!(event.event_type(), EventType::Created);
        assert_eq!(event.order_id(), order.id());
        assert_eq!(event.customer_id(), order.customer_id());
        assert_eq!(event.status(), OrderStatus::Pending);
        assert_eq!(event.total_amount(), order.total_amount());
        assert_eq!(event.data_str("email"), Some("buyer@example.com"));
        assert_eq!(event.data_i64("item_count"), Some(3));
        assert!(!event.event_id().is_nil());
    }

    #[test]
    fn test_from_parts_rejects_total_mismatch() {
        let order = order_with_items();
        let mut parts = order.to_parts();
        parts.version = 3;
        let rebuilt = Order::from_parts(parts.clone()).unwrap();
        assert_eq!(rebuilt.total_amount(), order.total_amount());
        assert_eq!(rebuilt.version(), 3);

        parts.total_amount = Money::from_cents(1);
        let err = Order::from_parts(parts).unwrap_err();
        assert_eq!(err.kind(), "DATA_INTEGRITY_ERROR");
    }

    #[test]
    fn test_metadata_merge() {
        let mut order = order();
        order.set_metadata("source", "web");
        let mut extra = Fields::new();
        extra.insert("campaign".into(), "spring".into());
        extra.insert("source".into(), "mobile".into());
        order.merge_metadata(extra);
        assert_eq!(order.metadata()["source"], FieldValue::from("mobile"));
        assert_eq!(order.metadata().len(), 2);
    }
}
