//! Use case inputs and outputs.

use chrono::{DateTime, Utc};
use domain::{
    Address, Currency, CustomerId, Fields, Money, Order, OrderId, OrderStatus, ProductId,
    ValidationError, validate_email,
};
use order_store::{OrderFilters, SortField, SortOrder};
use serde::Serialize;

/// One line of a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

impl CreateOrderItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            quantity,
        }
    }
}

/// Command to place a new order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateOrderCommand {
    pub customer_id: CustomerId,
    pub email: String,
    pub items: Vec<CreateOrderItem>,
    /// ISO 4217 code; `USD` when absent.
    pub currency: Option<String>,
    pub metadata: Option<Fields>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
}

impl CreateOrderCommand {
    pub fn new(customer_id: CustomerId, email: impl Into<String>) -> Self {
        Self {
            customer_id,
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn item(mut self, item: CreateOrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn metadata(mut self, metadata: Fields) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn billing_address(mut self, address: Address) -> Self {
        self.billing_address = Some(address);
        self
    }

    /// Checks the request before any aggregate is built.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_id.is_nil() {
            return Err(ValidationError::new("customer_id is required"));
        }
        if self.email.is_empty() {
            return Err(ValidationError::new("email is required"));
        }
        validate_email(&self.email)?;
        if self.items.is_empty() {
            return Err(ValidationError::new("at least one item is required"));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.product_id.is_blank() {
                return Err(ValidationError::new(format!(
                    "item {i}: product_id is required"
                )));
            }
            if item.name.trim().is_empty() {
                return Err(ValidationError::new(format!("item {i}: name is required")));
            }
            if !item.price.is_positive() {
                return Err(ValidationError::new(format!(
                    "item {i}: price must be greater than 0"
                )));
            }
            if item.quantity == 0 {
                return Err(ValidationError::new(format!(
                    "item {i}: quantity must be greater than 0"
                )));
            }
        }
        if let Some(code) = self.currency.as_deref()
            && !code.is_empty()
        {
            Currency::new(code)?;
        }
        Ok(())
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOrderStatusCommand {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    pub reason: Option<String>,
}

impl UpdateOrderStatusCommand {
    pub fn new(order_id: OrderId, new_status: OrderStatus) -> Self {
        Self {
            order_id,
            new_status,
            reason: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Order listing request as received from a caller.
///
/// Sort fields arrive as raw strings and are checked against the
/// allow-list when converted into [`OrderFilters`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOrdersQuery {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    pub email: Option<String>,
    pub currency: Option<String>,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListOrdersQuery {
    /// Validates the query and turns it into repository filters.
    pub fn to_filters(&self) -> Result<OrderFilters, ValidationError> {
        let sort_by = match self.sort_by.as_deref() {
            None | Some("") => SortField::default(),
            Some(field) => field
                .parse()
                .map_err(|_| ValidationError::new(format!("invalid sort_by field: {field}")))?,
        };
        let sort_order = match self.sort_order.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(order) => order
                .parse()
                .map_err(|_| ValidationError::new("sort_order must be 'asc' or 'desc'"))?,
        };

        if let Some(min) = self.min_amount
            && min.is_negative()
        {
            return Err(ValidationError::new("min_amount cannot be negative"));
        }
        if let Some(max) = self.max_amount
            && max.is_negative()
        {
            return Err(ValidationError::new("max_amount cannot be negative"));
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount)
            && min > max
        {
            return Err(ValidationError::new(
                "min_amount cannot be greater than max_amount",
            ));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to)
            && from > to
        {
            return Err(ValidationError::new(
                "date_from cannot be later than date_to",
            ));
        }

        let mut filters = OrderFilters::new().sort(sort_by, sort_order);
        filters.customer_id = self.customer_id;
        filters.status = self.status;
        filters.email = self.email.clone().filter(|email| !email.is_empty());
        filters.currency = match self.currency.as_deref() {
            None | Some("") => None,
            Some(code) => Some(Currency::new(code)?),
        };
        filters.min_amount = self.min_amount;
        filters.max_amount = self.max_amount;
        filters.date_from = self.date_from;
        filters.date_to = self.date_to;
        filters.limit = self.limit;
        filters.offset = self.offset;
        filters.limit = Some(filters.effective_limit());
        filters.offset = Some(filters.effective_offset());
        Ok(filters)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOrderStatusResponse {
    pub order: Order,
    pub message: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

/// One page of orders plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<Order>,
    pub total_count: u64,
    pub limit: i64,
    pub offset: i64,
}
