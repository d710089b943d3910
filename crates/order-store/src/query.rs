use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use domain::{Currency, CustomerId, Money, Order, OrderStatus, ValidationError};

/// Page size used when the caller gives none (or a non-positive one).
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page size a caller may request.
pub const MAX_LIMIT: i64 = 100;

/// Column an order listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    TotalAmount,
    Status,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::TotalAmount => "total_amount",
            SortField::Status => "status",
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::TotalAmount => "total_amount_cents",
            SortField::Status => "status",
        }
    }

    pub(crate) fn compare(&self, a: &Order, b: &Order) -> Ordering {
        match self {
            SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
            SortField::TotalAmount => a.total_amount().cmp(&b.total_amount()),
            SortField::Status => a.status().as_str().cmp(b.status().as_str()),
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "total_amount" => Ok(SortField::TotalAmount),
            "status" => Ok(SortField::Status),
            other => Err(ValidationError::new(format!("invalid sort field: {other}"))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ValidationError::new(format!("invalid sort order: {s}"))),
        }
    }
}

/// Builder for order listing queries.
///
/// Every filter is optional; an empty filter set matches all orders.
/// `count` ignores the pagination fields.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    /// Filter by customer.
    pub customer_id: Option<CustomerId>,

    /// Filter by current status.
    pub status: Option<OrderStatus>,

    /// Case-insensitive substring of the email.
    pub email: Option<String>,

    /// Filter by currency.
    pub currency: Option<Currency>,

    /// Minimum total (inclusive).
    pub min_amount: Option<Money>,

    /// Maximum total (inclusive).
    pub max_amount: Option<Money>,

    /// Created at or after this instant.
    pub date_from: Option<DateTime<Utc>>,

    /// Created at or before this instant.
    pub date_to: Option<DateTime<Utc>>,

    /// Page size; see [`OrderFilters::effective_limit`].
    pub limit: Option<i64>,

    /// Rows to skip; see [`OrderFilters::effective_offset`].
    pub offset: Option<i64>,

    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl OrderFilters {
    /// Creates a new empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates filters for a specific customer.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    /// Creates filters for a specific status.
    pub fn for_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn customer_id(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn min_amount(mut self, amount: Money) -> Self {
        self.min_amount = Some(amount);
        self
    }

    pub fn max_amount(mut self, amount: Money) -> Self {
        self.max_amount = Some(amount);
        self
    }

    pub fn date_from(mut self, from: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self
    }

    pub fn date_to(mut self, to: DateTime<Utc>) -> Self {
        self.date_to = Some(to);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_by = field;
        self.sort_order = order;
        self
    }

    /// Page size after defaults and the hard cap are applied.
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        }
    }

    /// Offset, never negative.
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Returns true if `order` satisfies every filter that is set.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(customer_id) = self.customer_id
            && order.customer_id() != customer_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status() != status
        {
            return false;
        }
        if let Some(ref email) = self.email
            && !order
                .email()
                .to_lowercase()
                .contains(&email.to_lowercase())
        {
            return false;
        }
        if let Some(ref currency) = self.currency
            && order.currency() != currency
        {
            return false;
        }
        if let Some(min) = self.min_amount
            && order.total_amount() < min
        {
            return false;
        }
        if let Some(max) = self.max_amount
            && order.total_amount() > max
        {
            return false;
        }
        if let Some(from) = self.date_from
            && order.created_at() < from
        {
            return false;
        }
        if let Some(to) = self.date_to
            && order.created_at() > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_cap() {
        assert_eq!(OrderFilters::new().effective_limit(), DEFAULT_LIMIT);
        assert_eq!(OrderFilters::new().limit(0).effective_limit(), DEFAULT_LIMIT);
        assert_eq!(OrderFilters::new().limit(-5).effective_limit(), DEFAULT_LIMIT);
        assert_eq!(OrderFilters::new().limit(50).effective_limit(), 50);
        assert_eq!(OrderFilters::new().limit(500).effective_limit(), MAX_LIMIT);
    }

    #[test]
    fn offset_is_never_negative() {
        assert_eq!(OrderFilters::new().effective_offset(), 0);
        assert_eq!(OrderFilters::new().offset(-3).effective_offset(), 0);
        assert_eq!(OrderFilters::new().offset(40).effective_offset(), 40);
    }

    #[test]
    fn default_sort_is_created_at_desc() {
        let filters = OrderFilters::new();
        assert_eq!(filters.sort_by, SortField::CreatedAt);
        assert_eq!(filters.sort_order, SortOrder::Desc);
    }

    #[test]
    fn sort_parsing_uses_allow_list() {
        assert_eq!("total_amount".parse::<SortField>().unwrap(), SortField::TotalAmount);
        assert!("email; DROP TABLE orders".parse::<SortField>().is_err());
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn matches_applies_every_filter() {
        let customer = CustomerId::new();
        let mut order = Order::new(customer, "Jane.Doe@Example.com");
        order
            .add_item("SKU-1", "Widget", Money::from_cents(1500), 1)
            .unwrap();

        assert!(OrderFilters::new().matches(&order));
        assert!(OrderFilters::for_customer(customer).matches(&order));
        assert!(!OrderFilters::for_customer(CustomerId::new()).matches(&order));
        assert!(OrderFilters::new().email("jane.doe").matches(&order));
        assert!(!OrderFilters::new().email("john").matches(&order));
        assert!(
            OrderFilters::new()
                .min_amount(Money::from_cents(1500))
                .max_amount(Money::from_cents(1500))
                .matches(&order)
        );
        assert!(!OrderFilters::new().min_amount(Money::from_cents(1501)).matches(&order));
        assert!(!OrderFilters::for_status(OrderStatus::Shipped).matches(&order));
        assert!(!OrderFilters::new().currency(Currency::new("EUR").unwrap()).matches(&order));
    }

    #[test]
    fn builder_chain() {
        let customer = CustomerId::new();
        let filters = OrderFilters::new()
            .customer_id(customer)
            .status(OrderStatus::Pending)
            .limit(10)
            .offset(20)
            .sort(SortField::TotalAmount, SortOrder::Asc);

        assert_eq!(filters.customer_id, Some(customer));
        assert_eq!(filters.status, Some(OrderStatus::Pending));
        assert_eq!(filters.limit, Some(10));
        assert_eq!(filters.offset, Some(20));
        assert_eq!(filters.sort_by, SortField::TotalAmount);
    }
}
