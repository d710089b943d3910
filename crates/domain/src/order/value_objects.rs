//! Value objects for the order domain.

use common::ItemId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ValidationError;

/// Product reference (SKU or catalogue id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the reference is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Money amount held as an exact count of minor units (cents).
///
/// On the wire it is a JSON number with two decimals (`26.98`). Inputs with
/// more precision than a cent are rejected instead of rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Largest cent count a JSON number (an IEEE double) holds exactly: 2^53.
    pub const MAX_EXACT_CENTS: i64 = 1 << 53;

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Converts a decimal amount (e.g. `10.99`) into exact cents.
    ///
    /// The amount is read through its shortest round-trip decimal text, so
    /// `10000.005` is rejected rather than rounded. Amounts beyond
    /// [`Money::MAX_EXACT_CENTS`] are rejected.
    pub fn from_decimal(amount: f64) -> Result<Self, ValidationError> {
        if !amount.is_finite() {
            return Err(ValidationError::new("amount must be a finite number"));
        }
        if amount.abs() * 100.0 > Self::MAX_EXACT_CENTS as f64 {
            return Err(ValidationError::new(format!("amount {amount} is out of range")));
        }
        format!("{amount}").parse::<Money>().map_err(|_| {
            ValidationError::new(format!("amount {amount} has more than two decimal places"))
        })
    }

    /// Checks that the amount survives the JSON number encoding exactly.
    fn within_exact_range(self) -> Result<Self, ValidationError> {
        if self.cents.unsigned_abs() > Self::MAX_EXACT_CENTS as u64 {
            return Err(ValidationError::new(format!("amount {self} is out of range")));
        }
        Ok(self)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal number of major units.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Adds another amount, `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Multiplies by a quantity, `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Sums amounts exactly, `None` on overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::str::FromStr for Money {
    type Err = ValidationError;

    /// Parses a plain decimal string such as `"12.34"` or `"-5"` exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::new(format!("invalid amount: {s}"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Money::from_cents(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl serde::de::Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a decimal amount with at most two fraction digits")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Money, E> {
                Money::from_decimal(v).map_err(E::custom)
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Money, E> {
                v.checked_mul(100)
                    .map(Money::from_cents)
                    .ok_or_else(|| E::custom(format!("amount {v} is out of range")))?
                    .within_exact_range()
                    .map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Money, E> {
                let v = i64::try_from(v)
                    .map_err(|_| E::custom(format!("amount {v} is out of range")))?;
                self.visit_i64(v)
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse::<Money>()
                    .and_then(Money::within_exact_range)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// ISO 4217-style currency code: three ASCII letters, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parses and normalizes a currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new(format!(
                "currency must be a 3-letter code, got {code:?}"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// US dollars, the default currency.
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::usd()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// Which address slot of an order an address occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Shipping,
    Billing,
}

impl AddressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::Shipping => "shipping",
            AddressKind::Billing => "billing",
        }
    }
}

impl std::str::FromStr for AddressKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shipping" => Ok(AddressKind::Shipping),
            "billing" => Ok(AddressKind::Billing),
            other => Err(ValidationError::new(format!("invalid address kind: {other}"))),
        }
    }
}

/// Postal address attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
    #[serde(alias = "zip_code")]
    pub postal_code: String,
}

impl Address {
    /// Checks that the mandatory parts are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("street", &self.street),
            ("city", &self.city),
            ("country", &self.country),
            ("postal code", &self.postal_code),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::new(format!("address {name} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// A line item in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line identifier, unique within the order.
    pub id: ItemId,

    /// The referenced product.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub name: String,

    /// Unit price.
    pub price: Money,

    /// Quantity ordered.
    pub quantity: u32,

    /// Line total, always `price * quantity`.
    pub total: Money,
}

impl OrderItem {
    /// Creates a validated line item with a fresh id and computed total.
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Result<Self, ValidationError> {
        let product_id = product_id.into();
        let name = name.into();
        if product_id.is_blank() {
            return Err(ValidationError::new("product ID cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(ValidationError::new("item name cannot be empty"));
        }
        if !price.is_positive() {
            return Err(ValidationError::new("item price must be greater than zero"));
        }
        if quantity == 0 {
            return Err(ValidationError::new(
                "item quantity must be greater than zero",
            ));
        }
        let total = price
            .checked_multiply(quantity)
            .ok_or_else(|| ValidationError::new("item total overflows"))?;

        Ok(Self {
            id: ItemId::new(),
            product_id,
            name,
            price,
            quantity,
            total,
        })
    }

    /// Checks every field, including `total == price * quantity` exactly.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::new("item ID cannot be empty"));
        }
        if self.product_id.is_blank() {
            return Err(ValidationError::new("product ID cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("item name cannot be empty"));
        }
        if !self.price.is_positive() {
            return Err(ValidationError::new("item price must be greater than zero"));
        }
        if self.quantity == 0 {
            return Err(ValidationError::new(
                "item quantity must be greater than zero",
            ));
        }
        match self.price.checked_multiply(self.quantity) {
            Some(expected) if expected == self.total => Ok(()),
            Some(expected) => Err(ValidationError::new(format!(
                "item total ({}) doesn't match price * quantity ({expected})",
                self.total
            ))),
            None => Err(ValidationError::new("item total overflows")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_string_conversion() {
        let id = ProductId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");
        assert!(!id.is_blank());
        assert!(ProductId::from("  ").is_blank());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_from_decimal_is_exact() {
        assert_eq!(Money::from_decimal(10.99).unwrap().cents(), 1099);
        assert_eq!(Money::from_decimal(0.1).unwrap().cents(), 10);
        assert_eq!(Money::from_decimal(5.0).unwrap().cents(), 500);
        assert!(Money::from_decimal(1.005).is_err());
        assert!(Money::from_decimal(f64::NAN).is_err());
        assert!(Money::from_decimal(f64::INFINITY).is_err());
    }

    #[test]
    fn test_money_from_decimal_rejects_sub_cent_large_amounts() {
        assert!(Money::from_decimal(10000.005).is_err());
        assert!(Money::from_decimal(123456.789).is_err());
        assert_eq!(Money::from_decimal(10000.05).unwrap().cents(), 1_000_005);
        assert_eq!(
            Money::from_decimal(9_999_999.99).unwrap().cents(),
            999_999_999
        );
        assert_eq!(Money::from_decimal(-42.5).unwrap().cents(), -4250);
    }

    #[test]
    fn test_money_rejects_amounts_beyond_exact_range() {
        assert!(Money::from_decimal(1e14).is_err());
        assert!(serde_json::from_str::<Money>("100000000000000").is_err());
        assert!(serde_json::from_str::<Money>("\"100000000000000.00\"").is_err());
        assert_eq!(
            Money::from_decimal(1_000_000_000_000.25).unwrap().cents(),
            100_000_000_000_025
        );
    }

    #[test]
    fn test_money_parse() {
        assert_eq!("12.34".parse::<Money>().unwrap().cents(), 1234);
        assert_eq!("12.3".parse::<Money>().unwrap().cents(), 1230);
        assert_eq!("7".parse::<Money>().unwrap().cents(), 700);
        assert_eq!("-0.50".parse::<Money>().unwrap().cents(), -50);
        assert!("1.234".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!(".".parse::<Money>().is_err());
    }

    #[test]
    fn test_money_checked_arithmetic() {
        let a = Money::from_cents(1000);
        assert_eq!(a.checked_multiply(3).unwrap().cents(), 3000);
        assert_eq!(a.checked_add(Money::from_cents(5)).unwrap().cents(), 1005);
        assert!(Money::from_cents(i64::MAX).checked_multiply(2).is_none());
        assert!(Money::checked_sum([Money::from_cents(i64::MAX), a]).is_none());
    }

    #[test]
    fn test_money_json_is_a_decimal_number() {
        let json = serde_json::to_string(&Money::from_cents(2698)).unwrap();
        assert_eq!(json, "26.98");

        let money: Money = serde_json::from_str("10.99").unwrap();
        assert_eq!(money.cents(), 1099);
        let money: Money = serde_json::from_str("5").unwrap();
        assert_eq!(money.cents(), 500);
        assert!(serde_json::from_str::<Money>("1.001").is_err());
        assert!(serde_json::from_str::<Money>("123456.789").is_err());
        assert!(serde_json::from_str::<Money>("10000.005").is_err());
    }

    #[test]
    fn test_currency_normalizes_and_validates() {
        assert_eq!(Currency::new("eur").unwrap().as_str(), "EUR");
        assert_eq!(Currency::default().as_str(), "USD");
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("U5D").is_err());
        assert!(serde_json::from_str::<Currency>("\"dollars\"").is_err());
    }

    #[test]
    fn test_order_item_total() {
        let item = OrderItem::new("SKU-001", "Widget", Money::from_cents(1099), 2).unwrap();
        assert_eq!(item.total.cents(), 2198);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_order_item_rejects_invalid_input() {
        assert!(OrderItem::new("SKU-001", "Widget", Money::zero(), 1).is_err());
        assert!(OrderItem::new("SKU-001", "Widget", Money::from_cents(-1), 1).is_err());
        assert!(OrderItem::new("SKU-001", "Widget", Money::from_cents(100), 0).is_err());
        assert!(OrderItem::new("", "Widget", Money::from_cents(100), 1).is_err());
        assert!(OrderItem::new("SKU-001", "", Money::from_cents(100), 1).is_err());
    }

    #[test]
    fn test_order_item_validate_detects_total_drift() {
        let mut item = OrderItem::new("SKU-001", "Widget", Money::from_cents(500), 3).unwrap();
        item.total = Money::from_cents(1501);
        let err = item.validate().unwrap_err();
        assert!(err.message().contains("doesn't match"));
    }

    #[test]
    fn test_address_validation() {
        let mut address = Address {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: None,
            country: "US".into(),
            postal_code: "12345".into(),
        };
        assert!(address.validate().is_ok());
        address.city = " ".into();
        assert!(address.validate().is_err());
    }
}
