//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{Currency, Money, OrderId};

use crate::error::{ConsumerError, Result};

/// Result of a payment capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub payment_id: String,
    pub amount: Money,
}

/// Result of a refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    pub refund_id: String,
    pub amount: Money,
}

/// Captures and refunds order payments.
///
/// Both operations are keyed by order id: repeating one returns the
/// original result instead of moving money again.
#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn capture(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &Currency,
    ) -> Result<PaymentResult>;

    async fn refund(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &Currency,
    ) -> Result<RefundResult>;
}

/// Short reference derived from an order id, e.g. `PAY-1a2b3c4d`.
fn reference(prefix: &str, order_id: OrderId) -> String {
    let id = order_id.to_string();
    format!("{prefix}-{}", id.get(..8).unwrap_or(&id))
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    captures: HashMap<OrderId, PaymentResult>,
    refunds: HashMap<OrderId, RefundResult>,
    fail_on_capture: bool,
    fail_on_refund: bool,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_capture(&self, fail: bool) {
        self.write().fail_on_capture = fail;
    }

    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write().fail_on_refund = fail;
    }

    /// Returns the number of captured payments.
    pub fn capture_count(&self) -> usize {
        self.read().captures.len()
    }

    /// Returns the number of refunds issued.
    pub fn refund_count(&self) -> usize {
        self.read().refunds.len()
    }

    /// Returns the refund issued for an order, if any.
    pub fn refund_for(&self, order_id: OrderId) -> Option<RefundResult> {
        self.read().refunds.get(&order_id).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn capture(
        &self,
        order_id: OrderId,
        amount: Money,
        _currency: &Currency,
    ) -> Result<PaymentResult> {
        let mut state = self.write();

        if state.fail_on_capture {
            return Err(ConsumerError::side_effect("payment", "Payment declined"));
        }

        Ok(state
            .captures
            .entry(order_id)
            .or_insert_with(|| PaymentResult {
                payment_id: reference("PAY", order_id),
                amount,
            })
            .clone())
    }

    async fn refund(
        &self,
        order_id: OrderId,
        amount: Money,
        _currency: &Currency,
    ) -> Result<RefundResult> {
        let mut state = self.write();

        if state.fail_on_refund {
            return Err(ConsumerError::side_effect("payment", "Refund rejected"));
        }

        Ok(state
            .refunds
            .entry(order_id)
            .or_insert_with(|| RefundResult {
                refund_id: reference("REF", order_id),
                amount,
            })
            .clone())
    }
}
