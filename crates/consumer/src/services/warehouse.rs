//! Warehouse service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::OrderId;

use crate::error::{ConsumerError, Result};

/// Result of a stock reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationResult {
    pub reservation_id: String,
    pub item_count: u64,
}

/// Reserves and releases stock for orders.
#[async_trait]
pub trait WarehouseService: Send + Sync {
    /// Reserves stock for an order. Reserving the same order again returns
    /// the existing reservation.
    async fn reserve(&self, order_id: OrderId, item_count: u64) -> Result<ReservationResult>;

    /// Releases an order's reservation. Returns false if it held none.
    async fn release(&self, order_id: OrderId) -> Result<bool>;
}

#[derive(Debug, Default)]
struct InMemoryWarehouseState {
    reservations: HashMap<OrderId, ReservationResult>,
    next_id: u32,
    fail_on_reserve: bool,
}

/// In-memory warehouse service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouseService {
    state: Arc<RwLock<InMemoryWarehouseState>>,
}

impl InMemoryWarehouseService {
    /// Creates a new in-memory warehouse service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail every following reserve call.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_reserve = fail;
    }

    /// Returns the number of active reservations.
    pub fn reservation_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .reservations
            .len()
    }

    /// Returns the active reservation for an order.
    pub fn reservation_for(&self, order_id: OrderId) -> Option<ReservationResult> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .reservations
            .get(&order_id)
            .cloned()
    }
}

#[async_trait]
impl WarehouseService for InMemoryWarehouseService {
    async fn reserve(&self, order_id: OrderId, item_count: u64) -> Result<ReservationResult> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_reserve {
            return Err(ConsumerError::side_effect("warehouse", "Insufficient stock"));
        }
        if let Some(existing) = state.reservations.get(&order_id) {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let reservation = ReservationResult {
            reservation_id: format!("RES-{:04}", state.next_id),
            item_count,
        };
        state.reservations.insert(order_id, reservation.clone());
        Ok(reservation)
    }

    async fn release(&self, order_id: OrderId) -> Result<bool> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Ok(state.reservations.remove(&order_id).is_some())
    }
}
