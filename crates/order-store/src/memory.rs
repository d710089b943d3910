use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use domain::{Order, OrderId, OrderStatus};
use tokio::sync::RwLock;

use crate::{
    OrderFilters, RepositoryError, Result, SortOrder, repository::OrderRepository,
};

/// In-memory order repository for testing.
///
/// This implementation stores orders in a map behind a single lock and
/// provides the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    fail_on_write: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Clears all orders.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
    }

    /// Makes every following write fail with a database error.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Number of read calls (`get_by_id`, `list`, `count`, `exists`) served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        self.check_writable()?;
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(RepositoryError::Duplicate(order.id()));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        self.record_read();
        self.orders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, order: &Order) -> Result<i64> {
        self.check_writable()?;
        let mut orders = self.orders.write().await;
        let stored = orders
            .get(&order.id())
            .ok_or(RepositoryError::NotFound(order.id()))?;

        if stored.version() != order.version() {
            return Err(RepositoryError::ConcurrencyConflict {
                order_id: order.id(),
                expected: order.version(),
                actual: stored.version(),
            });
        }

        // Header fields only; items and addresses stay as stored.
        let mut parts = stored.to_parts();
        let incoming = order.to_parts();
        parts.customer_id = incoming.customer_id;
        parts.email = incoming.email;
        parts.status = incoming.status;
        parts.total_amount = incoming.total_amount;
        parts.currency = incoming.currency;
        parts.metadata = incoming.metadata;
        parts.updated_at = incoming.updated_at;
        parts.version = stored.version() + 1;

        let updated = Order::from_parts(parts)?;
        let version = updated.version();
        orders.insert(updated.id(), updated);
        Ok(version)
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        self.check_writable()?;
        let mut orders = self.orders.write().await;
        let stored = orders.get(&id).ok_or(RepositoryError::NotFound(id))?;

        let mut parts = stored.to_parts();
        parts.status = status;
        parts.updated_at = Utc::now();
        parts.version += 1;
        orders.insert(id, Order::from_parts(parts)?);
        Ok(())
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        self.check_writable()?;
        let mut orders = self.orders.write().await;
        let stored = orders
            .get(&id)
            .filter(|order| order.status().is_cancellable())
            .ok_or(RepositoryError::NotFound(id))?;

        let mut parts = stored.to_parts();
        parts.status = OrderStatus::Cancelled;
        parts.updated_at = Utc::now();
        parts.version += 1;
        orders.insert(id, Order::from_parts(parts)?);
        Ok(())
    }

    async fn list(&self, filters: &OrderFilters) -> Result<Vec<Order>> {
        self.record_read();
        let orders = self.orders.read().await;
        let mut matching: Vec<&Order> = orders.values().filter(|o| filters.matches(o)).collect();

        matching.sort_by(|a, b| {
            let ordering = filters
                .sort_by
                .compare(a, b)
                .then_with(|| a.id().cmp(&b.id()));
            match filters.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let offset = usize::try_from(filters.effective_offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filters.effective_limit()).unwrap_or(0);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filters: &OrderFilters) -> Result<u64> {
        self.record_read();
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| filters.matches(o)).count() as u64)
    }

    async fn exists(&self, id: OrderId) -> Result<bool> {
        self.record_read();
        Ok(self.orders.read().await.contains_key(&id))
    }
}
