use async_trait::async_trait;
use domain::{CustomerId, Order, OrderId, OrderStatus};

use crate::{OrderFilters, Result};

/// Core trait for order storage.
///
/// All implementations must be thread-safe (Send + Sync). Each call is
/// atomic with respect to other calls on the same order.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order with its items and addresses as one unit.
    ///
    /// Fails with `Duplicate` if the id is already taken.
    async fn create(&self, order: &Order) -> Result<()>;

    /// Loads a full order by id.
    async fn get_by_id(&self, id: OrderId) -> Result<Order>;

    /// Overwrites the header fields of an existing order.
    ///
    /// The write only applies if the stored version still equals
    /// `order.version()`; otherwise `ConcurrencyConflict` is returned.
    /// Returns the new version.
    async fn update(&self, order: &Order) -> Result<i64>;

    /// Sets only the status and update timestamp.
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Logical delete: cancels the order unless it is delivered, refunded
    /// or already cancelled. Fails with `NotFound` when nothing matched.
    async fn delete(&self, id: OrderId) -> Result<()>;

    /// Lists full orders matching the filters, sorted and paginated.
    async fn list(&self, filters: &OrderFilters) -> Result<Vec<Order>>;

    /// Counts orders matching the filters, ignoring pagination.
    async fn count(&self, filters: &OrderFilters) -> Result<u64>;

    /// Returns true if an order with this id exists.
    async fn exists(&self, id: OrderId) -> Result<bool>;
}

/// Extension trait providing convenience queries.
#[async_trait]
pub trait OrderRepositoryExt: OrderRepository {
    /// Lists a customer's orders, newest first.
    async fn find_by_customer(
        &self,
        customer_id: CustomerId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>> {
        let filters = OrderFilters::for_customer(customer_id)
            .limit(limit)
            .offset(offset);
        self.list(&filters).await
    }

    /// Lists orders in a given status, newest first.
    async fn find_by_status(
        &self,
        status: OrderStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>> {
        let filters = OrderFilters::for_status(status).limit(limit).offset(offset);
        self.list(&filters).await
    }
}

// Blanket implementation for all OrderRepository implementations
impl<T: OrderRepository + ?Sized> OrderRepositoryExt for T {}
