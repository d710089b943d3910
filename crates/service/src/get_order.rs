use std::time::Instant;

use domain::{Order, OrderId, ValidationError};
use order_store::OrderRepository;

use crate::{RequestContext, Result};

/// Loads a single order.
#[derive(Clone)]
pub struct GetOrder<R> {
    repository: R,
}

impl<R> GetOrder<R>
where
    R: OrderRepository + Clone,
{
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn execute(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        let start = Instant::now();
        let result = self.load(ctx, order_id).await;
        metrics::histogram!("use_case_duration_seconds", "use_case" => "get_order")
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn load(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        if order_id.is_nil() {
            return Err(ValidationError::new("order_id is required").into());
        }
        let order = ctx.race(self.repository.get_by_id(order_id)).await??;
        tracing::debug!(status = %order.status(), "Order retrieved");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use domain::{CustomerId, Money};
    use order_store::InMemoryOrderRepository;

    #[tokio::test]
    async fn returns_stored_order() {
        let repository = InMemoryOrderRepository::new();
        let mut order = Order::new(CustomerId::new(), "buyer@example.com");
        order
            .add_item("SKU-1", "Widget", Money::from_cents(100), 1)
            .unwrap();
        repository.create(&order).await.unwrap();

        let loaded = GetOrder::new(repository)
            .execute(&RequestContext::new(), order.id())
            .await
            .unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let use_case = GetOrder::new(InMemoryOrderRepository::new());
        let err = use_case
            .execute(&RequestContext::new(), OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OrderNotFound(_)));
        assert!(!err.is_retryable());
    }
}
