use std::time::Instant;

use order_store::OrderRepository;

use crate::{ListOrdersQuery, ListOrdersResponse, RequestContext, Result};

/// Lists orders page by page.
#[derive(Clone)]
pub struct ListOrders<R> {
    repository: R,
}

impl<R> ListOrders<R>
where
    R: OrderRepository + Clone,
{
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        query: ListOrdersQuery,
    ) -> Result<ListOrdersResponse> {
        let start = Instant::now();
        let result = self.list(ctx, query).await;
        metrics::histogram!("use_case_duration_seconds", "use_case" => "list_orders")
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        query: ListOrdersQuery,
    ) -> Result<ListOrdersResponse> {
        let filters = query.to_filters().inspect_err(|err| {
            tracing::warn!(error = %err, "Invalid list orders request");
        })?;

        let orders = ctx.race(self.repository.list(&filters)).await??;
        let total_count = ctx.race(self.repository.count(&filters)).await??;

        tracing::debug!(count = orders.len(), total_count, "Orders listed");
        Ok(ListOrdersResponse {
            orders,
            total_count,
            limit: filters.effective_limit(),
            offset: filters.effective_offset(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use domain::{CustomerId, Money, Order};
    use order_store::InMemoryOrderRepository;

    async fn seeded(customer: CustomerId, prices: &[i64]) -> InMemoryOrderRepository {
        let repository = InMemoryOrderRepository::new();
        for &cents in prices {
            let mut order = Order::new(customer, "buyer@example.com");
            order
                .add_item("SKU-1", "Widget", Money::from_cents(cents), 1)
                .unwrap();
            repository.create(&order).await.unwrap();
        }
        repository
    }

    #[tokio::test]
    async fn pages_and_counts() {
        let customer = CustomerId::new();
        let repository = seeded(customer, &[100, 200, 300, 400, 500]).await;
        let use_case = ListOrders::new(repository);

        let response = use_case
            .execute(
                &RequestContext::new(),
                ListOrdersQuery {
                    customer_id: Some(customer),
                    sort_by: Some("total_amount".into()),
                    sort_order: Some("asc".into()),
                    limit: Some(2),
                    offset: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let totals: Vec<i64> = response
            .orders
            .iter()
            .map(|o| o.total_amount().cents())
            .collect();
        assert_eq!(totals, vec![200, 300]);
        assert_eq!(response.total_count, 5);
        assert_eq!(response.limit, 2);
        assert_eq!(response.offset, 1);
    }

    #[tokio::test]
    async fn amount_range_filters_inclusively() {
        let repository = seeded(CustomerId::new(), &[100, 200, 300]).await;
        let response = ListOrders::new(repository)
            .execute(
                &RequestContext::new(),
                ListOrdersQuery {
                    min_amount: Some(Money::from_cents(200)),
                    max_amount: Some(Money::from_cents(300)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.total_count, 2);
        assert_eq!(response.limit, 20);
    }

    #[tokio::test]
    async fn inverted_amount_range_never_reaches_the_repository() {
        let repository = seeded(CustomerId::new(), &[100]).await;
        let reads_before = repository.read_count();
        let use_case = ListOrders::new(repository.clone());

        let err = use_case
            .execute(
                &RequestContext::new(),
                ListOrdersQuery {
                    min_amount: Some(Money::from_cents(500)),
                    max_amount: Some(Money::from_cents(100)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(repository.read_count(), reads_before);
    }
}
