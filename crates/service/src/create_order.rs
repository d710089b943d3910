use std::time::Instant;

use domain::{Currency, EventType, Order};
use messaging::EventPublisher;
use order_store::OrderRepository;

use crate::publish::publish_after_commit;
use crate::{CreateOrderCommand, CreateOrderResponse, RequestContext, Result};

/// Places new orders.
///
/// The order is persisted first; the `order.created` event is published
/// afterwards on a best-effort basis.
#[derive(Clone)]
pub struct CreateOrder<R, P> {
    repository: R,
    publisher: P,
}

impl<R, P> CreateOrder<R, P>
where
    R: OrderRepository + Clone,
    P: EventPublisher + Clone,
{
    pub fn new(repository: R, publisher: P) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    #[tracing::instrument(
        skip(self, ctx, command),
        fields(customer_id = %command.customer_id, items = command.items.len())
    )]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        command: CreateOrderCommand,
    ) -> Result<CreateOrderResponse> {
        let start = Instant::now();
        let result = self.create(ctx, command).await;
        metrics::histogram!("use_case_duration_seconds", "use_case" => "create_order")
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        command: CreateOrderCommand,
    ) -> Result<CreateOrderResponse> {
        command.validate().inspect_err(|err| {
            tracing::warn!(error = %err, "Invalid create order request");
        })?;

        let mut order = Order::new(command.customer_id, command.email);
        if let Some(code) = command.currency.filter(|code| !code.is_empty()) {
            order.set_currency(Currency::new(code)?);
        }
        if let Some(metadata) = command.metadata {
            order.merge_metadata(metadata);
        }
        for item in command.items {
            order.add_item(item.product_id, item.name, item.price, item.quantity)?;
        }
        if let Some(address) = command.shipping_address {
            order.set_shipping_address(address);
        }
        if let Some(address) = command.billing_address {
            order.set_billing_address(address);
        }

        order.validate().inspect_err(|err| {
            tracing::warn!(order_id = %order.id(), error = %err, "Order validation failed");
        })?;

        ctx.race(self.repository.create(&order))
            .await?
            .inspect_err(|err| {
                tracing::error!(order_id = %order.id(), error = %err, "Failed to save order");
            })?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            total_amount = %order.total_amount(),
            currency = %order.currency(),
            "Order created"
        );

        let event = order.to_event(EventType::Created);
        publish_after_commit(&self.publisher, ctx, &event).await;

        Ok(CreateOrderResponse {
            order,
            message: "Order created successfully".to_string(),
        })
    }
}
