use std::time::Instant;

use domain::{EventType, ValidationError};
use messaging::EventPublisher;
use order_store::OrderRepository;

use crate::publish::publish_after_commit;
use crate::{RequestContext, Result, UpdateOrderStatusCommand, UpdateOrderStatusResponse};

/// Metadata key the optional change reason is stored under.
pub const STATUS_CHANGE_REASON_KEY: &str = "status_change_reason";

/// Moves orders through the status state machine.
#[derive(Clone)]
pub struct UpdateOrderStatus<R, P> {
    repository: R,
    publisher: P,
}

impl<R, P> UpdateOrderStatus<R, P>
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
        fields(order_id = %command.order_id, new_status = %command.new_status)
    )]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        command: UpdateOrderStatusCommand,
    ) -> Result<UpdateOrderStatusResponse> {
        let start = Instant::now();
        let result = self.update(ctx, command).await;
        metrics::histogram!("use_case_duration_seconds", "use_case" => "update_order_status")
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        command: UpdateOrderStatusCommand,
    ) -> Result<UpdateOrderStatusResponse> {
        if command.order_id.is_nil() {
            return Err(ValidationError::new("order_id is required").into());
        }

        let mut order = ctx
            .race(self.repository.get_by_id(command.order_id))
            .await??;
        let old_status = order.status();
        let new_status = command.new_status;

        order.transition(new_status).inspect_err(|err| {
            tracing::warn!(%old_status, error = %err, "Status update rejected");
        })?;

        let reason = command.reason.unwrap_or_default();
        if !reason.is_empty() {
            order.set_metadata(STATUS_CHANGE_REASON_KEY, reason.as_str());
        }

        let version = ctx
            .race(self.repository.update(&order))
            .await?
            .inspect_err(|err| {
                tracing::error!(error = %err, "Failed to save order status");
            })?;
        order.set_version(version);

        metrics::counter!("order_status_updates_total", "status" => new_status.as_str())
            .increment(1);
        tracing::info!(%old_status, %new_status, reason = %reason, "Order status updated");

        let event = order
            .to_event(EventType::for_status(new_status))
            .with_data("old_status", old_status.as_str())
            .with_data("change_reason", reason);
        publish_after_commit(&self.publisher, ctx, &event).await;

        Ok(UpdateOrderStatusResponse {
            order,
            message: format!("Order status updated from {old_status} to {new_status}"),
            old_status,
            new_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use domain::{CustomerId, FieldValue, Money, Order, OrderId, OrderStatus};
    use messaging::InMemoryEventPublisher;
    use order_store::InMemoryOrderRepository;

    async fn setup() -> (
        UpdateOrderStatus<InMemoryOrderRepository, InMemoryEventPublisher>,
        InMemoryOrderRepository,
        InMemoryEventPublisher,
        OrderId,
    ) {
        let repository = InMemoryOrderRepository::new();
        let publisher = InMemoryEventPublisher::new();
        let mut order = Order::new(CustomerId::new(), "buyer@example.com");
        order
            .add_item("SKU-1", "Widget", Money::from_cents(2500), 1)
            .unwrap();
        repository.create(&order).await.unwrap();
        (
            UpdateOrderStatus::new(repository.clone(), publisher.clone()),
            repository,
            publisher,
            order.id(),
        )
    }

    #[tokio::test]
    async fn confirms_order_with_reason() {
        let (use_case, repository, publisher, id) = setup().await;

        let response = use_case
            .execute(
                &RequestContext::new(),
                UpdateOrderStatusCommand::new(id, OrderStatus::Confirmed).reason("payment ok"),
            )
            .await
            .unwrap();

        assert_eq!(response.old_status, OrderStatus::Pending);
        assert_eq!(response.new_status, OrderStatus::Confirmed);
        assert_eq!(
            response.message,
            "Order status updated from pending to confirmed"
        );
        assert_eq!(response.order.version(), 2);

        let stored = repository.get_by_id(id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Confirmed);
        assert_eq!(
            stored.metadata()[STATUS_CHANGE_REASON_KEY],
            FieldValue::from("payment ok")
        );

        let events = publisher.published();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), EventType::Confirmed);
        assert_eq!(events[0].data_str("old_status"), Some("pending"));
        assert_eq!(events[0].data_str("change_reason"), Some("payment ok"));
    }

    #[tokio::test]
    async fn processing_emits_generic_status_event_with_empty_reason() {
        let (use_case, _, publisher, id) = setup().await;
        let ctx = RequestContext::new();

        use_case
            .execute(&ctx, UpdateOrderStatusCommand::new(id, OrderStatus::Confirmed))
            .await
            .unwrap();
        use_case
            .execute(&ctx, UpdateOrderStatusCommand::new(id, OrderStatus::Processing))
            .await
            .unwrap();

        let events = publisher.published();
        assert_eq!(events[1].event_type(), EventType::StatusChanged);
        assert_eq!(events[1].data_str("old_status"), Some("confirmed"));
        assert_eq!(events[1].data_str("change_reason"), Some(""));
    }

    #[tokio::test]
    async fn invalid_transition_is_not_persisted() {
        let (use_case, repository, publisher, id) = setup().await;

        let err = use_case
            .execute(
                &RequestContext::new(),
                UpdateOrderStatusCommand::new(id, OrderStatus::Shipped),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            }
        ));
        let stored = repository.get_by_id(id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Pending);
        assert_eq!(stored.version(), 1);
        assert_eq!(publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found_and_publishes_nothing() {
        let (use_case, _, publisher, _) = setup().await;
        let missing = OrderId::new();

        let err = use_case
            .execute(
                &RequestContext::new(),
                UpdateOrderStatusCommand::new(missing, OrderStatus::Confirmed),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::OrderNotFound(id) if id == missing));
        assert_eq!(publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn nil_order_id_is_a_validation_error() {
        let (use_case, _, _, _) = setup().await;
        let err = use_case
            .execute(
                &RequestContext::new(),
                UpdateOrderStatusCommand::new(OrderId::nil(), OrderStatus::Confirmed),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn publish_failure_keeps_the_update() {
        let (use_case, repository, publisher, id) = setup().await;
        publisher.set_fail_on_publish(true);

        use_case
            .execute(
                &RequestContext::new(),
                UpdateOrderStatusCommand::new(id, OrderStatus::Cancelled),
            )
            .await
            .unwrap();

        assert_eq!(
            repository.get_by_id(id).await.unwrap().status(),
            OrderStatus::Cancelled
        );
    }
}
