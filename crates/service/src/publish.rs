use domain::OrderEvent;
use messaging::EventPublisher;

use crate::RequestContext;

/// Publishes `event` after its order change has been persisted.
///
/// The change is already durable, so only the deadline bounds the publish;
/// cancelling the request no longer stops it. A failed or timed out publish
/// is logged and counted but never returned to the caller.
pub(crate) async fn publish_after_commit<P>(
    publisher: &P,
    ctx: &RequestContext,
    event: &OrderEvent,
) where
    P: EventPublisher + ?Sized,
{
    let outcome = match ctx.deadline_only().race(publisher.publish(event)).await {
        Ok(result) => result.map_err(|err| (err.kind(), err.to_string())),
        Err(interrupted) => Err(("INTERRUPTED", interrupted.to_string())),
    };

    match outcome {
        Ok(()) => {
            tracing::info!(
                order_id = %event.order_id(),
                event_type = %event.event_type(),
                event_id = %event.event_id(),
                "Order event published"
            );
        }
        Err((kind, error)) => {
            metrics::counter!(
                "order_event_publish_failures_total",
                "event_type" => event.event_type().as_str()
            )
            .increment(1);
            tracing::error!(
                order_id = %event.order_id(),
                event_type = %event.event_type(),
                event_id = %event.event_id(),
                error_kind = kind,
                error = %error,
                "Failed to publish order event"
            );
        }
    }
}
