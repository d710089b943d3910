use domain::{Order, OrderId};
use messaging::EventPublisher;
use order_store::OrderRepository;

use crate::{
    CreateOrder, CreateOrderCommand, CreateOrderResponse, GetOrder, ListOrders, ListOrdersQuery,
    ListOrdersResponse, RequestContext, Result, UpdateOrderStatus, UpdateOrderStatusCommand,
    UpdateOrderStatusResponse,
};

/// Service for order operations.
///
/// Bundles the order use cases over one repository and one publisher.
#[derive(Clone)]
pub struct OrderService<R, P> {
    create: CreateOrder<R, P>,
    update_status: UpdateOrderStatus<R, P>,
    get: GetOrder<R>,
    list: ListOrders<R>,
}

impl<R, P> OrderService<R, P>
where
    R: OrderRepository + Clone,
    P: EventPublisher + Clone,
{
    /// Creates a new order service.
    pub fn new(repository: R, publisher: P) -> Self {
        Self {
            create: CreateOrder::new(repository.clone(), publisher.clone()),
            update_status: UpdateOrderStatus::new(repository.clone(), publisher),
            get: GetOrder::new(repository.clone()),
            list: ListOrders::new(repository),
        }
    }

    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        command: CreateOrderCommand,
    ) -> Result<CreateOrderResponse> {
        self.create.execute(ctx, command).await
    }

    pub async fn update_order_status(
        &self,
        ctx: &RequestContext,
        command: UpdateOrderStatusCommand,
    ) -> Result<UpdateOrderStatusResponse> {
        self.update_status.execute(ctx, command).await
    }

    pub async fn get_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        self.get.execute(ctx, order_id).await
    }

    pub async fn list_orders(
        &self,
        ctx: &RequestContext,
        query: ListOrdersQuery,
    ) -> Result<ListOrdersResponse> {
        self.list.execute(ctx, query).await
    }
}
