//! Order endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{Address, CustomerId, Fields, Money, Order, OrderId, OrderStatus, ValidationError};
use messaging::EventPublisher;
use order_store::OrderRepository;
use serde::{Deserialize, Serialize};
use service::{
    CreateOrderCommand, CreateOrderItem, CreateOrderResponse, ListOrdersQuery, ListOrdersResponse,
    OrderService, RequestContext, UpdateOrderStatusCommand, UpdateOrderStatusResponse,
};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R, P> {
    pub service: OrderService<R, P>,
    /// Deadline applied to every request.
    pub request_timeout: Duration,
    /// Cancelled when the server shuts down; in-flight requests see it.
    pub shutdown: CancellationToken,
}

impl<R, P> AppState<R, P> {
    pub fn new(service: OrderService<R, P>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn context(&self) -> RequestContext {
        RequestContext::child_of(&self.shutdown).timeout(self.request_timeout)
    }
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub currency: Option<String>,
    pub metadata: Option<Fields>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    #[serde(alias = "product_name")]
    pub name: String,
    pub price: Money,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub new_status: String,
    pub reason: Option<String>,
}

/// Query string of `GET /api/v1/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub currency: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

// -- Conversions --

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid order id: {raw}")))
}

/// An empty customer id is left nil so the use case reports it as missing.
fn parse_customer_id(raw: &str) -> Result<CustomerId, ApiError> {
    if raw.trim().is_empty() {
        return Ok(CustomerId::nil());
    }
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid customer_id: {raw}")))
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ApiError::bad_request(format!("{name} must be an RFC 3339 timestamp")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl OrderItemRequest {
    fn into_item(self, index: usize) -> Result<CreateOrderItem, ApiError> {
        // Negative quantities become 0 and fail the positive-quantity check.
        let quantity = u32::try_from(self.quantity.max(0)).map_err(|_| {
            ValidationError::new(format!("item {index}: quantity {} is too large", self.quantity))
        })?;
        Ok(CreateOrderItem::new(
            self.product_id,
            self.name,
            self.price,
            quantity,
        ))
    }
}

impl TryFrom<CreateOrderRequest> for CreateOrderCommand {
    type Error = ApiError;

    fn try_from(req: CreateOrderRequest) -> Result<Self, Self::Error> {
        let items = req
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| item.into_item(i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CreateOrderCommand {
            customer_id: parse_customer_id(&req.customer_id)?,
            email: req.email,
            items,
            currency: non_empty(req.currency),
            metadata: req.metadata,
            shipping_address: req.shipping_address,
            billing_address: req.billing_address,
        })
    }
}

impl TryFrom<ListOrdersParams> for ListOrdersQuery {
    type Error = ApiError;

    fn try_from(params: ListOrdersParams) -> Result<Self, Self::Error> {
        let customer_id = match non_empty(params.customer_id) {
            Some(raw) => Some(parse_customer_id(&raw)?),
            None => None,
        };
        let status = match non_empty(params.status) {
            Some(raw) => Some(raw.parse::<OrderStatus>()?),
            None => None,
        };
        let min_amount = params.min_amount.map(Money::from_decimal).transpose()?;
        let max_amount = params.max_amount.map(Money::from_decimal).transpose()?;
        let date_from = match non_empty(params.date_from) {
            Some(raw) => Some(parse_timestamp("date_from", &raw)?),
            None => None,
        };
        let date_to = match non_empty(params.date_to) {
            Some(raw) => Some(parse_timestamp("date_to", &raw)?),
            None => None,
        };

        Ok(ListOrdersQuery {
            customer_id,
            status,
            email: non_empty(params.email),
            currency: non_empty(params.currency),
            min_amount,
            max_amount,
            date_from,
            date_to,
            limit: params.limit,
            offset: params.offset,
            sort_by: non_empty(params.sort_by),
            sort_order: non_empty(params.sort_order),
        })
    }
}

// -- Handlers --

/// POST /api/v1/orders: place a new order.
#[tracing::instrument(skip(state, body))]
pub async fn create<R, P>(
    State(state): State<Arc<AppState<R, P>>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError>
where
    R: OrderRepository + Clone + 'static,
    P: EventPublisher + Clone + 'static,
{
    let Json(req) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let command = CreateOrderCommand::try_from(req)?;
    let response = state
        .service
        .create_order(&state.context(), command)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/orders/{id}: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<R, P>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + Clone + 'static,
    P: EventPublisher + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.service.get_order(&state.context(), order_id).await?;
    Ok(Json(OrderResponse { order }))
}

/// PUT /api/v1/orders/{id}/status: move an order to a new status.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<R, P>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateOrderStatusResponse>, ApiError>
where
    R: OrderRepository + Clone + 'static,
    P: EventPublisher + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let Json(req) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let new_status: OrderStatus = req.new_status.parse()?;

    let mut command = UpdateOrderStatusCommand::new(order_id, new_status);
    if let Some(reason) = non_empty(req.reason) {
        command = command.reason(reason);
    }

    let response = state
        .service
        .update_order_status(&state.context(), command)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/orders: filtered, sorted, paged listing.
#[tracing::instrument(skip(state, params))]
pub async fn list<R, P>(
    State(state): State<Arc<AppState<R, P>>>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<ListOrdersResponse>, ApiError>
where
    R: OrderRepository + Clone + 'static,
    P: EventPublisher + Clone + 'static,
{
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let query = ListOrdersQuery::try_from(params)?;
    let response = state.service.list_orders(&state.context(), query).await?;
    Ok(Json(response))
}
