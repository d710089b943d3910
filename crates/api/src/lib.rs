//! HTTP API server for the order lifecycle service.
//!
//! Exposes the order use cases as REST endpoints under `/api/v1/orders`,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use messaging::EventPublisher;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R, P>(state: Arc<AppState<R, P>>, metrics_handle: PrometheusHandle) -> Router
where
    R: OrderRepository + Clone + 'static,
    P: EventPublisher + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let orders = Router::new()
        .route(
            "/orders",
            post(routes::orders::create::<R, P>).get(routes::orders::list::<R, P>),
        )
        .route("/orders/{id}", get(routes::orders::get::<R, P>))
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<R, P>),
        );

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", orders)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
