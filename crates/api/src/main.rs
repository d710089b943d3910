//! API server entry point.
//!
//! Runs the HTTP surface and the order event consumer side by side and
//! stops both on SIGINT or SIGTERM.

use std::sync::Arc;

use api::{AppState, Config, LogFormat};
use consumer::{
    InMemoryNotificationService, InMemoryPaymentService, InMemoryWarehouseService,
    OrderEventHandler, WorkerConfig, spawn_workers,
};
use messaging::{InMemoryTransport, TransportPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};
use service::OrderService;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Serves HTTP and consumes order events until `shutdown` fires.
async fn run<R>(
    config: Config,
    repository: R,
    transport: InMemoryTransport,
    metrics_handle: PrometheusHandle,
    shutdown: CancellationToken,
) where
    R: OrderRepository + Clone + 'static,
{
    let handler = Arc::new(OrderEventHandler::new(
        repository.clone(),
        InMemoryNotificationService::new(),
        InMemoryWarehouseService::new(),
        InMemoryPaymentService::new(),
    ));
    let worker_config =
        WorkerConfig::new(config.consumer_group.clone()).max_attempts(config.consumer_max_attempts);
    let workers = spawn_workers(&transport, handler, &worker_config, &shutdown);
    tracing::info!(
        partitions = transport.partition_count(),
        group = %config.consumer_group,
        "consumer workers started"
    );

    let service = OrderService::new(repository, TransportPublisher::new(transport));
    let state = Arc::new(
        AppState::new(service, config.request_timeout).with_shutdown(shutdown.clone()),
    );
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .expect("server error");

    shutdown.cancel();
    for worker in workers {
        if let Err(err) = worker.await {
            tracing::error!(error = %err, "consumer worker panicked");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Cancel everything on the first signal
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    // 4. Event transport shared by the publisher and the consumer
    let transport = InMemoryTransport::new(config.transport_partitions);

    // 5. Pick the repository and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let repository = PostgresOrderRepository::new(pool);
            repository
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL order repository");
            run(config, repository, transport, metrics_handle, shutdown).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory order repository");
            run(
                config,
                InMemoryOrderRepository::new(),
                transport,
                metrics_handle,
                shutdown,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
