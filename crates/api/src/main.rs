//! API server entry point.

use api::config::Config;
use common::{Money, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryStore, OrderStore, PostgresStore, Product};
use saga::HttpCustomerValidator;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
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

/// Small catalog for running without a database.
async fn demo_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let catalog = [
        (1, "Laptop Pro 14", 129_999, 10),
        (2, "Wireless Mouse", 2_499, 100),
        (3, "Mechanical Keyboard", 8_950, 25),
    ];
    for (id, name, price_cents, stock) in catalog {
        store
            .insert_product(Product::new(
                ProductId::new(id),
                name,
                Money::from_cents(price_cents),
                stock,
            ))
            .await;
    }
    store
}

async fn serve<S>(store: S, config: &Config, metrics_handle: PrometheusHandle)
where
    S: OrderStore + Clone + 'static,
{
    if config.service_token.is_empty() {
        tracing::warn!("SERVICE_TOKEN is not set, customer validation calls carry an empty token");
    }
    let validator = HttpCustomerValidator::new(
        config.customers_api_url.clone(),
        config.service_token.clone(),
        config.customer_validation_timeout,
    )
    .expect("failed to build customer service client");

    let state = api::create_state(store, validator, config.idempotency_ttl());
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, customers_api = %config.customers_api_url, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!(
                max_connections = config.database_max_connections,
                "using PostgreSQL order store"
            );
            serve(store, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory store with a demo catalog");
            serve(demo_store().await, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
