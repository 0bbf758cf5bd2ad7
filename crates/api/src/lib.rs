//! HTTP API for the order service.
//!
//! Provides REST endpoints for order creation, idempotent confirmation and
//! the orchestrated create-and-confirm saga, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{ConfirmationService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use saga::{CustomerValidator, SagaCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, V>(state: Arc<AppState<S, V>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", get(routes::products::list::<S, V>))
        .route("/orders", post(routes::orders::create::<S, V>))
        .route("/orders/{id}", get(routes::orders::get::<S, V>))
        .route("/orders/{id}/confirm", post(routes::orders::confirm::<S, V>))
        .route("/sagas/orders", post(routes::sagas::place_order::<S, V>))
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

/// Creates the application state over a store and a customer validator.
///
/// Every service shares the same store so that orders created by one are
/// visible to the others.
pub fn create_state<S, V>(
    store: S,
    validator: V,
    idempotency_ttl: chrono::Duration,
) -> Arc<AppState<S, V>>
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    Arc::new(AppState {
        order_service: OrderService::new(store.clone()),
        confirmation_service: ConfirmationService::new(store.clone()).with_ttl(idempotency_ttl),
        saga_coordinator: SagaCoordinator::new(store, validator)
            .with_confirmation_ttl(idempotency_ttl),
    })
}
