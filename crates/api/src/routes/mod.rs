//! HTTP route handlers and the state they share.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod sagas;

use domain::{ConfirmationService, OrderService};
use order_store::OrderStore;
use saga::{CustomerValidator, SagaCoordinator};

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore, V: CustomerValidator> {
    pub order_service: OrderService<S>,
    pub confirmation_service: ConfirmationService<S>,
    pub saga_coordinator: SagaCoordinator<S, V>,
}
