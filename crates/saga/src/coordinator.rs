//! Saga coordinator for the create-then-confirm order flow.

use common::CustomerId;
use domain::{
    ConfirmOrder, ConfirmationService, CreateOrder, Order, OrderError, OrderItem, OrderService,
};
use order_store::OrderStore;

use crate::error::SagaError;
use crate::order_placement::{
    self, PlaceOrder, PlacedOrder, STEP_CONFIRM_ORDER, STEP_CREATE_ORDER, STEP_VALIDATE_CUSTOMER,
};
use crate::services::customer::{CustomerCheck, CustomerValidator};

/// Orchestrates order placement across the customer service and the local
/// order engines.
///
/// Steps run strictly in sequence: validate customer, create order,
/// confirm order. Each step commits on its own. There is no compensation:
/// if confirmation fails the order stays CREATED and the caller retries
/// confirmation with the same idempotency key.
#[derive(Clone)]
pub struct SagaCoordinator<S, V>
where
    S: OrderStore,
    V: CustomerValidator,
{
    orders: OrderService<S>,
    confirmations: ConfirmationService<S>,
    validator: V,
}

impl<S, V> SagaCoordinator<S, V>
where
    S: OrderStore + Clone,
    V: CustomerValidator,
{
    /// Creates a new saga coordinator.
    pub fn new(store: S, validator: V) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            confirmations: ConfirmationService::new(store),
            validator,
        }
    }

    /// Sets how long confirmation idempotency records stay valid.
    pub fn with_confirmation_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.confirmations = self.confirmations.with_ttl(ttl);
        self
    }

    /// The order engine used by the create step.
    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    /// The confirmation engine used by the confirm step.
    pub fn confirmations(&self) -> &ConfirmationService<S> {
        &self.confirmations
    }

    /// Runs the whole saga for one request.
    #[tracing::instrument(
        skip(self, request),
        fields(
            saga_type = order_placement::SAGA_TYPE,
            customer_id = %request.customer_id,
            idempotency_key = %request.idempotency_key,
            correlation_id = tracing::field::Empty
        )
    )]
    pub async fn execute(&self, request: PlaceOrder) -> Result<PlacedOrder, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let correlation_id = request
            .correlation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::Span::current().record("correlation_id", correlation_id.as_str());

        let result = self.run_steps(request, correlation_id).await;

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        match &result {
            Ok(placed) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(order_id = %placed.order.id, "saga completed successfully");
            }
            Err(e) => record_failure(e),
        }
        result
    }

    async fn run_steps(
        &self,
        request: PlaceOrder,
        correlation_id: String,
    ) -> Result<PlacedOrder, SagaError> {
        if request.idempotency_key.trim().is_empty() {
            return Err(SagaError::Validation(
                "idempotency_key is required".to_string(),
            ));
        }
        let cmd = CreateOrder::new(request.customer_id, request.items);
        cmd.validate()
            .map_err(|e| SagaError::Validation(strip_validation_prefix(e)))?;

        let (customer, order) = self.validate_and_create(cmd).await?;

        tracing::info!(step = STEP_CONFIRM_ORDER, order_id = %order.id, "saga step started");
        let key = request.idempotency_key;
        let confirmation = self
            .confirmations
            .confirm_order(ConfirmOrder::new(order.id, key.clone()))
            .await
            .and_then(|c| c.response())
            .and_then(|response| {
                // A replayed key may answer for an earlier order; never
                // report that as this order's confirmation.
                if response.order_id == order.id {
                    Ok(response)
                } else {
                    Err(OrderError::IdempotencyKeyReused {
                        key,
                        order_id: response.order_id,
                    })
                }
            })
            .map_err(|source| SagaError::ConfirmOrder {
                order_id: order.id,
                source,
            })?;

        Ok(PlacedOrder {
            correlation_id,
            customer,
            order,
            confirmation,
        })
    }

    /// Runs the first two steps: validate the customer, then create the
    /// order. Nothing is reserved for a customer that wasn't validated.
    #[tracing::instrument(skip(self, items), fields(customer_id = %customer_id))]
    pub async fn create_validated_order(
        &self,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
    ) -> Result<Order, SagaError> {
        let cmd = CreateOrder::new(customer_id, items);
        cmd.validate()
            .map_err(|e| SagaError::Validation(strip_validation_prefix(e)))?;

        self.validate_and_create(cmd)
            .await
            .map(|(_, order)| order)
            .inspect_err(|e| {
                if let Some(step) = e.step() {
                    tracing::info!(step, error = %e, "order placement rejected");
                }
            })
    }

    async fn validate_and_create(
        &self,
        cmd: CreateOrder,
    ) -> Result<(serde_json::Value, Order), SagaError> {
        tracing::info!(step = STEP_VALIDATE_CUSTOMER, "saga step started");
        let customer = match self.validator.validate(cmd.customer_id).await? {
            CustomerCheck::Valid(customer) => customer,
            CustomerCheck::Invalid { status } => {
                return Err(SagaError::CustomerInvalid {
                    customer_id: cmd.customer_id,
                    status,
                });
            }
        };

        tracing::info!(step = STEP_CREATE_ORDER, "saga step started");
        let order = self
            .orders
            .create_order(cmd)
            .await
            .map_err(SagaError::CreateOrder)?;

        Ok((customer, order))
    }
}

fn strip_validation_prefix(e: OrderError) -> String {
    match e {
        OrderError::Validation(msg) => msg,
        other => other.to_string(),
    }
}

fn record_failure(e: &SagaError) {
    let step = e.step().unwrap_or("request");
    metrics::counter!("saga_failed", "step" => step).increment(1);
    if step == STEP_CONFIRM_ORDER {
        tracing::warn!(step, error = %e, "saga failed after order creation, order left CREATED");
    } else {
        tracing::warn!(step, error = %e, "saga failed");
    }
}
