//! Order placement saga: request shape, outcome and step names.

use common::CustomerId;
use domain::{ConfirmationResponse, Order, OrderItem};
use serde::{Deserialize, Serialize};

/// The saga type identifier for order placement.
pub const SAGA_TYPE: &str = "CreateAndConfirmOrder";

/// Step name: Check the customer with the customer service.
pub const STEP_VALIDATE_CUSTOMER: &str = "validate_customer";

/// Step name: Reserve stock and persist the order.
pub const STEP_CREATE_ORDER: &str = "create_order";

/// Step name: Confirm the order under the caller's idempotency key.
pub const STEP_CONFIRM_ORDER: &str = "confirm_order";

/// Input of one saga run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    pub idempotency_key: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Result of a saga run that went through every step.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// The caller's correlation id, or a generated one.
    pub correlation_id: String,
    /// Customer record as returned by the customer service.
    pub customer: serde_json::Value,
    /// The order as created, before confirmation.
    pub order: Order,
    /// The confirmation response, possibly replayed.
    pub confirmation: ConfirmationResponse,
}
