//! Domain error types.

use common::{OrderId, ProductId};
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is malformed; nothing was touched.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A requested product does not exist.
    #[error("Product ID {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// A requested product does not have enough stock.
    #[error(
        "Insufficient stock for Product ID {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// A line subtotal or the order total does not fit in cents.
    #[error("Amount out of range for Product ID {product_id}")]
    AmountOutOfRange { product_id: ProductId },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order is in a status confirmation cannot move out of.
    #[error("Cannot confirm order {order_id} in status {status}")]
    IllegalStateTransition { order_id: OrderId, status: String },

    /// The idempotency key already answered for another order.
    #[error("Idempotency key {key} was already used for order {order_id}")]
    IdempotencyKeyReused { key: String, order_id: OrderId },

    /// A stored order carries a status this service doesn't know.
    #[error("Order {order_id} has unknown status {status}")]
    UnknownStatus { order_id: OrderId, status: String },

    /// An error occurred in the order store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrderError {
    /// Short machine-readable label, used for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::ProductNotFound { .. } => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::AmountOutOfRange { .. } => "amount_out_of_range",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::IllegalStateTransition { .. } => "illegal_state_transition",
            OrderError::IdempotencyKeyReused { .. } => "idempotency_key_reused",
            OrderError::UnknownStatus { .. } => "unknown_status",
            OrderError::Store(_) => "store",
            OrderError::Serialization(_) => "serialization",
        }
    }
}
