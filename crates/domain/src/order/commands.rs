//! Order commands.
//!
//! Commands carry caller input and know how to validate it. Validation
//! failures are reported before any storage is touched.

use common::{CustomerId, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// One requested line: a product and how many units of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub qty: i64,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(product_id: impl Into<ProductId>, qty: i64) -> Self {
        Self {
            product_id: product_id.into(),
            qty,
        }
    }
}

/// Command to create an order and reserve its stock.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(customer_id: impl Into<CustomerId>, items: Vec<OrderItem>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items,
        }
    }

    /// Checks the command shape: a valid customer and at least one item,
    /// each with a valid product and a positive quantity.
    pub fn validate(&self) -> Result<(), OrderError> {
        if !self.customer_id.is_valid() {
            return Err(OrderError::Validation(
                "customer_id must be a positive integer".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for (index, item) in self.items.iter().enumerate() {
            if !item.product_id.is_valid() {
                return Err(OrderError::Validation(format!(
                    "items[{index}].product_id must be a positive integer"
                )));
            }
            if item.qty <= 0 {
                return Err(OrderError::Validation(format!(
                    "items[{index}].qty must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// Command to confirm an order under a caller-supplied idempotency key.
#[derive(Debug, Clone)]
pub struct ConfirmOrder {
    pub order_id: OrderId,
    pub idempotency_key: String,
}

impl ConfirmOrder {
    /// Creates a new ConfirmOrder command.
    pub fn new(order_id: impl Into<OrderId>, idempotency_key: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            idempotency_key: idempotency_key.into(),
        }
    }

    /// Checks that the order id is valid and the key is non-empty.
    pub fn validate(&self) -> Result<(), OrderError> {
        if !self.order_id.is_valid() {
            return Err(OrderError::Validation(
                "order id must be a positive integer".to_string(),
            ));
        }
        if self.idempotency_key.trim().is_empty() {
            return Err(OrderError::Validation(
                "idempotency key is required".to_string(),
            ));
        }
        Ok(())
    }
}
