//! Saga error types.

use common::{CustomerId, OrderId};
use domain::OrderError;
use thiserror::Error;

use crate::order_placement::{STEP_CONFIRM_ORDER, STEP_CREATE_ORDER, STEP_VALIDATE_CUSTOMER};

/// Errors that can occur while running the order saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request is malformed; nothing was called or touched.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The customer service answered but did not vouch for the customer.
    #[error("Invalid Customer ID {customer_id}")]
    CustomerInvalid {
        customer_id: CustomerId,
        /// HTTP status returned by the customer service, if any.
        status: Option<u16>,
    },

    /// The customer service could not be reached in time.
    #[error("Customer service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Order creation failed; nothing was persisted.
    #[error("Failed to create order: {0}")]
    CreateOrder(#[source] OrderError),

    /// Confirmation failed; the order stays in status CREATED.
    #[error("Failed to confirm order {order_id}: {source}")]
    ConfirmOrder {
        order_id: OrderId,
        #[source]
        source: OrderError,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl SagaError {
    /// The saga step this error belongs to, if any.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            SagaError::Validation(_) | SagaError::HttpClient(_) => None,
            SagaError::CustomerInvalid { .. } | SagaError::ServiceUnavailable(_) => {
                Some(STEP_VALIDATE_CUSTOMER)
            }
            SagaError::CreateOrder(_) => Some(STEP_CREATE_ORDER),
            SagaError::ConfirmOrder { .. } => Some(STEP_CONFIRM_ORDER),
        }
    }

    /// The underlying order error for the create and confirm steps.
    pub fn order_error(&self) -> Option<&OrderError> {
        match self {
            SagaError::CreateOrder(e) | SagaError::ConfirmOrder { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_labels() {
        let invalid = SagaError::CustomerInvalid {
            customer_id: CustomerId::new(999),
            status: Some(404),
        };
        assert_eq!(invalid.step(), Some("validate_customer"));
        assert_eq!(invalid.to_string(), "Invalid Customer ID 999");

        let confirm = SagaError::ConfirmOrder {
            order_id: OrderId::new(3),
            source: OrderError::OrderNotFound(OrderId::new(3)),
        };
        assert_eq!(confirm.step(), Some("confirm_order"));
        assert!(confirm.order_error().is_some());

        assert_eq!(SagaError::Validation("x".into()).step(), None);
    }
}
