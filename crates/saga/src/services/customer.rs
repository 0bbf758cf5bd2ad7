//! Customer validator trait, HTTP client and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::CustomerId;

use crate::error::SagaError;

/// Answer of the customer service for one customer id.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerCheck {
    /// The customer exists. Carries the record returned by the service.
    Valid(serde_json::Value),
    /// The service answered with a non-success status.
    Invalid { status: Option<u16> },
}

impl CustomerCheck {
    /// Returns true if the customer was vouched for.
    pub fn is_valid(&self) -> bool {
        matches!(self, CustomerCheck::Valid(_))
    }
}

/// Trait for checking that a customer exists.
///
/// Transport failures and timeouts must be reported as
/// [`SagaError::ServiceUnavailable`], never as an invalid customer.
#[async_trait]
pub trait CustomerValidator: Send + Sync {
    /// Checks one customer id.
    async fn validate(&self, customer_id: CustomerId) -> Result<CustomerCheck, SagaError>;
}

/// Customer validator backed by the customer service's internal endpoint.
///
/// Calls `GET {base_url}/internal/customers/{id}` with the shared service
/// token as bearer credential.
#[derive(Debug, Clone)]
pub struct HttpCustomerValidator {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpCustomerValidator {
    /// Creates a validator whose every call is bounded by `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SagaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn customer_url(&self, customer_id: CustomerId) -> String {
        format!("{}/internal/customers/{}", self.base_url, customer_id)
    }
}

#[async_trait]
impl CustomerValidator for HttpCustomerValidator {
    #[tracing::instrument(skip(self), fields(customer_id = %customer_id))]
    async fn validate(&self, customer_id: CustomerId) -> Result<CustomerCheck, SagaError> {
        let resp = self
            .client
            .get(self.customer_url(customer_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    e.to_string()
                };
                tracing::warn!(%reason, "Customer service call failed");
                metrics::counter!("customer_validations_total", "result" => "unavailable")
                    .increment(1);
                SagaError::ServiceUnavailable(reason)
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::info!(status = status.as_u16(), "Customer rejected by customer service");
            metrics::counter!("customer_validations_total", "result" => "invalid").increment(1);
            return Ok(CustomerCheck::Invalid {
                status: Some(status.as_u16()),
            });
        }

        let customer = match resp.json::<serde_json::Value>().await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Customer body is not JSON, keeping the id only");
                serde_json::json!({ "id": customer_id })
            }
        };

        metrics::counter!("customer_validations_total", "result" => "valid").increment(1);
        Ok(CustomerCheck::Valid(customer))
    }
}

#[derive(Debug, Default)]
struct InMemoryCustomerState {
    customers: HashMap<CustomerId, serde_json::Value>,
    unavailable: bool,
    calls: usize,
}

/// In-memory customer validator for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerValidator {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerValidator {
    /// Creates a validator that knows no customers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a customer with the record to return for it.
    pub fn add_customer(&self, customer_id: CustomerId, record: serde_json::Value) {
        self.state
            .write()
            .unwrap()
            .customers
            .insert(customer_id, record);
    }

    /// Makes every following call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns how many validations were requested.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls
    }
}

#[async_trait]
impl CustomerValidator for InMemoryCustomerValidator {
    async fn validate(&self, customer_id: CustomerId) -> Result<CustomerCheck, SagaError> {
        let mut state = self.state.write().unwrap();
        state.calls += 1;

        if state.unavailable {
            return Err(SagaError::ServiceUnavailable(
                "customer service is down".to_string(),
            ));
        }

        Ok(match state.customers.get(&customer_id) {
            Some(record) => CustomerCheck::Valid(record.clone()),
            None => CustomerCheck::Invalid { status: Some(404) },
        })
    }
}
