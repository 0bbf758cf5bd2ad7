//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use saga::SagaError;
use saga::order_placement::{STEP_CONFIRM_ORDER, STEP_CREATE_ORDER, STEP_VALIDATE_CUSTOMER};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order engine error.
    Order(OrderError),
    /// Customer validation or order creation error.
    Saga(SagaError),
    /// Error from the orchestrated endpoint; the body names the failed step.
    SagaStep(SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Order(err) => (order_error_status(&err), error_body(err.to_string())),
            ApiError::Saga(err) => (saga_error_status(&err), error_body(err.to_string())),
            ApiError::SagaStep(err) => {
                let body = serde_json::json!({
                    "error": step_headline(&err),
                    "details": detail_message(&err),
                });
                (saga_error_status(&err), body)
            }
        };

        if status.is_server_error() {
            tracing::error!(%status, body = %body, "request failed");
        }

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

/// HTTP status for an order engine error.
pub fn order_error_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::Validation(_)
        | OrderError::ProductNotFound { .. }
        | OrderError::InsufficientStock { .. }
        | OrderError::AmountOutOfRange { .. }
        | OrderError::IllegalStateTransition { .. } => StatusCode::BAD_REQUEST,
        OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::IdempotencyKeyReused { .. } => StatusCode::CONFLICT,
        OrderError::UnknownStatus { .. }
        | OrderError::Store(_)
        | OrderError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTP status for a saga error.
pub fn saga_error_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::Validation(_) | SagaError::CustomerInvalid { .. } => StatusCode::BAD_REQUEST,
        SagaError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::CreateOrder(e) | SagaError::ConfirmOrder { source: e, .. } => {
            order_error_status(e)
        }
        SagaError::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn step_headline(err: &SagaError) -> &'static str {
    match err.step() {
        Some(STEP_VALIDATE_CUSTOMER) => "Customer validation failed",
        Some(STEP_CREATE_ORDER) => "Failed to create order",
        Some(STEP_CONFIRM_ORDER) => "Failed to confirm order",
        _ => "Invalid request",
    }
}

fn detail_message(err: &SagaError) -> String {
    match err.order_error() {
        Some(order_err) => order_err.to_string(),
        None => err.to_string(),
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
