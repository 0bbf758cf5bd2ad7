//! Orchestrated create-and-confirm endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use order_store::OrderStore;
use saga::{CustomerValidator, PlaceOrder, PlacedOrder};
use serde::Serialize;

use super::AppState;
use super::orders::OrderLineResponse;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct PlacedOrderResponse {
    pub success: bool,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub data: PlacedOrderData,
}

#[derive(Serialize)]
pub struct PlacedOrderData {
    pub customer: serde_json::Value,
    pub order: PlacedOrderSummary,
}

#[derive(Serialize)]
pub struct PlacedOrderSummary {
    pub id: i64,
    pub status: String,
    pub total_cents: i64,
    pub items: Vec<OrderLineResponse>,
}

impl From<PlacedOrder> for PlacedOrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        Self {
            success: true,
            correlation_id: placed.correlation_id,
            data: PlacedOrderData {
                customer: placed.customer,
                order: PlacedOrderSummary {
                    id: placed.order.id.as_i64(),
                    status: placed.confirmation.status.to_string(),
                    total_cents: placed.order.total.cents(),
                    items: placed
                        .order
                        .items
                        .iter()
                        .map(OrderLineResponse::from)
                        .collect(),
                },
            },
        }
    }
}

/// POST /sagas/orders: validate the customer, create the order and confirm
/// it, in that order.
///
/// A failure at the confirm step leaves the order CREATED; the caller can
/// finish it with `POST /orders/{id}/confirm` and the same key.
#[tracing::instrument(skip(state, payload))]
pub async fn place_order<S, V>(
    State(state): State<Arc<AppState<S, V>>>,
    payload: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<PlacedOrderResponse>), ApiError>
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    let Json(request) = payload.map_err(|rejection| {
        ApiError::BadRequest(format!(
            "Missing required fields: customer_id, items, idempotency_key ({})",
            rejection.body_text()
        ))
    })?;

    let placed = state
        .saga_coordinator
        .execute(request)
        .await
        .map_err(ApiError::SagaStep)?;

    Ok((StatusCode::CREATED, Json(PlacedOrderResponse::from(placed))))
}
