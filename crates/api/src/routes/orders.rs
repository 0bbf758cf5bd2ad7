//! Order creation, lookup and confirmation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::{CustomerId, OrderId};
use domain::{ConfirmOrder, Order, OrderItem, OrderLine};
use order_store::OrderStore;
use saga::CustomerValidator;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

/// Header carrying the caller's idempotency key on confirmation.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub customer_id: i64,
    pub status: String,
    pub total_cents: i64,
    pub items: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: i64,
    pub qty: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id.as_i64(),
            qty: line.qty,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal.cents(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_i64(),
            customer_id: order.customer_id.as_i64(),
            status: order.status.to_string(),
            total_cents: order.total.cents(),
            items: order.items.iter().map(OrderLineResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// POST /orders: validate the customer, then reserve stock and create the
/// order in status CREATED.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S, V>(
    State(state): State<Arc<AppState<S, V>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    let Json(req) = payload?;

    let order = state
        .saga_coordinator
        .create_validated_order(req.customer_id, req.items)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders/{id}: load an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S, V>(
    State(state): State<Arc<AppState<S, V>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .order_service
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {order_id}")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/confirm: idempotently confirm an order.
///
/// Requires a non-empty `X-Idempotency-Key` header. The body is sent
/// exactly as stored, so a replay is byte-identical to the first answer.
#[tracing::instrument(skip(state, headers))]
pub async fn confirm<S, V>(
    State(state): State<Arc<AppState<S, V>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Header X-Idempotency-Key is required".to_string()))?;
    let order_id = parse_order_id(&id)?;

    let confirmation = state
        .confirmation_service
        .confirm_order(ConfirmOrder::new(order_id, key))
        .await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        confirmation.body,
    )
        .into_response())
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse::<OrderId>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
