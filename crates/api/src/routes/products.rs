//! Product catalog endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use order_store::{OrderStore, Product};
use saga::CustomerValidator;
use serde::Serialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name,
            price_cents: product.price.cents(),
            stock: product.stock,
        }
    }
}

/// GET /products: list the catalog with current stock.
pub async fn list<S, V>(
    State(state): State<Arc<AppState<S, V>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError>
where
    S: OrderStore + Clone + 'static,
    V: CustomerValidator + Clone + 'static,
{
    let products = state.order_service.list_products().await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}
