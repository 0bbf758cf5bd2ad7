//! Row types exchanged with the store.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl Product {
    /// Creates a product row.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock: i64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock,
        }
    }
}

/// An order row as stored.
///
/// `status` is kept as the raw column value; interpreting it is the
/// domain layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: String,
    pub total: Money,
}

/// Values for an order row whose id is not yet assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub status: String,
    pub total: Money,
}

/// An order line row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRecord {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// A stored idempotency key and the response it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub key: String,
    pub target_type: String,
    pub target_id: i64,
    pub status: String,
    /// Serialized response, replayed byte-for-byte.
    pub response_body: String,
    pub expires_at: DateTime<Utc>,
}
