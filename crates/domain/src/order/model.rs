//! Read-side view of a persisted order.

use common::{CustomerId, Money, OrderId, ProductId};
use order_store::{OrderLineRecord, OrderRecord};
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::error::OrderError;

/// A priced line of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl From<OrderLineRecord> for OrderLine {
    fn from(record: OrderLineRecord) -> Self {
        Self {
            product_id: record.product_id,
            qty: record.qty,
            unit_price: record.unit_price,
            subtotal: record.subtotal,
        }
    }
}

/// A persisted order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub total: Money,
    pub items: Vec<OrderLine>,
}

impl Order {
    /// Builds an order from its stored rows.
    ///
    /// Fails with `UnknownStatus` if the stored status isn't one this
    /// service writes.
    pub fn from_records(
        record: OrderRecord,
        lines: Vec<OrderLineRecord>,
    ) -> Result<Self, OrderError> {
        let status =
            OrderStatus::parse(&record.status).ok_or_else(|| OrderError::UnknownStatus {
                order_id: record.id,
                status: record.status.clone(),
            })?;

        Ok(Self {
            id: record.id,
            customer_id: record.customer_id,
            status,
            total: record.total,
            items: lines.into_iter().map(OrderLine::from).collect(),
        })
    }

    /// Sum of all line subtotals, or None if it overflows.
    pub fn lines_total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.subtotal))
    }
}
