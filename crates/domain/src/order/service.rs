//! Order transaction engine.

use common::{Money, OrderId};
use order_store::{NewOrder, OrderLineRecord, OrderStore, Product, StoreTransaction};

use super::{CreateOrder, Order, OrderLine, OrderStatus};
use crate::error::OrderError;
use crate::inventory;

/// Service for creating and reading orders.
///
/// Creating an order reserves stock, prices every line and persists the
/// order in one store transaction. Either all of it commits or none of it
/// does.
#[derive(Clone)]
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order in status CREATED.
    ///
    /// Validation happens before any row is locked. On any failure the
    /// transaction is rolled back and stock is left untouched.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, items = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, OrderError> {
        if let Err(e) = cmd.validate() {
            metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
            return Err(e);
        }

        let mut tx = self.store.begin().await?;

        match Self::write_order(&mut tx, &cmd).await {
            Ok(order) => {
                tx.commit().await?;
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "Order created");
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed order creation failed");
                }
                metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
                tracing::info!(error = %e, "Order rejected");
                Err(e)
            }
        }
    }

    async fn write_order(tx: &mut S::Tx, cmd: &CreateOrder) -> Result<Order, OrderError> {
        let reservations = inventory::reserve_items(tx, &cmd.items).await?;
        let total = reservations
            .iter()
            .try_fold(Money::zero(), |acc, r| {
                acc.checked_add(r.subtotal)
                    .ok_or(OrderError::AmountOutOfRange {
                        product_id: r.product_id,
                    })
            })?;

        let order_id = tx
            .insert_order(NewOrder {
                customer_id: cmd.customer_id,
                status: OrderStatus::Created.as_str().to_string(),
                total,
            })
            .await?;

        let mut lines: Vec<OrderLine> = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            let line = OrderLineRecord {
                order_id,
                product_id: reservation.product_id,
                qty: reservation.qty,
                unit_price: reservation.unit_price,
                subtotal: reservation.subtotal,
            };
            tx.insert_order_line(&line).await?;
            lines.push(line.into());
        }

        Ok(Order {
            id: order_id,
            customer_id: cmd.customer_id,
            status: OrderStatus::Created,
            total,
            items: lines,
        })
    }

    /// Loads an order with its lines.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        let Some(record) = self.store.get_order(order_id).await? else {
            return Ok(None);
        };
        let lines = self.store.get_order_lines(order_id).await?;
        Order::from_records(record, lines).map(Some)
    }

    /// Lists the product catalog.
    pub async fn list_products(&self) -> Result<Vec<Product>, OrderError> {
        Ok(self.store.list_products().await?)
    }
}
