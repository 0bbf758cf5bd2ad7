//! Inventory ledger.
//!
//! Stock is checked and decremented under a row lock held by the caller's
//! transaction, so no other transaction can observe or modify the row
//! between the check and the write.

use common::{Money, ProductId};
use order_store::StoreTransaction;

use crate::error::OrderError;
use crate::order::OrderItem;

/// Stock taken for one requested line, priced at lock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Locks a product, checks its stock and decrements it.
///
/// The lock stays held by `tx` until it commits or rolls back.
pub async fn reserve_stock<T: StoreTransaction>(
    tx: &mut T,
    product_id: ProductId,
    qty: i64,
) -> Result<Reservation, OrderError> {
    let product = tx
        .lock_product(product_id)
        .await?
        .ok_or(OrderError::ProductNotFound { product_id })?;

    if product.stock < qty {
        return Err(OrderError::InsufficientStock {
            product_id,
            requested: qty,
            available: product.stock,
        });
    }

    let subtotal = product
        .price
        .checked_multiply(qty)
        .ok_or(OrderError::AmountOutOfRange { product_id })?;

    tx.decrement_stock(product_id, qty).await?;

    Ok(Reservation {
        product_id,
        qty,
        unit_price: product.price,
        subtotal,
    })
}

/// Reserves every item in one transaction.
///
/// Rows are locked in ascending product id order so that concurrent
/// orders over overlapping products cannot deadlock. The returned
/// reservations follow the request order. On the first failure the
/// error is returned and the caller must roll `tx` back.
pub async fn reserve_items<T: StoreTransaction>(
    tx: &mut T,
    items: &[OrderItem],
) -> Result<Vec<Reservation>, OrderError> {
    let mut lock_order: Vec<usize> = (0..items.len()).collect();
    lock_order.sort_by_key(|&index| items[index].product_id);

    let mut reserved: Vec<Option<Reservation>> = vec![None; items.len()];
    for index in lock_order {
        let item = items[index];
        reserved[index] = Some(reserve_stock(tx, item.product_id, item.qty).await?);
    }

    Ok(reserved.into_iter().flatten().collect())
}
