use async_trait::async_trait;
use common::{OrderId, ProductId};

use crate::{IdempotencyRecord, NewOrder, OrderLineRecord, OrderRecord, Product, Result};

/// Core trait for order store implementations.
///
/// A store hands out transactions, each bound to one connection for its
/// whole lifetime. Everything outside a transaction is a plain committed
/// read. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The transaction type produced by [`OrderStore::begin`].
    type Tx: StoreTransaction + 'static;

    /// Acquires a connection and opens a transaction on it.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Looks up a previously stored idempotency record.
    async fn find_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>>;

    /// Reads a product without locking it.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists all products ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Reads an order without locking it.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Reads the lines of an order in insertion order.
    async fn get_order_lines(&self, id: OrderId) -> Result<Vec<OrderLineRecord>>;
}

/// A single unit of work against the store.
///
/// Locks taken by `lock_*` are held until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropping a transaction without committing
/// rolls it back and releases its connection.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads a product and locks its row for the rest of the transaction.
    ///
    /// Returns None if the product doesn't exist.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Decrements the stock of a product locked by this transaction.
    async fn decrement_stock(&mut self, id: ProductId, qty: i64) -> Result<()>;

    /// Inserts an order row and returns its generated id.
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId>;

    /// Inserts a line for an order created in this transaction.
    async fn insert_order_line(&mut self, line: &OrderLineRecord) -> Result<()>;

    /// Reads an order and locks its row for the rest of the transaction.
    ///
    /// Returns None if the order doesn't exist.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Updates the status of an order locked by this transaction.
    async fn update_order_status(&mut self, id: OrderId, status: &str) -> Result<()>;

    /// Inserts a new idempotency record.
    ///
    /// Fails with `DuplicateIdempotencyKey` if the key is already recorded.
    async fn insert_idempotency_record(&mut self, record: &IdempotencyRecord) -> Result<()>;

    /// Commits all writes and releases every lock.
    async fn commit(self) -> Result<()>;

    /// Discards all writes and releases every lock.
    async fn rollback(self) -> Result<()>;
}
