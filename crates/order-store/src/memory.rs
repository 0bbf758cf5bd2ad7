use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    IdempotencyRecord, NewOrder, OrderId, OrderLineRecord, OrderRecord, Product, ProductId,
    Result, StoreError,
    store::{OrderStore, StoreTransaction},
};

#[derive(Default)]
struct Tables {
    products: RwLock<BTreeMap<ProductId, Arc<Mutex<Product>>>>,
    orders: RwLock<BTreeMap<OrderId, Arc<Mutex<OrderRecord>>>>,
    order_lines: RwLock<HashMap<OrderId, Vec<OrderLineRecord>>>,
    idempotency_keys: RwLock<HashMap<String, IdempotencyRecord>>,
    order_sequence: AtomicI64,
}

/// In-memory order store implementation for testing.
///
/// Each product and order row sits behind its own async mutex. A
/// transaction keeps the owned guard of every row it locks until it
/// commits or is dropped, so concurrent transactions touching the same row
/// serialize exactly like `SELECT ... FOR UPDATE`. Writes are staged inside
/// the transaction and only become visible on commit.
///
/// Plain reads of a row wait for any transaction holding its lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product row.
    pub async fn insert_product(&self, product: Product) {
        let mut products = self.tables.products.write().await;
        products.insert(product.id, Arc::new(Mutex::new(product)));
    }

    /// Inserts an order row directly, bypassing the transaction path.
    ///
    /// Useful for setting up rows with statuses the order engine never writes.
    pub async fn seed_order(&self, order: OrderRecord) {
        self.tables
            .order_sequence
            .fetch_max(order.id.as_i64(), Ordering::SeqCst);
        let mut orders = self.tables.orders.write().await;
        orders.insert(order.id, Arc::new(Mutex::new(order)));
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.orders.read().await.len()
    }

    /// Returns the number of stored idempotency records.
    pub async fn idempotency_key_count(&self) -> usize {
        self.tables.idempotency_keys.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction::new(self.tables.clone()))
    }

    async fn find_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let keys = self.tables.idempotency_keys.read().await;
        Ok(keys.get(key).cloned())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = self.tables.products.read().await.get(&id).cloned();
        match row {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows: Vec<_> = self.tables.products.read().await.values().cloned().collect();
        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(row.lock().await.clone());
        }
        Ok(products)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = self.tables.orders.read().await.get(&id).cloned();
        match row {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_order_lines(&self, id: OrderId) -> Result<Vec<OrderLineRecord>> {
        let lines = self.tables.order_lines.read().await;
        Ok(lines.get(&id).cloned().unwrap_or_default())
    }
}

/// A transaction against an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<Tables>,
    products: BTreeMap<ProductId, OwnedMutexGuard<Product>>,
    staged_stock: HashMap<ProductId, i64>,
    orders: HashMap<OrderId, OwnedMutexGuard<OrderRecord>>,
    staged_status: HashMap<OrderId, String>,
    new_orders: BTreeMap<OrderId, OrderRecord>,
    new_lines: Vec<OrderLineRecord>,
    new_keys: Vec<IdempotencyRecord>,
}

impl InMemoryTransaction {
    fn new(tables: Arc<Tables>) -> Self {
        Self {
            tables,
            products: BTreeMap::new(),
            staged_stock: HashMap::new(),
            orders: HashMap::new(),
            staged_status: HashMap::new(),
            new_orders: BTreeMap::new(),
            new_lines: Vec::new(),
            new_keys: Vec::new(),
        }
    }

    fn staged_product(&self, id: ProductId) -> Option<Product> {
        let guard = self.products.get(&id)?;
        let mut product = Product::clone(guard);
        if let Some(stock) = self.staged_stock.get(&id) {
            product.stock = *stock;
        }
        Some(product)
    }

    fn staged_order(&self, id: OrderId) -> Option<OrderRecord> {
        if let Some(order) = self.new_orders.get(&id) {
            return Some(order.clone());
        }
        let guard = self.orders.get(&id)?;
        let mut order = OrderRecord::clone(guard);
        if let Some(status) = self.staged_status.get(&id) {
            order.status = status.clone();
        }
        Some(order)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        if !self.products.contains_key(&id) {
            // Clone the row handle out so the table lock isn't held while waiting.
            let row = self.tables.products.read().await.get(&id).cloned();
            let Some(row) = row else {
                return Ok(None);
            };
            let guard = row.lock_owned().await;
            self.products.insert(id, guard);
        }
        Ok(self.staged_product(id))
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: i64) -> Result<()> {
        let current = self
            .staged_product(id)
            .ok_or(StoreError::RowNotLocked {
                table: "products",
                id: id.as_i64(),
            })?
            .stock;

        let remaining = current - qty;
        if remaining < 0 {
            return Err(StoreError::ConstraintViolation(format!(
                "stock for product {id} would become {remaining}"
            )));
        }
        self.staged_stock.insert(id, remaining);
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId> {
        let id = OrderId::new(self.tables.order_sequence.fetch_add(1, Ordering::SeqCst) + 1);
        self.new_orders.insert(
            id,
            OrderRecord {
                id,
                customer_id: order.customer_id,
                status: order.status,
                total: order.total,
            },
        );
        Ok(id)
    }

    async fn insert_order_line(&mut self, line: &OrderLineRecord) -> Result<()> {
        if !self.new_orders.contains_key(&line.order_id) && !self.orders.contains_key(&line.order_id)
        {
            return Err(StoreError::ConstraintViolation(format!(
                "order {} does not exist",
                line.order_id
            )));
        }
        self.new_lines.push(line.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        if !self.new_orders.contains_key(&id) && !self.orders.contains_key(&id) {
            let row = self.tables.orders.read().await.get(&id).cloned();
            let Some(row) = row else {
                return Ok(None);
            };
            let guard = row.lock_owned().await;
            self.orders.insert(id, guard);
        }
        Ok(self.staged_order(id))
    }

    async fn update_order_status(&mut self, id: OrderId, status: &str) -> Result<()> {
        if let Some(order) = self.new_orders.get_mut(&id) {
            order.status = status.to_string();
            return Ok(());
        }
        if !self.orders.contains_key(&id) {
            return Err(StoreError::RowNotLocked {
                table: "orders",
                id: id.as_i64(),
            });
        }
        self.staged_status.insert(id, status.to_string());
        Ok(())
    }

    async fn insert_idempotency_record(&mut self, record: &IdempotencyRecord) -> Result<()> {
        let exists = self
            .tables
            .idempotency_keys
            .read()
            .await
            .contains_key(&record.key)
            || self.new_keys.iter().any(|r| r.key == record.key);
        if exists {
            return Err(StoreError::DuplicateIdempotencyKey(record.key.clone()));
        }
        self.new_keys.push(record.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        // Take every table lock before applying anything so readers never
        // observe half of a transaction.
        let mut keys = self.tables.idempotency_keys.write().await;
        if let Some(dup) = self.new_keys.iter().find(|r| keys.contains_key(&r.key)) {
            return Err(StoreError::DuplicateIdempotencyKey(dup.key.clone()));
        }
        let mut orders = self.tables.orders.write().await;
        let mut lines = self.tables.order_lines.write().await;

        for (id, stock) in self.staged_stock.drain() {
            if let Some(guard) = self.products.get_mut(&id) {
                guard.stock = stock;
            }
        }
        for (id, status) in self.staged_status.drain() {
            if let Some(guard) = self.orders.get_mut(&id) {
                guard.status = status;
            }
        }
        for (id, order) in std::mem::take(&mut self.new_orders) {
            orders.insert(id, Arc::new(Mutex::new(order)));
        }
        for line in self.new_lines.drain(..) {
            lines.entry(line.order_id).or_default().push(line);
        }
        for record in self.new_keys.drain(..) {
            keys.insert(record.key.clone(), record);
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!(
            locked_products = self.products.len(),
            locked_orders = self.orders.len(),
            "rolling back in-memory transaction"
        );
        Ok(())
    }
}
