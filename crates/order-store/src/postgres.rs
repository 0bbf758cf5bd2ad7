use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    CustomerId, IdempotencyRecord, Money, NewOrder, OrderId, OrderLineRecord, OrderRecord,
    Product, ProductId, Result, StoreError,
    store::{OrderStore, StoreTransaction},
};

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a product and returns its generated id.
    pub async fn insert_product(&self, name: &str, price: Money, stock: i64) -> Result<ProductId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (name, price_cents, stock) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(price.cents())
        .bind(stock)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductId::new(id))
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::new(row.try_get("id")?),
            customer_id: CustomerId::new(row.try_get("customer_id")?),
            status: row.try_get("status")?,
            total: Money::from_cents(row.try_get("total_cents")?),
        })
    }

    fn row_to_line(row: PgRow) -> Result<OrderLineRecord> {
        Ok(OrderLineRecord {
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            qty: row.try_get("qty")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    fn row_to_idempotency_record(row: PgRow) -> Result<IdempotencyRecord> {
        Ok(IdempotencyRecord {
            key: row.try_get("key")?,
            target_type: row.try_get("target_type")?,
            target_id: row.try_get("target_id")?,
            status: row.try_get("status")?,
            response_body: row.try_get("response_body")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

/// Maps constraint failures onto the store's error variants.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_check_violation() || db_err.is_foreign_key_violation())
    {
        return StoreError::ConstraintViolation(db_err.message().to_string());
    }
    StoreError::Database(e)
}

#[async_trait]
impl OrderStore for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn find_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT key, target_type, target_id, status, response_body, expires_at
            FROM idempotency_keys
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_idempotency_record).transpose()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT id, name, price_cents, stock FROM products ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            "SELECT id, customer_id, status, total_cents FROM orders WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_order_lines(&self, id: OrderId) -> Result<Vec<OrderLineRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, qty, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }
}

/// A transaction on one pooled PostgreSQL connection.
///
/// The connection goes back to the pool when the transaction is committed,
/// rolled back, or dropped (which rolls back).
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(PostgresStore::row_to_product).transpose()
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: i64) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(qty)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotLocked {
                table: "products",
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (customer_id, status, total_cents) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(order.customer_id.as_i64())
        .bind(&order.status)
        .bind(order.total.cents())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(OrderId::new(id))
    }

    async fn insert_order_line(&mut self, line: &OrderLineRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, qty, unit_price_cents, subtotal_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(line.order_id.as_i64())
        .bind(line.product_id.as_i64())
        .bind(line.qty)
        .bind(line.unit_price.cents())
        .bind(line.subtotal.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            "SELECT id, customer_id, status, total_cents FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(PostgresStore::row_to_order).transpose()
    }

    async fn update_order_status(&mut self, id: OrderId, status: &str) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(status)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotLocked {
                table: "orders",
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    async fn insert_idempotency_record(&mut self, record: &IdempotencyRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, target_type, target_id, status, response_body, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.key)
        .bind(&record.target_type)
        .bind(record.target_id)
        .bind(&record.status)
        .bind(&record.response_body)
        .bind(record.expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateIdempotencyKey(record.key.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
