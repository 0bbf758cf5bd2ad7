//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate the tables
//! before each test, so they are serialized.
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use order_store::{
    CustomerId, IdempotencyRecord, Money, NewOrder, OrderLineRecord, OrderStore, PostgresStore,
    ProductId, StoreError, StoreTransaction,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, products, idempotency_keys RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn new_order(total: i64) -> NewOrder {
    NewOrder {
        customer_id: CustomerId::new(1),
        status: "CREATED".to_string(),
        total: Money::from_cents(total),
    }
}

fn idempotency_record(key: &str, target_id: i64) -> IdempotencyRecord {
    IdempotencyRecord {
        key: key.to_string(),
        target_type: "ORDER_CONFIRM".to_string(),
        target_id,
        status: "SUCCESS".to_string(),
        response_body: r#"{"success":true}"#.to_string(),
        expires_at: Utc::now() + chrono::Duration::hours(24),
    }
}

#[tokio::test]
#[serial]
async fn committed_order_and_stock_are_visible() {
    let store = get_test_store().await;
    let product_id = store
        .insert_product("Widget", Money::from_cents(1000), 5)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let product = tx.lock_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 5);
    tx.decrement_stock(product_id, 2).await.unwrap();
    let order_id = tx.insert_order(new_order(2000)).await.unwrap();
    tx.insert_order_line(&OrderLineRecord {
        order_id,
        product_id,
        qty: 2,
        unit_price: Money::from_cents(1000),
        subtotal: Money::from_cents(2000),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let product = store.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "CREATED");
    assert_eq!(order.total.cents(), 2000);

    let lines = store.get_order_lines(order_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].subtotal.cents(), 2000);
}

#[tokio::test]
#[serial]
async fn rollback_restores_stock() {
    let store = get_test_store().await;
    let product_id = store
        .insert_product("Widget", Money::from_cents(1000), 5)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.lock_product(product_id).await.unwrap();
    tx.decrement_stock(product_id, 5).await.unwrap();
    tx.rollback().await.unwrap();

    let product = store.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 5);
}

#[tokio::test]
#[serial]
async fn negative_stock_violates_check_constraint() {
    let store = get_test_store().await;
    let product_id = store
        .insert_product("Widget", Money::from_cents(1000), 1)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.lock_product(product_id).await.unwrap();
    let result = tx.decrement_stock(product_id, 2).await;
    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
}

#[tokio::test]
#[serial]
async fn product_lock_serializes_transactions() {
    let store = get_test_store().await;
    let product_id = store
        .insert_product("Widget", Money::from_cents(1000), 5)
        .await
        .unwrap();

    let mut first = store.begin().await.unwrap();
    first.lock_product(product_id).await.unwrap();

    let contender = store.clone();
    let handle = tokio::spawn(async move {
        let mut second = contender.begin().await.unwrap();
        let product = second.lock_product(product_id).await.unwrap().unwrap();
        second.rollback().await.unwrap();
        product.stock
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    first.decrement_stock(product_id, 4).await.unwrap();
    first.commit().await.unwrap();

    assert_eq!(handle.await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn duplicate_idempotency_key_is_reported() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_idempotency_record(&idempotency_record("abc", 10))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stored = store.find_idempotency_record("abc").await.unwrap().unwrap();
    assert_eq!(stored.target_id, 10);
    assert_eq!(stored.response_body, r#"{"success":true}"#);

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .insert_idempotency_record(&idempotency_record("abc", 11))
        .await;
    assert!(matches!(result, Err(StoreError::DuplicateIdempotencyKey(k)) if k == "abc"));
}

#[tokio::test]
#[serial]
async fn missing_rows_return_none() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    assert!(tx.lock_product(ProductId::new(999)).await.unwrap().is_none());
    assert!(
        tx.lock_order(order_store::OrderId::new(999))
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.find_idempotency_record("nope").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn order_status_update() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order_id = tx.insert_order(new_order(0)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let order = tx.lock_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "CREATED");
    tx.update_order_status(order_id, "CONFIRMED").await.unwrap();
    tx.commit().await.unwrap();

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "CONFIRMED");
}
