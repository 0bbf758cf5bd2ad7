//! Integration tests for the order placement saga.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use common::{CustomerId, Money, OrderId, ProductId};
use domain::{OrderItem, OrderStatus};
use order_store::{
    IdempotencyRecord, InMemoryStore, InMemoryTransaction, NewOrder, OrderLineRecord, OrderRecord,
    OrderStore, Product, StoreError, StoreTransaction,
};
use saga::{
    CustomerCheck, CustomerValidator, HttpCustomerValidator, InMemoryCustomerValidator,
    PlaceOrder, SagaCoordinator, SagaError,
};

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert_product(Product::new(
            ProductId::new(1),
            "Widget",
            Money::from_cents(1000),
            5,
        ))
        .await;
    store
        .insert_product(Product::new(
            ProductId::new(2),
            "Gadget",
            Money::from_cents(2500),
            5,
        ))
        .await;
    store
}

fn request(customer_id: i64, key: &str) -> PlaceOrder {
    PlaceOrder {
        customer_id: CustomerId::new(customer_id),
        items: vec![OrderItem::new(1, 2), OrderItem::new(2, 1)],
        idempotency_key: key.to_string(),
        correlation_id: None,
    }
}

async fn stock_of<S: OrderStore>(store: &S, id: i64) -> i64 {
    store
        .get_product(ProductId::new(id))
        .await
        .unwrap()
        .unwrap()
        .stock
}

struct TestHarness {
    coordinator: SagaCoordinator<InMemoryStore, InMemoryCustomerValidator>,
    store: InMemoryStore,
    validator: InMemoryCustomerValidator,
}

impl TestHarness {
    async fn new() -> Self {
        let store = seeded_store().await;
        let validator = InMemoryCustomerValidator::new();
        validator.add_customer(
            CustomerId::new(1),
            serde_json::json!({"id": 1, "name": "ACME Corp", "email": "ops@acme.test"}),
        );
        let coordinator = SagaCoordinator::new(store.clone(), validator.clone());
        Self {
            coordinator,
            store,
            validator,
        }
    }
}

mod in_memory {
    use super::*;

    #[tokio::test]
    async fn happy_path_creates_and_confirms() {
        let h = TestHarness::new().await;

        let mut req = request(1, "abc");
        req.correlation_id = Some("corr-1".to_string());
        let placed = h.coordinator.execute(req).await.unwrap();

        assert_eq!(placed.correlation_id, "corr-1");
        assert_eq!(placed.customer["name"], "ACME Corp");
        assert_eq!(placed.order.total.cents(), 4500);
        assert_eq!(placed.order.items.len(), 2);
        assert_eq!(placed.confirmation.status, OrderStatus::Confirmed);
        assert_eq!(placed.confirmation.order_id, placed.order.id);

        let stored = h.store.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "CONFIRMED");
        assert_eq!(stock_of(&h.store, 1).await, 3);
        assert_eq!(stock_of(&h.store, 2).await, 4);
    }

    #[tokio::test]
    async fn correlation_id_is_generated_when_missing() {
        let h = TestHarness::new().await;

        let placed = h.coordinator.execute(request(1, "abc")).await.unwrap();

        assert!(uuid::Uuid::parse_str(&placed.correlation_id).is_ok());
    }

    #[tokio::test]
    async fn invalid_customer_touches_nothing() {
        let h = TestHarness::new().await;

        let err = h.coordinator.execute(request(999, "abc")).await.unwrap_err();

        assert!(matches!(
            err,
            SagaError::CustomerInvalid {
                status: Some(404),
                ..
            }
        ));
        assert_eq!(err.step(), Some("validate_customer"));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(stock_of(&h.store, 1).await, 5);
    }

    #[tokio::test]
    async fn unavailable_customer_service_is_distinct() {
        let h = TestHarness::new().await;
        h.validator.set_unavailable(true);

        let err = h.coordinator.execute(request(1, "abc")).await.unwrap_err();

        assert!(matches!(err, SagaError::ServiceUnavailable(_)));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_request_skips_the_customer_service() {
        let h = TestHarness::new().await;

        let mut req = request(1, "abc");
        req.items = vec![];
        let err = h.coordinator.execute(req).await.unwrap_err();
        assert!(matches!(err, SagaError::Validation(_)));

        let err = h.coordinator.execute(request(1, "  ")).await.unwrap_err();
        assert!(matches!(err, SagaError::Validation(_)));

        assert_eq!(h.validator.call_count(), 0);
    }

    #[tokio::test]
    async fn stock_failure_persists_nothing() {
        let h = TestHarness::new().await;

        let mut req = request(1, "abc");
        req.items = vec![OrderItem::new(1, 1), OrderItem::new(2, 6)];
        let err = h.coordinator.execute(req).await.unwrap_err();

        assert_eq!(err.step(), Some("create_order"));
        assert!(matches!(
            err.order_error(),
            Some(domain::OrderError::InsufficientStock { .. })
        ));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(stock_of(&h.store, 1).await, 5);
    }

    #[tokio::test]
    async fn key_reused_for_a_new_order_is_not_reported_confirmed() {
        let h = TestHarness::new().await;

        let first = h.coordinator.execute(request(1, "shared")).await.unwrap();

        let mut again = request(1, "shared");
        again.items = vec![OrderItem::new(1, 1)];
        let err = h.coordinator.execute(again).await.unwrap_err();

        assert_eq!(err.step(), Some("confirm_order"));
        let SagaError::ConfirmOrder { order_id, source } = err else {
            panic!("expected a confirm step failure");
        };
        assert_ne!(order_id, first.order.id);
        assert!(matches!(
            source,
            domain::OrderError::IdempotencyKeyReused { order_id: stored, .. } if stored == first.order.id
        ));

        // The second order exists but was never confirmed.
        let stored = h.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, "CREATED");
        assert_eq!(h.store.idempotency_key_count().await, 1);
    }

    #[tokio::test]
    async fn create_validated_order_leaves_order_created() {
        let h = TestHarness::new().await;

        let order = h
            .coordinator
            .create_validated_order(CustomerId::new(1), vec![OrderItem::new(1, 1)])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(h.validator.call_count(), 1);
    }
}

/// Store wrapper whose transactions can be told to fail when locking an
/// order, which makes the confirm step fail after creation committed.
#[derive(Clone)]
struct FlakyConfirmStore {
    inner: InMemoryStore,
    fail_lock_order: Arc<AtomicBool>,
}

struct FlakyTransaction {
    inner: InMemoryTransaction,
    fail_lock_order: bool,
}

#[async_trait]
impl OrderStore for FlakyConfirmStore {
    type Tx = FlakyTransaction;

    async fn begin(&self) -> order_store::Result<FlakyTransaction> {
        Ok(FlakyTransaction {
            inner: self.inner.begin().await?,
            fail_lock_order: self.fail_lock_order.load(Ordering::SeqCst),
        })
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> order_store::Result<Option<IdempotencyRecord>> {
        self.inner.find_idempotency_record(key).await
    }

    async fn get_product(&self, id: ProductId) -> order_store::Result<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn list_products(&self) -> order_store::Result<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn get_order(&self, id: OrderId) -> order_store::Result<Option<OrderRecord>> {
        self.inner.get_order(id).await
    }

    async fn get_order_lines(&self, id: OrderId) -> order_store::Result<Vec<OrderLineRecord>> {
        self.inner.get_order_lines(id).await
    }
}

#[async_trait]
impl StoreTransaction for FlakyTransaction {
    async fn lock_product(&mut self, id: ProductId) -> order_store::Result<Option<Product>> {
        self.inner.lock_product(id).await
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: i64) -> order_store::Result<()> {
        self.inner.decrement_stock(id, qty).await
    }

    async fn insert_order(&mut self, order: NewOrder) -> order_store::Result<OrderId> {
        self.inner.insert_order(order).await
    }

    async fn insert_order_line(&mut self, line: &OrderLineRecord) -> order_store::Result<()> {
        self.inner.insert_order_line(line).await
    }

    async fn lock_order(&mut self, id: OrderId) -> order_store::Result<Option<OrderRecord>> {
        if self.fail_lock_order {
            return Err(StoreError::ConstraintViolation(
                "connection reset".to_string(),
            ));
        }
        self.inner.lock_order(id).await
    }

    async fn update_order_status(&mut self, id: OrderId, status: &str) -> order_store::Result<()> {
        self.inner.update_order_status(id, status).await
    }

    async fn insert_idempotency_record(
        &mut self,
        record: &IdempotencyRecord,
    ) -> order_store::Result<()> {
        self.inner.insert_idempotency_record(record).await
    }

    async fn commit(self) -> order_store::Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self) -> order_store::Result<()> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn confirm_failure_leaves_order_created_and_retry_confirms() {
    let store = FlakyConfirmStore {
        inner: seeded_store().await,
        fail_lock_order: Arc::new(AtomicBool::new(true)),
    };
    let validator = InMemoryCustomerValidator::new();
    validator.add_customer(CustomerId::new(1), serde_json::json!({"id": 1}));
    let coordinator = SagaCoordinator::new(store.clone(), validator);

    let err = coordinator.execute(request(1, "retry-key")).await.unwrap_err();

    let order_id = match err {
        SagaError::ConfirmOrder { order_id, .. } => order_id,
        other => panic!("expected confirm step failure, got {other}"),
    };
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "CREATED");
    assert_eq!(stock_of(&store, 1).await, 3);
    assert!(
        store
            .find_idempotency_record("retry-key")
            .await
            .unwrap()
            .is_none()
    );

    // Out-of-band retry with the same key reaches CONFIRMED.
    store.fail_lock_order.store(false, Ordering::SeqCst);
    let confirmation = coordinator
        .confirmations()
        .confirm_order(domain::ConfirmOrder::new(order_id, "retry-key"))
        .await
        .unwrap();
    assert_eq!(confirmation.response().unwrap().status, OrderStatus::Confirmed);

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "CONFIRMED");
}

mod http_validator {
    use super::*;

    const TOKEN: &str = "test-service-token";

    async fn customer_handler(Path(id): Path<i64>, headers: HeaderMap) -> impl IntoResponse {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {TOKEN}"));
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Unauthorized"})),
            );
        }

        match id {
            1 => (
                StatusCode::OK,
                Json(serde_json::json!({"id": 1, "name": "ACME Corp"})),
            ),
            42 => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                (StatusCode::OK, Json(serde_json::json!({"id": 42})))
            }
            _ => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Customer not found"})),
            ),
        }
    }

    /// Starts a stand-in customer service on an ephemeral port.
    async fn spawn_customer_service() -> String {
        let app = Router::new().route("/internal/customers/{id}", get(customer_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn validator(base_url: &str, token: &str) -> HttpCustomerValidator {
        HttpCustomerValidator::new(base_url, token, Duration::from_millis(300)).unwrap()
    }

    #[tokio::test]
    async fn existing_customer_is_valid() {
        let url = spawn_customer_service().await;

        let check = validator(&url, TOKEN)
            .validate(CustomerId::new(1))
            .await
            .unwrap();

        assert_eq!(
            check,
            CustomerCheck::Valid(serde_json::json!({"id": 1, "name": "ACME Corp"}))
        );
    }

    #[tokio::test]
    async fn missing_customer_is_invalid() {
        let url = spawn_customer_service().await;

        let check = validator(&url, TOKEN)
            .validate(CustomerId::new(999))
            .await
            .unwrap();

        assert_eq!(check, CustomerCheck::Invalid { status: Some(404) });
    }

    #[tokio::test]
    async fn wrong_token_is_invalid_not_unavailable() {
        let url = spawn_customer_service().await;

        let check = validator(&url, "wrong")
            .validate(CustomerId::new(1))
            .await
            .unwrap();

        assert_eq!(check, CustomerCheck::Invalid { status: Some(401) });
    }

    #[tokio::test]
    async fn slow_service_times_out_as_unavailable() {
        let url = spawn_customer_service().await;

        let err = validator(&url, TOKEN)
            .validate(CustomerId::new(42))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = validator(&format!("http://{addr}"), TOKEN)
            .validate(CustomerId::new(1))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn saga_over_http_rejects_unknown_customer() {
        let url = spawn_customer_service().await;
        let store = seeded_store().await;
        let coordinator = SagaCoordinator::new(store.clone(), validator(&url, TOKEN));

        let err = coordinator.execute(request(999, "abc")).await.unwrap_err();

        assert!(matches!(err, SagaError::CustomerInvalid { .. }));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn saga_over_http_happy_path() {
        let url = spawn_customer_service().await;
        let store = seeded_store().await;
        let coordinator = SagaCoordinator::new(store.clone(), validator(&url, TOKEN));

        let placed = coordinator.execute(request(1, "abc")).await.unwrap();

        assert_eq!(placed.customer["name"], "ACME Corp");
        assert_eq!(placed.confirmation.status, OrderStatus::Confirmed);
    }
}
