//! Transactional storage for the order services.
//!
//! Products, orders, order lines and idempotency keys live in one relational
//! store so that stock reservation, order persistence and confirmation
//! records can share a single transaction.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{CustomerId, Money, OrderId, ProductId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use record::{IdempotencyRecord, NewOrder, OrderLineRecord, OrderRecord, Product};
pub use store::{OrderStore, StoreTransaction};
