//! Order domain for the inventory-backed order service.
//!
//! This crate provides:
//! - the inventory ledger (locked check-and-decrement of product stock)
//! - the order transaction engine (reserve + price + persist, all-or-nothing)
//! - the confirmation engine (idempotent CREATED → CONFIRMED transition)

pub mod confirmation;
pub mod error;
pub mod inventory;
pub mod order;

pub use common::{CustomerId, Money, OrderId, ProductId};
pub use confirmation::{
    CONFIRM_TARGET_TYPE, Confirmation, ConfirmationResponse, ConfirmationService,
    DEFAULT_IDEMPOTENCY_TTL_HOURS,
};
pub use error::OrderError;
pub use inventory::Reservation;
pub use order::{ConfirmOrder, CreateOrder, Order, OrderItem, OrderLine, OrderService, OrderStatus};
