//! Shared identifiers and value types used across the order services.

mod money;
mod types;

pub use money::Money;
pub use types::{CustomerId, InvalidId, OrderId, ProductId};
