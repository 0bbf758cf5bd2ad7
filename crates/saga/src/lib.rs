//! Order placement saga.
//!
//! The saga chains three steps, each committing on its own:
//! 1. Validate the customer with the customer service
//! 2. Create the order (reserve stock, price, persist)
//! 3. Confirm the order under the caller's idempotency key
//!
//! There are no compensating actions. A failed confirmation leaves the
//! order in status CREATED; retrying confirmation with the same key is
//! always safe.

pub mod coordinator;
pub mod error;
pub mod order_placement;
pub mod services;

pub use coordinator::SagaCoordinator;
pub use error::SagaError;
pub use order_placement::{PlaceOrder, PlacedOrder};
pub use services::{
    CustomerCheck, CustomerValidator, HttpCustomerValidator, InMemoryCustomerValidator,
};
