//! External service traits and implementations for saga steps.

pub mod customer;

pub use customer::{
    CustomerCheck, CustomerValidator, HttpCustomerValidator, InMemoryCustomerValidator,
};
