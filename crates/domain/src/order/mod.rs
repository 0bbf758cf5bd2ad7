//! Orders: commands, status machine, persisted view and the service that
//! creates them.

mod commands;
mod model;
mod service;
mod state;

pub use commands::{ConfirmOrder, CreateOrder, OrderItem};
pub use model::{Order, OrderLine};
pub use service::OrderService;
pub use state::OrderStatus;
