//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// CREATED ──► CONFIRMED
/// ```
/// Orders are never deleted and never move back to CREATED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Stock is reserved and the order is persisted, awaiting confirmation.
    #[default]
    Created,

    /// The order has been confirmed (terminal state).
    Confirmed,
}

impl OrderStatus {
    /// Returns true if the order can be confirmed in this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    /// Returns the status as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Confirmed => "CONFIRMED",
        }
    }

    /// Parses a stored status value.
    ///
    /// Returns None for values this service never writes.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(OrderStatus::Created),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
