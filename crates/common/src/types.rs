use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an identifier from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidId {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for InvalidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} must be a positive integer, got '{}'", self.kind, self.value)
    }
}

impl std::error::Error for InvalidId {}

/// Declares a database-assigned integer identifier.
///
/// Identifiers are plain `BIGINT` keys on the wire and in storage; the
/// newtype keeps product, order and customer ids from being mixed up.
macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw key.
            pub fn as_i64(&self) -> i64 {
                self.0
            }

            /// Returns true if the key could have been assigned by the database.
            pub fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.parse::<i64>() {
                    Ok(id) if id > 0 => Ok(Self(id)),
                    _ => Err(InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

integer_id!(
    /// Identifier of a product row in the inventory.
    ProductId,
    "product_id"
);

integer_id!(
    /// Identifier of an order row.
    OrderId,
    "order_id"
);

integer_id!(
    /// Identifier of a customer owned by the external customer service.
    CustomerId,
    "customer_id"
);
