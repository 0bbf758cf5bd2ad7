use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An idempotency record already exists for the key.
    #[error("Idempotency key already recorded: {0}")]
    DuplicateIdempotencyKey(String),

    /// A write would break a table constraint (e.g. negative stock).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A write targeted a row the transaction has not locked.
    #[error("Row {table}#{id} is not locked by this transaction")]
    RowNotLocked { table: &'static str, id: i64 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
