//! Confirmation engine.
//!
//! Confirming an order moves it from CREATED to CONFIRMED and stores the
//! produced response under the caller's idempotency key, both in one
//! transaction. Any later call with the same key gets the stored response
//! back verbatim without touching the order.

use chrono::Utc;
use common::OrderId;
use order_store::{IdempotencyRecord, OrderStore, StoreError, StoreTransaction};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::order::{ConfirmOrder, OrderStatus};

/// `target_type` of idempotency records written by order confirmation.
pub const CONFIRM_TARGET_TYPE: &str = "ORDER_CONFIRM";

/// `status` of idempotency records written by a successful confirmation.
pub const RECORD_STATUS_SUCCESS: &str = "SUCCESS";

/// Default lifetime of an idempotency record.
pub const DEFAULT_IDEMPOTENCY_TTL_HOURS: i64 = 24;

/// Body returned by a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub success: bool,
    pub message: String,
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl ConfirmationResponse {
    /// The response for an order that is now CONFIRMED.
    pub fn confirmed(order_id: OrderId) -> Self {
        Self {
            success: true,
            message: "Order confirmed".to_string(),
            order_id,
            status: OrderStatus::Confirmed,
        }
    }
}

/// Result of a confirmation call.
///
/// `body` is the exact serialized response. A replay returns the stored
/// text unchanged, so callers should send `body` as-is rather than
/// re-serializing [`Confirmation::response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub body: String,
    pub replayed: bool,
}

impl Confirmation {
    /// Parses the stored body.
    pub fn response(&self) -> Result<ConfirmationResponse, OrderError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

enum Outcome {
    Confirmed,
    AlreadyConfirmed,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Confirmed => "confirmed",
            Outcome::AlreadyConfirmed => "already_confirmed",
        }
    }
}

/// Service for idempotent order confirmation.
#[derive(Clone)]
pub struct ConfirmationService<S: OrderStore> {
    store: S,
    ttl: chrono::Duration,
}

impl<S: OrderStore> ConfirmationService<S> {
    /// Creates a confirmation service with the default record lifetime.
    pub fn new(store: S) -> Self {
        Self {
            store,
            ttl: chrono::Duration::hours(DEFAULT_IDEMPOTENCY_TTL_HOURS),
        }
    }

    /// Sets how long idempotency records stay valid.
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Confirms an order under an idempotency key.
    ///
    /// A key that was already used short-circuits to its stored response
    /// before any lock is taken. An order that is already CONFIRMED is
    /// left untouched but the key is still recorded.
    #[tracing::instrument(
        skip(self, cmd),
        fields(order_id = %cmd.order_id, idempotency_key = %cmd.idempotency_key)
    )]
    pub async fn confirm_order(&self, cmd: ConfirmOrder) -> Result<Confirmation, OrderError> {
        cmd.validate()?;

        if let Some(record) = self
            .store
            .find_idempotency_record(&cmd.idempotency_key)
            .await?
        {
            return Ok(replay(&cmd, record));
        }

        let mut tx = self.store.begin().await?;

        let (body, outcome) = match self.transition(&mut tx, &cmd).await {
            Ok(written) => written,
            Err(OrderError::Store(StoreError::DuplicateIdempotencyKey(_))) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after duplicate key failed");
                }
                return self.replay_winner(&cmd).await;
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed confirmation failed");
                }
                metrics::counter!("order_confirmations_total", "outcome" => e.kind())
                    .increment(1);
                return Err(e);
            }
        };

        match tx.commit().await {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey(_)) => return self.replay_winner(&cmd).await,
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("order_confirmations_total", "outcome" => outcome.label()).increment(1);
        tracing::info!(outcome = outcome.label(), "Order confirmation recorded");

        Ok(Confirmation {
            body,
            replayed: false,
        })
    }

    async fn transition(
        &self,
        tx: &mut S::Tx,
        cmd: &ConfirmOrder,
    ) -> Result<(String, Outcome), OrderError> {
        let order = tx
            .lock_order(cmd.order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(cmd.order_id))?;

        let outcome = match OrderStatus::parse(&order.status) {
            Some(OrderStatus::Created) => {
                tx.update_order_status(order.id, OrderStatus::Confirmed.as_str())
                    .await?;
                Outcome::Confirmed
            }
            Some(OrderStatus::Confirmed) => Outcome::AlreadyConfirmed,
            None => {
                return Err(OrderError::IllegalStateTransition {
                    order_id: order.id,
                    status: order.status,
                });
            }
        };

        let body = serde_json::to_string(&ConfirmationResponse::confirmed(order.id))?;

        tx.insert_idempotency_record(&IdempotencyRecord {
            key: cmd.idempotency_key.clone(),
            target_type: CONFIRM_TARGET_TYPE.to_string(),
            target_id: order.id.as_i64(),
            status: RECORD_STATUS_SUCCESS.to_string(),
            response_body: body.clone(),
            expires_at: Utc::now() + self.ttl,
        })
        .await?;

        Ok((body, outcome))
    }

    /// Replays the record written by a concurrent first use of the key.
    async fn replay_winner(&self, cmd: &ConfirmOrder) -> Result<Confirmation, OrderError> {
        tracing::debug!("Lost idempotency key race, replaying stored response");
        let record = self
            .store
            .find_idempotency_record(&cmd.idempotency_key)
            .await?
            .ok_or_else(|| {
                StoreError::DuplicateIdempotencyKey(cmd.idempotency_key.clone())
            })?;
        Ok(replay(cmd, record))
    }
}

fn replay(cmd: &ConfirmOrder, record: IdempotencyRecord) -> Confirmation {
    if record.target_id != cmd.order_id.as_i64() {
        tracing::warn!(
            stored_order_id = record.target_id,
            "Idempotency key reused for a different order, replaying stored response"
        );
    }
    metrics::counter!("order_confirmations_total", "outcome" => "replayed").increment(1);
    Confirmation {
        body: record.response_body,
        replayed: true,
    }
}
