//! crates/mentor_core/src/entitlement.rs
//!
//! Decides whether a user may receive a model-generated reply for a mentor
//! right now: an active paid subscription grants unlimited access, otherwise
//! a small free-message quota applies.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ports::{PortResult, RecordStore};

/// Number of chat turns permitted without an active subscription.
pub const FREE_QUOTA: u64 = 5;

/// The gate's verdict for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    /// A settled, unexpired subscription exists. Quota does not apply.
    Subscribed,
    /// No subscription, but the free quota is not yet spent.
    Trial { used: u64 },
    /// No subscription and the free quota is spent.
    Exhausted { used: u64 },
}

impl Entitlement {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Entitlement::Exhausted { .. })
    }
}

/// Evaluates the gate. Read-only: the inbound message is recorded by the
/// orchestrator after this check, so the counts seen here are the pre-turn
/// counts. Store failures propagate; the model must not be invoked on top
/// of a failed gating read.
pub async fn evaluate(
    store: &dyn RecordStore,
    user_id: Uuid,
    mentor_id: i64,
    now: DateTime<Utc>,
) -> PortResult<Entitlement> {
    if store
        .has_active_subscription(user_id, mentor_id, now)
        .await?
    {
        return Ok(Entitlement::Subscribed);
    }

    let used = store.count_user_messages(user_id, mentor_id).await?;
    if used < FREE_QUOTA {
        Ok(Entitlement::Trial { used })
    } else {
        Ok(Entitlement::Exhausted { used })
    }
}
