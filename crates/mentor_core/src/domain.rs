//! crates/mentor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A mentor persona: the content owner whose documents ground the chat.
#[derive(Debug, Clone)]
pub struct Mentor {
    pub id: i64,
    pub name: String,
    pub personality: String,
    pub expertise: String,
    pub category: String,
    pub price_per_month: i64,
    pub is_active: bool,
}

impl Mentor {
    /// The generic persona used when a mentor row is missing. A broken
    /// mentor reference degrades the persona, never the whole turn.
    pub fn fallback(mentor_id: i64) -> Self {
        Self {
            id: mentor_id,
            name: "Mentor".to_string(),
            personality: "Professional".to_string(),
            expertise: "Business".to_string(),
            category: "General".to_string(),
            price_per_month: 0,
            is_active: true,
        }
    }
}

/// An ordered fragment of a mentor's ingested document text.
///
/// Chunks concatenated in `position` order reconstitute the original
/// document(s), modulo the chunk-boundary splits made at ingestion.
#[derive(Debug, Clone)]
pub struct KnowledgeChunk {
    pub mentor_id: i64,
    pub position: i32,
    pub content: String,
}

/// One unit of a mentor's sequential curriculum, emitted by ingestion.
#[derive(Debug, Clone)]
pub struct Topic {
    pub mentor_id: i64,
    pub position: i32,
    pub title: String,
}

/// Who authored a persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// A single persisted chat message belonging to one (user, mentor) pair.
/// `created_at` establishes the total order within the pair.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: Uuid,
    pub mentor_id: i64,
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a subscription row. Transitions out of `Pending` happen
/// exactly once, driven by the payment gateway notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Pending,
    Settlement,
    Failed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Settlement => "settlement",
            SubscriptionStatus::Failed => "failed",
        }
    }
}

/// A paid access window for one (user, mentor) pair.
///
/// The user is entitled iff at least one row has `status = Settlement`
/// and `expires_at` is in the future.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub user_id: Uuid,
    pub mentor_id: i64,
    pub order_id: String,
    pub status: SubscriptionStatus,
    pub expires_at: DateTime<Utc>,
    pub gross_amount: i64,
    pub net_amount: i64,
    pub platform_fee: i64,
    pub created_at: DateTime<Utc>,
}

/// The role tag a message carries when handed to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One role-tagged entry of the conversation context sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnMessage {
    pub role: ChatRole,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Optional caller-supplied context about the user's business, carried on
/// every chat request and woven into the instruction block.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub business_type: Option<String>,
    pub first_name: Option<String>,
    pub business_snapshot: Option<String>,
}
