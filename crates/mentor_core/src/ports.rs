//! crates/mentor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases,
//! completion services, or payment gateways.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, KnowledgeChunk, Mentor, Sender, Subscription, SubscriptionStatus, Topic,
    TurnMessage,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The record store could not be read or written. Gating reads must
    /// propagate this; the model is never invoked on top of it.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The completion service failed or timed out. Recovered locally with a
    /// fixed fail-soft reply, never surfaced to the caller.
    #[error("Completion failure: {0}")]
    Completion(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Record Store Port
//=========================================================================================

/// Filtered read and insert access to the persisted entities. The chat
/// controller treats this as an external transactional-ish service: no
/// in-process caching, every turn re-reads mentor, knowledge, and history.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Mentors ---
    async fn mentor_by_id(&self, mentor_id: i64) -> PortResult<Mentor>;

    async fn search_mentors(&self, keyword: Option<&str>) -> PortResult<Vec<Mentor>>;

    // --- Knowledge and curriculum ---
    async fn knowledge_for_mentor(&self, mentor_id: i64) -> PortResult<Vec<KnowledgeChunk>>;

    async fn topics_for_mentor(&self, mentor_id: i64) -> PortResult<Vec<Topic>>;

    /// Replaces a mentor's knowledge chunks and ordered topic list wholesale.
    /// Re-uploading a document resets both, never merges.
    async fn replace_knowledge(
        &self,
        mentor_id: i64,
        chunks: &[String],
        topics: &[String],
    ) -> PortResult<()>;

    // --- Chat history ---
    /// The most recent messages for the pair, newest first.
    async fn recent_messages(
        &self,
        user_id: Uuid,
        mentor_id: i64,
        limit: i64,
    ) -> PortResult<Vec<ChatMessage>>;

    /// The full transcript for the pair, oldest first.
    async fn full_history(&self, user_id: Uuid, mentor_id: i64) -> PortResult<Vec<ChatMessage>>;

    async fn count_user_messages(&self, user_id: Uuid, mentor_id: i64) -> PortResult<u64>;

    /// Append-only; no updates or merges. Called twice per turn (inbound,
    /// then outbound) so the inbound timestamp precedes the outbound one.
    async fn append_message(
        &self,
        user_id: Uuid,
        mentor_id: i64,
        sender: Sender,
        content: &str,
    ) -> PortResult<()>;

    // --- Subscriptions ---
    async fn has_active_subscription(
        &self,
        user_id: Uuid,
        mentor_id: i64,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn insert_subscription(&self, subscription: NewSubscription) -> PortResult<Subscription>;

    /// Applies the gateway's verdict to the row identified by `order_id`.
    /// Only rows still `pending` may transition; settled or failed rows are
    /// immutable.
    async fn apply_payment_status(
        &self,
        order_id: &str,
        status: SubscriptionStatus,
    ) -> PortResult<()>;
}

/// The fields of a subscription row created at payment-intent time.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub mentor_id: i64,
    pub order_id: String,
    pub expires_at: DateTime<Utc>,
    pub gross_amount: i64,
    pub net_amount: i64,
    pub platform_fee: i64,
}

//=========================================================================================
// Completion Service Port
//=========================================================================================

/// A black-box text-completion service. `instruction` becomes the system
/// turn; `turns` is the prior history plus the current user message.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, instruction: &str, turns: &[TurnMessage]) -> PortResult<String>;
}

//=========================================================================================
// Payment Gateway Port
//=========================================================================================

/// The order handed to the payment gateway at intent creation.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub order_id: String,
    pub gross_amount: i64,
    pub email: String,
    pub first_name: String,
}

/// The gateway's checkout handle returned to the caller.
#[derive(Debug, Clone)]
pub struct PaymentToken {
    pub token: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a checkout transaction for the given order.
    async fn create_transaction(&self, order: &PaymentOrder) -> PortResult<PaymentToken>;
}
