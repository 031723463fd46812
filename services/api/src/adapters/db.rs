//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `RecordStore` port from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mentor_core::domain::{
    ChatMessage, KnowledgeChunk, Mentor, Sender, Subscription, SubscriptionStatus, Topic,
};
use mentor_core::ports::{NewSubscription, PortError, PortResult, RecordStore};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Store read/write failures gate the whole turn, so they all map to
/// `Unavailable` rather than a generic unexpected error.
fn store_err(e: sqlx::Error) -> PortError {
    PortError::Unavailable(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct MentorRecord {
    id: i64,
    name: String,
    personality: String,
    expertise: String,
    category: String,
    price_per_month: i64,
    is_active: bool,
}
impl MentorRecord {
    fn to_domain(self) -> Mentor {
        Mentor {
            id: self.id,
            name: self.name,
            personality: self.personality,
            expertise: self.expertise,
            category: self.category,
            price_per_month: self.price_per_month,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct ChunkRecord {
    mentor_id: i64,
    position: i32,
    content: String,
}
impl ChunkRecord {
    fn to_domain(self) -> KnowledgeChunk {
        KnowledgeChunk {
            mentor_id: self.mentor_id,
            position: self.position,
            content: self.content,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    mentor_id: i64,
    position: i32,
    title: String,
}
impl TopicRecord {
    fn to_domain(self) -> Topic {
        Topic {
            mentor_id: self.mentor_id,
            position: self.position,
            title: self.title,
        }
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: i64,
    user_id: Uuid,
    mentor_id: i64,
    sender: String,
    message: String,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> ChatMessage {
        // The schema CHECK constraint admits only these two values.
        let sender = if self.sender == "user" {
            Sender::User
        } else {
            Sender::Assistant
        };
        ChatMessage {
            id: self.id,
            user_id: self.user_id,
            mentor_id: self.mentor_id,
            sender,
            content: self.message,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SubscriptionRecord {
    id: i64,
    user_id: Uuid,
    mentor_id: i64,
    order_id: String,
    status: String,
    expires_at: DateTime<Utc>,
    gross_amount: i64,
    net_amount: i64,
    platform_fee: i64,
    created_at: DateTime<Utc>,
}
impl SubscriptionRecord {
    fn to_domain(self) -> Subscription {
        let status = match self.status.as_str() {
            "settlement" => SubscriptionStatus::Settlement,
            "failed" => SubscriptionStatus::Failed,
            _ => SubscriptionStatus::Pending,
        };
        Subscription {
            id: self.id,
            user_id: self.user_id,
            mentor_id: self.mentor_id,
            order_id: self.order_id,
            status,
            expires_at: self.expires_at,
            gross_amount: self.gross_amount,
            net_amount: self.net_amount,
            platform_fee: self.platform_fee,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for PgStore {
    async fn mentor_by_id(&self, mentor_id: i64) -> PortResult<Mentor> {
        let record = sqlx::query_as::<_, MentorRecord>(
            "SELECT id, name, personality, expertise, category, price_per_month, is_active \
             FROM mentors WHERE id = $1",
        )
        .bind(mentor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        record
            .map(MentorRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Mentor {} not found", mentor_id)))
    }

    async fn search_mentors(&self, keyword: Option<&str>) -> PortResult<Vec<Mentor>> {
        let records = match keyword {
            Some(keyword) => {
                let pattern = format!("%{}%", keyword);
                sqlx::query_as::<_, MentorRecord>(
                    "SELECT id, name, personality, expertise, category, price_per_month, is_active \
                     FROM mentors \
                     WHERE is_active \
                       AND (name ILIKE $1 OR expertise ILIKE $1 OR category ILIKE $1) \
                     ORDER BY id",
                )
                .bind(pattern)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, MentorRecord>(
                    "SELECT id, name, personality, expertise, category, price_per_month, is_active \
                     FROM mentors WHERE is_active ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(store_err)?;

        Ok(records.into_iter().map(MentorRecord::to_domain).collect())
    }

    async fn knowledge_for_mentor(&self, mentor_id: i64) -> PortResult<Vec<KnowledgeChunk>> {
        let records = sqlx::query_as::<_, ChunkRecord>(
            "SELECT mentor_id, position, content FROM knowledge_chunks \
             WHERE mentor_id = $1 ORDER BY position",
        )
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(records.into_iter().map(ChunkRecord::to_domain).collect())
    }

    async fn topics_for_mentor(&self, mentor_id: i64) -> PortResult<Vec<Topic>> {
        let records = sqlx::query_as::<_, TopicRecord>(
            "SELECT mentor_id, position, title FROM mentor_topics \
             WHERE mentor_id = $1 ORDER BY position",
        )
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(records.into_iter().map(TopicRecord::to_domain).collect())
    }

    async fn replace_knowledge(
        &self,
        mentor_id: i64,
        chunks: &[String],
        topics: &[String],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query("DELETE FROM knowledge_chunks WHERE mentor_id = $1")
            .bind(mentor_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM mentor_topics WHERE mentor_id = $1")
            .bind(mentor_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        for (position, content) in chunks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO knowledge_chunks (mentor_id, position, content) VALUES ($1, $2, $3)",
            )
            .bind(mentor_id)
            .bind(position as i32)
            .bind(content)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        for (position, title) in topics.iter().enumerate() {
            sqlx::query(
                "INSERT INTO mentor_topics (mentor_id, position, title) VALUES ($1, $2, $3)",
            )
            .bind(mentor_id)
            .bind(position as i32)
            .bind(title)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: Uuid,
        mentor_id: i64,
        limit: i64,
    ) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, user_id, mentor_id, sender, message, created_at FROM chat_history \
             WHERE user_id = $1 AND mentor_id = $2 \
             ORDER BY created_at DESC, id DESC LIMIT $3",
        )
        .bind(user_id)
        .bind(mentor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(records
            .into_iter()
            .map(ChatMessageRecord::to_domain)
            .collect())
    }

    async fn full_history(&self, user_id: Uuid, mentor_id: i64) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, user_id, mentor_id, sender, message, created_at FROM chat_history \
             WHERE user_id = $1 AND mentor_id = $2 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(records
            .into_iter()
            .map(ChatMessageRecord::to_domain)
            .collect())
    }

    async fn count_user_messages(&self, user_id: Uuid, mentor_id: i64) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_history \
             WHERE user_id = $1 AND mentor_id = $2 AND sender = 'user'",
        )
        .bind(user_id)
        .bind(mentor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(count as u64)
    }

    async fn append_message(
        &self,
        user_id: Uuid,
        mentor_id: i64,
        sender: Sender,
        content: &str,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_history (user_id, mentor_id, sender, message) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(mentor_id)
        .bind(sender.as_str())
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn has_active_subscription(
        &self,
        user_id: Uuid,
        mentor_id: i64,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM subscriptions \
                 WHERE user_id = $1 AND mentor_id = $2 \
                   AND status = 'settlement' AND expires_at > $3 \
             )",
        )
        .bind(user_id)
        .bind(mentor_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(exists)
    }

    async fn insert_subscription(&self, subscription: NewSubscription) -> PortResult<Subscription> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            "INSERT INTO subscriptions \
                 (user_id, mentor_id, order_id, expires_at, gross_amount, net_amount, platform_fee) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, user_id, mentor_id, order_id, status, expires_at, \
                       gross_amount, net_amount, platform_fee, created_at",
        )
        .bind(subscription.user_id)
        .bind(subscription.mentor_id)
        .bind(&subscription.order_id)
        .bind(subscription.expires_at)
        .bind(subscription.gross_amount)
        .bind(subscription.net_amount)
        .bind(subscription.platform_fee)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(record.to_domain())
    }

    async fn apply_payment_status(
        &self,
        order_id: &str,
        status: SubscriptionStatus,
    ) -> PortResult<()> {
        // Settled and failed rows are immutable; only pending rows move.
        sqlx::query("UPDATE subscriptions SET status = $1 WHERE order_id = $2 AND status = 'pending'")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
