//! services/api/src/web/chat.rs
//!
//! The asynchronous "worker" function responsible for handling a single chat
//! turn: entitlement gate, inbound recording, phase classification, prompt
//! composition, the model call, and outbound recording.

use crate::web::state::AppState;
use chrono::Utc;
use mentor_core::{
    domain::{Mentor, Sender, UserProfile},
    entitlement::{self, Entitlement},
    history::{self, HISTORY_WINDOW},
    knowledge, phase,
    ports::{PortError, PortResult},
    prompt,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// The fixed reply recorded and returned when the completion service fails.
/// A broken model call must not corrupt history ordering or orphan the turn.
pub const FALLBACK_REPLY: &str =
    "Sorry, the system is busy right now. Please try again in a moment.";

/// What a completed turn hands back to the HTTP layer.
/// `LimitReached` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply { mentor_name: String, reply: String },
    LimitReached { usage: u64 },
}

/// Runs one full chat turn for a (user, mentor) pair.
pub async fn run_chat_turn(
    state: &AppState,
    user_id: Uuid,
    mentor_id: i64,
    message: &str,
    profile: &UserProfile,
) -> PortResult<TurnOutcome> {
    let now = Utc::now();

    // The gate runs before anything else; the model is never invoked for an
    // unentitled turn, and a failed gating read fails the whole turn.
    let verdict = entitlement::evaluate(state.store.as_ref(), user_id, mentor_id, now).await?;

    // The inbound message is recorded whatever the verdict, keeping the
    // quota count monotonic across denied turns.
    state
        .store
        .append_message(user_id, mentor_id, Sender::User, message)
        .await?;

    if let Entitlement::Exhausted { used } = verdict {
        info!(%user_id, mentor_id, used, "free quota exhausted, soft-denying the turn");
        return Ok(TurnOutcome::LimitReached { usage: used });
    }

    // Read-only fetches with no ordering dependency among them.
    let (mentor_result, chunks_result, topics_result, recent_result) = tokio::join!(
        state.store.mentor_by_id(mentor_id),
        state.store.knowledge_for_mentor(mentor_id),
        state.store.topics_for_mentor(mentor_id),
        state
            .store
            .recent_messages(user_id, mentor_id, HISTORY_WINDOW),
    );

    let mentor = match mentor_result {
        Ok(mentor) => mentor,
        Err(PortError::NotFound(_)) => {
            warn!(mentor_id, "mentor row missing, using the fallback persona");
            Mentor::fallback(mentor_id)
        }
        Err(e) => return Err(e),
    };
    let knowledge_text = knowledge::assemble(&chunks_result?);
    let topics = topics_result?;
    let window = history::build_window(&recent_result?, message);

    let decision = phase::classify(&window, message, &topics, profile);
    info!(?decision, "classified turn");

    let composed = prompt::compose(
        &mentor,
        &knowledge_text,
        &decision,
        &topics,
        &window,
        message,
        profile,
    );

    let reply = match state
        .completion
        .complete(&composed.instruction, &composed.turns)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "completion failed, substituting the fail-soft reply");
            FALLBACK_REPLY.to_string()
        }
    };

    // The reply already exists; losing the outbound row costs the next
    // turn's context, not this one's response.
    if let Err(e) = state
        .store
        .append_message(user_id, mentor_id, Sender::Assistant, &reply)
        .await
    {
        warn!(error = %e, "failed to record the outbound reply, returning it anyway");
    }

    Ok(TurnOutcome::Reply {
        mentor_name: mentor.name,
        reply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use mentor_core::domain::{ChatMessage, KnowledgeChunk, Subscription, SubscriptionStatus, Topic, TurnMessage};
    use mentor_core::entitlement::FREE_QUOTA;
    use mentor_core::ports::{CompletionService, NewSubscription, RecordStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// An in-memory store fake covering everything the turn touches.
    #[derive(Default)]
    struct MemoryStore {
        messages: Mutex<Vec<ChatMessage>>,
        chunks: Vec<String>,
        topics: Vec<String>,
        mentor: Option<Mentor>,
        subscribed: AtomicBool,
    }

    impl MemoryStore {
        fn with_mentor(mut self, mentor: Mentor) -> Self {
            self.mentor = Some(mentor);
            self
        }

        fn user_rows(&self) -> usize {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.sender == Sender::User)
                .count()
        }

        fn assistant_rows(&self) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.sender == Sender::Assistant)
                .map(|m| m.content.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn mentor_by_id(&self, mentor_id: i64) -> PortResult<Mentor> {
            self.mentor
                .clone()
                .ok_or_else(|| PortError::NotFound(format!("Mentor {} not found", mentor_id)))
        }

        async fn search_mentors(&self, _keyword: Option<&str>) -> PortResult<Vec<Mentor>> {
            Ok(self.mentor.clone().into_iter().collect())
        }

        async fn knowledge_for_mentor(&self, mentor_id: i64) -> PortResult<Vec<KnowledgeChunk>> {
            Ok(self
                .chunks
                .iter()
                .enumerate()
                .map(|(i, content)| KnowledgeChunk {
                    mentor_id,
                    position: i as i32,
                    content: content.clone(),
                })
                .collect())
        }

        async fn topics_for_mentor(&self, mentor_id: i64) -> PortResult<Vec<Topic>> {
            Ok(self
                .topics
                .iter()
                .enumerate()
                .map(|(i, title)| Topic {
                    mentor_id,
                    position: i as i32,
                    title: title.clone(),
                })
                .collect())
        }

        async fn replace_knowledge(
            &self,
            _mentor_id: i64,
            _chunks: &[String],
            _topics: &[String],
        ) -> PortResult<()> {
            Ok(())
        }

        async fn recent_messages(
            &self,
            _user_id: Uuid,
            _mentor_id: i64,
            limit: i64,
        ) -> PortResult<Vec<ChatMessage>> {
            let messages = self.messages.lock().unwrap();
            Ok(messages.iter().rev().take(limit as usize).cloned().collect())
        }

        async fn full_history(
            &self,
            _user_id: Uuid,
            _mentor_id: i64,
        ) -> PortResult<Vec<ChatMessage>> {
            Ok(self.messages.lock().unwrap().clone())
        }

        async fn count_user_messages(&self, _user_id: Uuid, _mentor_id: i64) -> PortResult<u64> {
            Ok(self.user_rows() as u64)
        }

        async fn append_message(
            &self,
            user_id: Uuid,
            mentor_id: i64,
            sender: Sender,
            content: &str,
        ) -> PortResult<()> {
            let mut messages = self.messages.lock().unwrap();
            let id = messages.len() as i64 + 1;
            let created_at = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(id);
            messages.push(ChatMessage {
                id,
                user_id,
                mentor_id,
                sender,
                content: content.to_string(),
                created_at,
            });
            Ok(())
        }

        async fn has_active_subscription(
            &self,
            _user_id: Uuid,
            _mentor_id: i64,
            _now: DateTime<Utc>,
        ) -> PortResult<bool> {
            Ok(self.subscribed.load(Ordering::SeqCst))
        }

        async fn insert_subscription(
            &self,
            _subscription: NewSubscription,
        ) -> PortResult<Subscription> {
            Err(PortError::Unexpected("not used in these tests".to_string()))
        }

        async fn apply_payment_status(
            &self,
            _order_id: &str,
            _status: SubscriptionStatus,
        ) -> PortResult<()> {
            Ok(())
        }
    }

    /// A completion fake that either echoes a canned reply or always fails.
    struct FakeCompletion {
        fail: bool,
    }

    #[async_trait]
    impl CompletionService for FakeCompletion {
        async fn complete(
            &self,
            _instruction: &str,
            _turns: &[TurnMessage],
        ) -> PortResult<String> {
            if self.fail {
                Err(PortError::Completion("model unavailable".to_string()))
            } else {
                Ok("a model-generated reply".to_string())
            }
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:3000".parse().unwrap(),
            database_url: "postgres://unused".to_string(),
            log_level: tracing::Level::INFO,
            completion_api_key: None,
            completion_api_base: "http://unused".to_string(),
            completion_model: "test-model".to_string(),
            completion_temperature: 0.1,
            completion_max_tokens: 100,
            completion_timeout_secs: 5,
            payment_server_key: None,
            payment_base_url: "http://unused".to_string(),
            subscription_days: 30,
            platform_fee_percent: 10,
        }
    }

    fn state_with(store: Arc<MemoryStore>, fail_completion: bool) -> AppState {
        AppState {
            store,
            completion: Arc::new(FakeCompletion {
                fail: fail_completion,
            }),
            payment: None,
            config: Arc::new(test_config()),
        }
    }

    fn mentor() -> Mentor {
        Mentor {
            id: 1,
            name: "Rina".to_string(),
            personality: "Direct".to_string(),
            expertise: "F&B".to_string(),
            category: "F&B".to_string(),
            price_per_month: 100_000,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn quota_is_enforced_then_lifted_by_a_settled_subscription() {
        let store = Arc::new(MemoryStore::default().with_mentor(mentor()));
        let state = state_with(store.clone(), false);
        let user = Uuid::new_v4();

        // Messages 1..=FREE_QUOTA get normal replies.
        for i in 0..FREE_QUOTA {
            let outcome = run_chat_turn(&state, user, 1, &format!("message {}", i), &UserProfile::default())
                .await
                .unwrap();
            assert!(matches!(outcome, TurnOutcome::Reply { .. }), "turn {}", i);
        }

        // The next one is soft-denied with the pre-recording usage figure.
        let denied = run_chat_turn(&state, user, 1, "one more", &UserProfile::default())
            .await
            .unwrap();
        assert_eq!(denied, TurnOutcome::LimitReached { usage: FREE_QUOTA });

        // The denied inbound message was still recorded.
        assert_eq!(store.user_rows() as u64, FREE_QUOTA + 1);

        // A settled subscription bypasses the quota entirely.
        store.subscribed.store(true, Ordering::SeqCst);
        let outcome = run_chat_turn(&state, user, 1, "back again", &UserProfile::default())
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply { .. }));
    }

    #[tokio::test]
    async fn completion_failure_is_recorded_and_returned_as_the_fallback_reply() {
        let store = Arc::new(MemoryStore::default().with_mentor(mentor()));
        let state = state_with(store.clone(), true);
        let user = Uuid::new_v4();

        let outcome = run_chat_turn(&state, user, 1, "hello", &UserProfile::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                mentor_name: "Rina".to_string(),
                reply: FALLBACK_REPLY.to_string(),
            }
        );

        // Exactly one assistant row, holding the fallback text.
        assert_eq!(store.assistant_rows(), vec![FALLBACK_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn missing_mentor_degrades_to_the_fallback_persona() {
        let store = Arc::new(MemoryStore::default()); // no mentor row
        let state = state_with(store, false);

        let outcome = run_chat_turn(&state, Uuid::new_v4(), 42, "hello", &UserProfile::default())
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Reply { mentor_name, .. } => assert_eq!(mentor_name, "Mentor"),
            other => panic!("expected a reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn both_turn_sides_are_persisted_in_order() {
        let store = Arc::new(MemoryStore::default().with_mentor(mentor()));
        let state = state_with(store.clone(), false);

        run_chat_turn(&state, Uuid::new_v4(), 1, "first question", &UserProfile::default())
            .await
            .unwrap();

        let messages = store.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert!(messages[0].created_at < messages[1].created_at);
    }
}
