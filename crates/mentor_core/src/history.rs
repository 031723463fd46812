//! crates/mentor_core/src/history.rs
//!
//! Converts recent chat rows into the ordered, role-tagged message window
//! handed to the phase classifier and prompt composer.

use crate::domain::{ChatMessage, ChatRole, Sender, TurnMessage};

/// How many recent messages are considered when building the context window.
pub const HISTORY_WINDOW: i64 = 10;

/// Builds the chronological context window from rows fetched newest-first.
///
/// The just-submitted inbound message is persisted before this window is
/// read, so its row would otherwise duplicate into its own context. Only the
/// most recent user entry matching `exclude_content` is dropped: earlier
/// legitimate repeats of the same text are genuine history and stay in.
pub fn build_window(recent_newest_first: &[ChatMessage], exclude_content: &str) -> Vec<TurnMessage> {
    let mut window: Vec<TurnMessage> = recent_newest_first
        .iter()
        .rev()
        .map(|row| TurnMessage {
            role: match row.sender {
                Sender::User => ChatRole::User,
                Sender::Assistant => ChatRole::Assistant,
            },
            content: row.content.clone(),
        })
        .collect();

    let last_duplicate = window
        .iter()
        .rposition(|turn| turn.role == ChatRole::User && turn.content == exclude_content);
    if let Some(index) = last_duplicate {
        window.remove(index);
    }

    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn row(id: i64, sender: Sender, content: &str) -> ChatMessage {
        ChatMessage {
            id,
            user_id: Uuid::nil(),
            mentor_id: 1,
            sender,
            content: content.to_string(),
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        }
    }

    #[test]
    fn reverses_to_chronological_order_and_maps_roles() {
        // Store order: newest first.
        let rows = vec![
            row(3, Sender::Assistant, "reply"),
            row(2, Sender::User, "question"),
            row(1, Sender::Assistant, "hello"),
        ];
        let window = build_window(&rows, "something else");
        assert_eq!(
            window,
            vec![
                TurnMessage::assistant("hello"),
                TurnMessage::user("question"),
                TurnMessage::assistant("reply"),
            ]
        );
    }

    #[test]
    fn empty_history_yields_empty_window() {
        assert!(build_window(&[], "hi").is_empty());
    }

    #[test]
    fn drops_only_the_most_recent_duplicate_of_the_current_message() {
        // The user asked the same thing twice; only the just-inserted row
        // (the newest match) may be excluded.
        let rows = vec![
            row(4, Sender::User, "what is pricing?"),
            row(3, Sender::Assistant, "earlier answer"),
            row(2, Sender::User, "what is pricing?"),
            row(1, Sender::Assistant, "hello"),
        ];
        let window = build_window(&rows, "what is pricing?");
        assert_eq!(
            window,
            vec![
                TurnMessage::assistant("hello"),
                TurnMessage::user("what is pricing?"),
                TurnMessage::assistant("earlier answer"),
            ]
        );
    }

    #[test]
    fn assistant_rows_matching_the_current_text_are_kept() {
        let rows = vec![row(1, Sender::Assistant, "echo")];
        let window = build_window(&rows, "echo");
        assert_eq!(window, vec![TurnMessage::assistant("echo")]);
    }
}
