//! crates/mentor_core/src/phase.rs
//!
//! Classifies a conversation into its current phase from the role-tagged
//! history window. The phase is derived fresh on every turn and never
//! persisted: all conversational state lives in the message log.
//!
//! Transitions are strictly forward and driven only by the presence-count of
//! user messages (opening gate), by which topics appear in assistant-authored
//! content (teaching step advancement), and by the total topic count being
//! reached (closing). The only backward movement is an explicit
//! user-requested revisit, which answers one-off without moving the cursor.

use crate::domain::{ChatRole, Topic, TurnMessage, UserProfile};

/// The discrete label for where a conversation stands in the
/// opening/teaching/closing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fewer than two prior user messages: elicit the user's specific
    /// problem and desired outcome. No teaching content yet.
    Opening,
    /// The user asked for step-by-step guidance but has not yet described
    /// their business. Request that context, withhold teaching content.
    Gathering,
    /// Teach exactly the one topic at `topic_index`, nothing else.
    Teaching { topic_index: usize },
    /// Every topic has been taught at least once: ask whether the original
    /// problem is resolved and invite further questions.
    Closing,
}

/// An off-scope request detected in the current message. The reply must
/// redirect instead of satisfying it; the phase never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deflection {
    /// The user asked for material already covered, without asking to
    /// revisit it explicitly.
    AlreadyCovered { topic_index: usize },
    /// The user asked for material the sequence has not reached yet.
    NotYetReached { topic_index: usize },
}

/// The classifier's full verdict for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDecision {
    pub phase: Phase,
    pub deflection: Option<Deflection>,
    /// An explicit, deflection-exempt request to revisit an already-taught
    /// topic. Answered one-off; the cursor does not move.
    pub revisit: Option<usize>,
    /// Numeric content in the current message. A soft signal for the prompt
    /// composer (execute applicable formulas), never phase-affecting.
    pub wants_math: bool,
}

/// Phrases that signal the user wants to be led step by step.
const GUIDANCE_MARKERS: &[&str] = &[
    "step by step",
    "step-by-step",
    "guide me",
    "walk me through",
    "the steps",
    "where do i start",
    "how do i start",
    "from the beginning",
];

/// Phrases that make a backward topic reference an explicit revisit.
const REVISIT_MARKERS: &[&str] = &[
    "again",
    "repeat",
    "go back",
    "revisit",
    "once more",
    "one more time",
    "refresh my memory",
];

pub fn classify(
    history: &[TurnMessage],
    current_message: &str,
    topics: &[Topic],
    profile: &UserProfile,
) -> PhaseDecision {
    let wants_math = current_message.chars().any(|c| c.is_ascii_digit());
    let current_lower = current_message.to_lowercase();

    // Opening gate: two distinct user turns are required before anything is
    // taught. A single message that happens to state both the problem and
    // the goal does not short-circuit the gate.
    if count_user_turns(history) < 2 {
        return PhaseDecision {
            phase: Phase::Opening,
            deflection: None,
            revisit: None,
            wants_math,
        };
    }

    let next = next_topic_index(history, topics);

    if next >= topics.len() {
        // Everything taught (vacuously so for an empty curriculum). Explicit
        // revisits stay possible; anything else is open consultation.
        let revisit = if contains_any(&current_lower, REVISIT_MARKERS) {
            referenced_topics(&current_lower, topics).into_iter().next()
        } else {
            None
        };
        return PhaseDecision {
            phase: Phase::Closing,
            deflection: None,
            revisit,
            wants_math,
        };
    }

    // Before the first topic, a guidance request without business context
    // diverts into data gathering. A snapshot on the request profile counts
    // as context already supplied.
    if next == 0
        && contains_any(&current_lower, GUIDANCE_MARKERS)
        && profile.business_snapshot.is_none()
    {
        return PhaseDecision {
            phase: Phase::Gathering,
            deflection: None,
            revisit: None,
            wants_math,
        };
    }

    let mut deflection = None;
    let mut revisit = None;
    if let Some(requested) = referenced_topics(&current_lower, topics)
        .into_iter()
        .find(|&index| index != next)
    {
        if requested < next {
            if contains_any(&current_lower, REVISIT_MARKERS) {
                revisit = Some(requested);
            } else {
                deflection = Some(Deflection::AlreadyCovered {
                    topic_index: requested,
                });
            }
        } else {
            deflection = Some(Deflection::NotYetReached {
                topic_index: requested,
            });
        }
    }

    PhaseDecision {
        phase: Phase::Teaching { topic_index: next },
        deflection,
        revisit,
        wants_math,
    }
}

fn count_user_turns(history: &[TurnMessage]) -> usize {
    history
        .iter()
        .filter(|turn| turn.role == ChatRole::User)
        .count()
}

/// The index of the next topic to teach: one past the highest topic the most
/// recent topic-bearing assistant message covered, or zero when no assistant
/// message has covered any topic yet. Advancing from the newest evidence
/// only is what forbids both regression and skipping.
fn next_topic_index(history: &[TurnMessage], topics: &[Topic]) -> usize {
    for turn in history.iter().rev() {
        if turn.role != ChatRole::Assistant {
            continue;
        }
        let covered = referenced_topics(&turn.content.to_lowercase(), topics);
        if let Some(highest) = covered.into_iter().max() {
            return highest + 1;
        }
    }
    0
}

/// Topic indices whose titles occur in the given lowercased text, in
/// curriculum order.
fn referenced_topics(text_lower: &str, topics: &[Topic]) -> Vec<usize> {
    topics
        .iter()
        .enumerate()
        .filter(|(_, topic)| {
            let title = topic.title.trim().to_lowercase();
            !title.is_empty() && text_lower.contains(&title)
        })
        .map(|(index, _)| index)
        .collect()
}

fn contains_any(text_lower: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text_lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Vec<Topic> {
        [
            "What makes a good business",
            "Decision principles",
            "Risk rules",
            "Red flags",
            "Startup playbook",
        ]
        .iter()
        .enumerate()
        .map(|(i, title)| Topic {
            mentor_id: 1,
            position: i as i32,
            title: title.to_string(),
        })
        .collect()
    }

    fn profile() -> UserProfile {
        UserProfile::default()
    }

    #[test]
    fn empty_history_is_opening() {
        let decision = classify(&[], "Hello there", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Opening);
        assert_eq!(decision.deflection, None);
    }

    #[test]
    fn one_user_turn_stays_opening_even_with_both_facts_in_it() {
        // Problem and goal in one sentence still needs a second user turn.
        let history = vec![
            TurnMessage::user("My problem is low sales and my goal is to double revenue"),
            TurnMessage::assistant("Thanks! What outcome are you hoping for?"),
        ];
        let decision = classify(&history, "I already told you everything", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Opening);
    }

    #[test]
    fn two_user_turns_start_teaching_at_the_first_topic() {
        let history = vec![
            TurnMessage::user("I run a coffee cart and sales are flat"),
            TurnMessage::assistant("Got it. What outcome do you want?"),
            TurnMessage::user("I want steady weekly profit"),
            TurnMessage::assistant("Great, let's begin."),
        ];
        let decision = classify(&history, "Ready when you are", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 0 });
        assert_eq!(decision.deflection, None);
    }

    #[test]
    fn guidance_request_without_context_diverts_to_gathering() {
        let history = vec![
            TurnMessage::user("Sales are flat"),
            TurnMessage::assistant("What outcome do you want?"),
            TurnMessage::user("More profit"),
            TurnMessage::assistant("Understood."),
        ];
        let decision = classify(&history, "Please guide me step by step", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Gathering);
    }

    #[test]
    fn business_snapshot_on_the_request_skips_gathering() {
        let history = vec![
            TurnMessage::user("Sales are flat"),
            TurnMessage::assistant("What outcome do you want?"),
            TurnMessage::user("More profit"),
            TurnMessage::assistant("Understood."),
        ];
        let profile = UserProfile {
            business_snapshot: Some("Bean Cart, cold brew, office workers".to_string()),
            ..UserProfile::default()
        };
        let decision = classify(&history, "Please guide me step by step", &topics(), &profile);
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 0 });
    }

    #[test]
    fn advances_exactly_one_past_the_last_taught_topic() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant("Here is Decision principles, in full..."),
        ];
        let decision = classify(&history, "Continue please", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 2 });
    }

    #[test]
    fn a_message_covering_two_topics_advances_from_the_highest() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant(
                "Recap of What makes a good business, then Decision principles in detail.",
            ),
        ];
        let decision = classify(&history, "Go on", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 2 });
    }

    #[test]
    fn forward_request_deflects_without_advancing() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant("Here is What makes a good business."),
        ];
        let decision = classify(
            &history,
            "Skip ahead to the Startup playbook",
            &topics(),
            &profile(),
        );
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 1 });
        assert_eq!(
            decision.deflection,
            Some(Deflection::NotYetReached { topic_index: 4 })
        );
    }

    #[test]
    fn backward_request_without_revisit_marker_deflects() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant("Here is Decision principles."),
        ];
        let decision = classify(
            &history,
            "Tell me about What makes a good business",
            &topics(),
            &profile(),
        );
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 2 });
        assert_eq!(
            decision.deflection,
            Some(Deflection::AlreadyCovered { topic_index: 0 })
        );
        assert_eq!(decision.revisit, None);
    }

    #[test]
    fn explicit_revisit_is_deflection_exempt() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant("Here is Decision principles."),
        ];
        let decision = classify(
            &history,
            "Can we go back to What makes a good business again?",
            &topics(),
            &profile(),
        );
        assert_eq!(decision.phase, Phase::Teaching { topic_index: 2 });
        assert_eq!(decision.deflection, None);
        assert_eq!(decision.revisit, Some(0));
    }

    #[test]
    fn all_topics_taught_is_closing() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant("Finally, the Startup playbook, day by day..."),
        ];
        let decision = classify(&history, "Thanks!", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Closing);
    }

    #[test]
    fn empty_curriculum_closes_after_the_opening_gate() {
        let history = vec![
            TurnMessage::user("problem"),
            TurnMessage::assistant("ask goal"),
            TurnMessage::user("goal"),
            TurnMessage::assistant("Understood."),
        ];
        let decision = classify(&history, "So what now?", &[], &profile());
        assert_eq!(decision.phase, Phase::Closing);
    }

    #[test]
    fn digits_set_the_math_signal_without_touching_the_phase() {
        let decision = classify(&[], "My unit cost is 20000", &topics(), &profile());
        assert_eq!(decision.phase, Phase::Opening);
        assert!(decision.wants_math);

        let no_digits = classify(&[], "My unit cost is high", &topics(), &profile());
        assert!(!no_digits.wants_math);
    }
}
