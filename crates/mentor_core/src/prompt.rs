//! crates/mentor_core/src/prompt.rs
//!
//! Builds the instruction block and message sequence handed to the
//! completion service. The directive text for each phase is data, not
//! branching prose: the classifier decides the phase, the composer only
//! renders directives conditioned on that decision.
//!
//! `compose` is a pure function of its inputs. Identical inputs always yield
//! an identical instruction block; only the model's sampling introduces
//! non-determinism downstream.

use crate::domain::{Mentor, Topic, TurnMessage, UserProfile};
use crate::phase::{Deflection, Phase, PhaseDecision};

/// The instruction block plus the ordered message list for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub instruction: String,
    pub turns: Vec<TurnMessage>,
}

/// Per-phase rendering profile. `knowledge_limit` bounds the knowledge
/// prefix carried in the instruction block; the opening turns only need the
/// mentor's background, which ingestion keeps at the head of the document.
struct PhaseProfile {
    heading: &'static str,
    directive: &'static str,
    knowledge_limit: Option<usize>,
}

const OPENING_KNOWLEDGE_LIMIT: usize = 2_000;

const OPENING_PROFILE: PhaseProfile = PhaseProfile {
    heading: "CURRENT PHASE: OPENING",
    directive: "\
This conversation has just begun. Before anything else you must learn two \
things from the user, in two separate user replies: (1) the specific problem \
they want addressed, and (2) the outcome they want to reach. Introduce \
yourself using the background at the top of the KNOWLEDGE BASE, then ask for \
whichever of the two facts is still missing. Do not teach any material yet, \
no matter what the user asks for.",
    knowledge_limit: Some(OPENING_KNOWLEDGE_LIMIT),
};

const GATHERING_PROFILE: PhaseProfile = PhaseProfile {
    heading: "CURRENT PHASE: DATA GATHERING",
    directive: "\
The user asked to be guided step by step but has not described their \
business yet. Reply only with a request for a short business profile: name, \
product, and target customer. Stop there. Do not explain any material until \
those details arrive.",
    knowledge_limit: Some(OPENING_KNOWLEDGE_LIMIT),
};

const TEACHING_PROFILE: PhaseProfile = PhaseProfile {
    heading: "CURRENT PHASE: SEQUENTIAL TEACHING",
    directive: "\
Teach exactly one topic this turn: \"{current_topic}\".

The curriculum, in strict order:
{sequence}

Copy the material for \"{current_topic}\" from the KNOWLEDGE BASE in full, \
without summarizing, then add one sentence connecting it to the user's \
business. {closing_line}",
    knowledge_limit: None,
};

const CLOSING_PROFILE: PhaseProfile = PhaseProfile {
    heading: "CURRENT PHASE: CLOSING",
    directive: "\
Every topic in the curriculum has been covered. Ask whether the user's \
original problem is now resolved, and invite further questions about any \
covered topic.",
    knowledge_limit: None,
};

const TEACHING_CLOSING_LINE: &str = "\
End your reply with: \"That was {current_topic}. Shall we move on to \
{next_topic}?\"";

const TEACHING_FINAL_LINE: &str = "\
This is the final topic. End by asking whether the user's original problem \
is now addressed.";

const DEFLECT_COVERED_TEMPLATE: &str = "\
REDIRECT: The user is asking about \"{requested_topic}\", which was already \
covered. Do not re-teach it. Redirect in one or two sentences and restate \
the current topic, \"{current_topic}\".";

const DEFLECT_AHEAD_TEMPLATE: &str = "\
REDIRECT: The user is asking about \"{requested_topic}\", which the sequence \
has not reached yet. Do not teach it now. Say it will come in its turn and \
restate the current topic, \"{current_topic}\".";

const REVISIT_TEMPLATE: &str = "\
REVISIT: The user explicitly asked to return to \"{requested_topic}\". \
Answer that request this once, from the KNOWLEDGE BASE, then steer back to \
{resume_point}. The sequence position does not change.";

const MATH_DIRECTIVE: &str = "\
MATH MODE: The user's message contains numbers. Apply the applicable \
formulas from the KNOWLEDGE BASE to those numbers, show the calculation, \
and state the result plainly.";

const UNIVERSAL_CONSTRAINTS: &str = "\
HARD RULES:
- Never combine two topics in one reply.
- Never skip the opening questions.
- If the user asks for all steps or a complete list, write out every item; \
never shorten or summarize a requested enumeration.
- Never state a numeric result that does not follow from the formulas in \
the KNOWLEDGE BASE.";

const NO_KNOWLEDGE_NOTICE: &str = "\
(No material has been uploaded for this mentor yet. Keep replies general \
and say openly that detailed material is not available.)";

/// Builds the instruction block and the ordered message sequence.
///
/// Section order is fixed: persona, knowledge context, phase directives
/// (with redirect/revisit and math addenda), universal constraints.
pub fn compose(
    mentor: &Mentor,
    knowledge: &str,
    decision: &PhaseDecision,
    topics: &[Topic],
    history: &[TurnMessage],
    current_message: &str,
    profile: &UserProfile,
) -> ComposedPrompt {
    let phase_profile = profile_for(&decision.phase);

    let mut sections: Vec<String> = Vec::new();
    sections.push(persona_section(mentor));
    sections.push(knowledge_section(knowledge, phase_profile.knowledge_limit));
    if let Some(context) = user_context_section(profile) {
        sections.push(context);
    }

    let mut phase_section = format!(
        "{}\n{}",
        phase_profile.heading,
        phase_directive(decision, topics)
    );
    if let Some(overlay) = overlay_directive(decision, topics) {
        phase_section.push_str("\n\n");
        phase_section.push_str(&overlay);
    }
    if decision.wants_math {
        phase_section.push_str("\n\n");
        phase_section.push_str(MATH_DIRECTIVE);
    }
    sections.push(phase_section);
    sections.push(UNIVERSAL_CONSTRAINTS.to_string());

    let mut turns = history.to_vec();
    turns.push(TurnMessage::user(current_message));

    ComposedPrompt {
        instruction: sections.join("\n\n"),
        turns,
    }
}

fn profile_for(phase: &Phase) -> &'static PhaseProfile {
    match phase {
        Phase::Opening => &OPENING_PROFILE,
        Phase::Gathering => &GATHERING_PROFILE,
        Phase::Teaching { .. } => &TEACHING_PROFILE,
        Phase::Closing => &CLOSING_PROFILE,
    }
}

fn persona_section(mentor: &Mentor) -> String {
    format!(
        "ROLE: You are {}, a practicing business mentor.\nPERSONALITY: {}\nEXPERTISE: {}",
        mentor.name, mentor.personality, mentor.expertise
    )
}

fn knowledge_section(knowledge: &str, limit: Option<usize>) -> String {
    let body = if knowledge.trim().is_empty() {
        NO_KNOWLEDGE_NOTICE.to_string()
    } else {
        match limit {
            Some(max_chars) => truncate_on_char_boundary(knowledge, max_chars).to_string(),
            None => knowledge.to_string(),
        }
    };
    format!(
        "KNOWLEDGE BASE (SOURCE OF TRUTH):\n{}\n\nEverything you teach must come from the text \
         above. If the user asks for something it does not cover, decline and steer back to it.",
        body
    )
}

fn user_context_section(profile: &UserProfile) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(first_name) = &profile.first_name {
        lines.push(format!("The user's first name is {}.", first_name));
    }
    if let Some(business_type) = &profile.business_type {
        lines.push(format!("Their line of business: {}.", business_type));
    }
    if let Some(snapshot) = &profile.business_snapshot {
        lines.push(format!("Their business, in their words: {}.", snapshot));
    }
    if lines.is_empty() {
        None
    } else {
        Some(format!("USER CONTEXT:\n{}", lines.join("\n")))
    }
}

fn phase_directive(decision: &PhaseDecision, topics: &[Topic]) -> String {
    match decision.phase {
        Phase::Teaching { topic_index } => {
            let current = topic_title(topics, topic_index);
            let closing_line = match topics.get(topic_index + 1) {
                Some(next) => TEACHING_CLOSING_LINE
                    .replace("{current_topic}", current)
                    .replace("{next_topic}", &next.title),
                None => TEACHING_FINAL_LINE.to_string(),
            };
            TEACHING_PROFILE
                .directive
                .replace("{current_topic}", current)
                .replace("{sequence}", &sequence_listing(topics, topic_index))
                .replace("{closing_line}", &closing_line)
        }
        ref phase => profile_for(phase).directive.to_string(),
    }
}

fn overlay_directive(decision: &PhaseDecision, topics: &[Topic]) -> Option<String> {
    if let Some(deflection) = decision.deflection {
        let (template, requested) = match deflection {
            Deflection::AlreadyCovered { topic_index } => (DEFLECT_COVERED_TEMPLATE, topic_index),
            Deflection::NotYetReached { topic_index } => (DEFLECT_AHEAD_TEMPLATE, topic_index),
        };
        let current = match decision.phase {
            Phase::Teaching { topic_index } => topic_title(topics, topic_index),
            _ => "the current phase",
        };
        return Some(
            template
                .replace("{requested_topic}", topic_title(topics, requested))
                .replace("{current_topic}", current),
        );
    }

    if let Some(requested) = decision.revisit {
        let resume_point = match decision.phase {
            Phase::Teaching { topic_index } => {
                format!("the current topic, \"{}\"", topic_title(topics, topic_index))
            }
            _ => "wrapping up".to_string(),
        };
        return Some(
            REVISIT_TEMPLATE
                .replace("{requested_topic}", topic_title(topics, requested))
                .replace("{resume_point}", &resume_point),
        );
    }

    None
}

fn topic_title(topics: &[Topic], index: usize) -> &str {
    topics.get(index).map(|t| t.title.as_str()).unwrap_or("")
}

/// The numbered curriculum with progress markers, as shown to the model.
fn sequence_listing(topics: &[Topic], current: usize) -> String {
    topics
        .iter()
        .enumerate()
        .map(|(index, topic)| {
            let marker = if index < current {
                " (covered)"
            } else if index == current {
                " (current)"
            } else {
                ""
            };
            format!("{}. {}{}", index + 1, topic.title, marker)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncates to at most `max_chars` bytes without splitting a UTF-8
/// character.
fn truncate_on_char_boundary(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut cut = max_chars;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}
