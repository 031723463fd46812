pub mod domain;
pub mod entitlement;
pub mod history;
pub mod knowledge;
pub mod phase;
pub mod ports;
pub mod prompt;

pub use domain::{
    ChatMessage, ChatRole, KnowledgeChunk, Mentor, Sender, Subscription, SubscriptionStatus,
    Topic, TurnMessage, UserProfile,
};
pub use entitlement::{Entitlement, FREE_QUOTA};
pub use phase::{Deflection, Phase, PhaseDecision};
pub use ports::{
    CompletionService, NewSubscription, PaymentGateway, PaymentOrder, PaymentToken, PortError,
    PortResult, RecordStore,
};
pub use prompt::ComposedPrompt;
