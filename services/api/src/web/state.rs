//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.
//!
//! There is deliberately no per-conversation state held here: the phase of a
//! conversation is recomputed from the message log on every turn, so the
//! controller stays stateless between requests.

use crate::config::Config;
use mentor_core::ports::{CompletionService, PaymentGateway, RecordStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub completion: Arc<dyn CompletionService>,
    /// Absent when no payment server key is configured; the payment
    /// endpoints answer 503 in that case, chat still works on the free tier.
    pub payment: Option<Arc<dyn PaymentGateway>>,
    pub config: Arc<Config>,
}
