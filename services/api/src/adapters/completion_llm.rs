//! services/api/src/adapters/completion_llm.rs
//!
//! This module contains the adapter for the chat completion service.
//! It implements the `CompletionService` port from the `core` crate against
//! any OpenAI-compatible endpoint (Groq in production).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use mentor_core::domain::{ChatRole, TurnMessage};
use mentor_core::ports::{CompletionService, PortError, PortResult};
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` using an OpenAI-compatible
/// chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiCompletionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiCompletionAdapter {
    /// Creates a new `OpenAiCompletionAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            model,
            temperature,
            max_tokens,
            timeout,
        }
    }

    fn build_messages(
        instruction: &str,
        turns: &[TurnMessage],
    ) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(turns.len() + 1);

        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instruction)
                .build()
                .map_err(|e| PortError::Completion(e.to_string()))?
                .into(),
        );

        for turn in turns {
            let message = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| PortError::Completion(e.to_string()))?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| PortError::Completion(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        Ok(messages)
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for OpenAiCompletionAdapter {
    /// Sends the composed instruction and message sequence to the model.
    ///
    /// Every failure mode, the bounded timeout included, surfaces as
    /// `PortError::Completion`; the turn orchestrator recovers it with the
    /// fail-soft reply.
    async fn complete(&self, instruction: &str, turns: &[TurnMessage]) -> PortResult<String> {
        let messages = Self::build_messages(instruction, turns)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .n(1)
            .build()
            .map_err(|e| PortError::Completion(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                PortError::Completion(format!(
                    "completion call exceeded the {}s timeout",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e: OpenAIError| PortError::Completion(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Completion(
                    "Completion response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Completion(
                "Completion service returned no choices in its response.".to_string(),
            ))
        }
    }
}
