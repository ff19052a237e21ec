use serde::Serialize;

use crate::settings::{GenerationSettings, ModelTier};
use crate::types::ChatMessage;

/// A single completion call: model, prompt, sampling settings and delivery mode.
///
/// Built once per turn and discarded after the response is consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The model identifier sent to the API.
    pub model: String,
    /// The conversation so far; the last message is the prompt.
    pub messages: Vec<ChatMessage>,
    /// Sampling parameters.
    pub settings: GenerationSettings,
    /// Whether the reply is delivered incrementally.
    pub streaming: bool,
}

impl CompletionRequest {
    /// Create a buffered request carrying a single user prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, settings: GenerationSettings) -> Self {
        Self::with_history(model, vec![ChatMessage::user(prompt)], settings)
    }

    /// Create a buffered request for a prompt within a running tier.
    pub fn for_tier(tier: ModelTier, prompt: impl Into<String>, settings: GenerationSettings) -> Self {
        Self::new(tier.model_id(), prompt, settings)
    }

    /// Create a buffered request that carries prior conversation.
    pub fn with_history(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            settings,
            streaming: false,
        }
    }

    /// Sets the delivery mode.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// The request body as the chat completion endpoint expects it.
    pub fn body(&self) -> RequestBody<'_> {
        RequestBody {
            model: &self.model,
            messages: &self.messages,
            max_tokens: self.settings.max_tokens(),
            temperature: self.settings.temperature(),
            stream: self.streaming,
        }
    }
}

/// Wire form of a [`CompletionRequest`].
#[derive(Debug, Serialize)]
pub struct RequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}
