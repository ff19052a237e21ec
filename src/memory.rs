//! Conversation memory.
//!
//! A memory answers a prompt in the context of the conversation so far and can be
//! cleared on request.  [`TranscriptMemory`] keeps the raw exchange and replays
//! its most recent part with every request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::Completions;
use crate::settings::{GenerationSettings, ModelTier};
use crate::types::{ChatMessage, CompletionRequest};
use crate::{Error, Result};

/// Number of messages replayed with each request.
pub const DEFAULT_WINDOW: usize = 1000;

/// Accumulated conversational context.
#[async_trait]
pub trait ConversationMemory: Send {
    /// Produce a reply to `prompt` given the accumulated context, and remember the
    /// exchange.
    async fn run(&mut self, prompt: &str) -> Result<String>;

    /// Forget everything.
    fn reset(&mut self);
}

/// Memory that keeps the transcript and replays it to the model.
pub struct TranscriptMemory {
    client: Arc<dyn Completions>,
    model: String,
    settings: GenerationSettings,
    messages: Vec<ChatMessage>,
    window: usize,
}

impl TranscriptMemory {
    /// Creates an empty memory answering with `tier`.
    ///
    /// Streaming memory is not available and fails with [`Error::Unimplemented`].
    pub fn new(
        client: Arc<dyn Completions>,
        tier: ModelTier,
        settings: GenerationSettings,
        streaming: bool,
    ) -> Result<Self> {
        if streaming {
            return Err(Error::unimplemented(
                "streaming replies are not available with conversation memory",
            ));
        }
        Ok(Self {
            client,
            model: tier.model_id().to_string(),
            settings,
            messages: Vec::new(),
            window: DEFAULT_WINDOW,
        })
    }

    /// Replay at most `window` messages per request.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Messages remembered so far.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn request(&self) -> CompletionRequest {
        let start = self.messages.len().saturating_sub(self.window);
        CompletionRequest::with_history(
            self.model.clone(),
            self.messages[start..].to_vec(),
            self.settings,
        )
    }
}

#[async_trait]
impl ConversationMemory for TranscriptMemory {
    async fn run(&mut self, prompt: &str) -> Result<String> {
        let mark = self.messages.len();
        self.messages.push(ChatMessage::user(prompt));
        let request = self.request();
        match self.client.complete(&request).await {
            Ok(result) if result.is_service_message() => {
                // Shown once, never replayed.
                self.messages.truncate(mark);
                tracing::debug!("service message not remembered");
                Ok(result.into_text())
            }
            Ok(result) => {
                let reply = result.into_text();
                self.messages.push(ChatMessage::assistant(reply.clone()));
                tracing::debug!(messages = self.messages.len(), "memory updated");
                Ok(reply)
            }
            Err(err) => {
                // A failed turn leaves no trace.
                self.messages.truncate(mark);
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        tracing::debug!(dropped = self.messages.len(), "memory cleared");
        self.messages.clear();
    }
}

impl std::fmt::Debug for TranscriptMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptMemory")
            .field("model", &self.model)
            .field("settings", &self.settings)
            .field("messages", &self.messages.len())
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::stream::FragmentStream;
    use crate::types::{CompletionResult, Role};

    #[derive(Default)]
    struct EchoCompletions {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
        payload: Option<&'static str>,
    }

    #[async_trait]
    impl Completions for EchoCompletions {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
            self.seen.lock().unwrap().push(request.messages.clone());
            if self.fail {
                return Err(Error::no_response("nothing"));
            }
            if let Some(body) = self.payload {
                return crate::client::interpret_completion(body);
            }
            let last = request.messages.last().map(|m| m.content.clone());
            Ok(CompletionResult::Full(format!("echo: {}", last.unwrap_or_default())))
        }

        async fn complete_stream(&self, _: &CompletionRequest) -> Result<FragmentStream> {
            Err(Error::unimplemented("not used"))
        }
    }

    fn memory(client: Arc<EchoCompletions>) -> TranscriptMemory {
        TranscriptMemory::new(client, ModelTier::Gpt4, GenerationSettings::default(), false).unwrap()
    }

    #[tokio::test]
    async fn remembers_the_conversation() {
        let client = Arc::new(EchoCompletions::default());
        let mut memory = memory(client.clone());

        assert_eq!(memory.run("hello").await.unwrap(), "echo: hello");
        assert_eq!(memory.run("again").await.unwrap(), "echo: again");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[1].len(), 3);
        assert_eq!(seen[1][1].role, Role::Assistant);
        assert_eq!(memory.messages().len(), 4);
    }

    #[tokio::test]
    async fn reset_forgets_everything() {
        let client = Arc::new(EchoCompletions::default());
        let mut memory = memory(client.clone());
        memory.run("hello").await.unwrap();
        memory.reset();
        assert!(memory.messages().is_empty());

        memory.run("fresh").await.unwrap();
        assert_eq!(client.seen.lock().unwrap()[1].len(), 1);
    }

    #[tokio::test]
    async fn failed_turns_are_not_remembered() {
        let client = Arc::new(EchoCompletions {
            fail: true,
            ..Default::default()
        });
        let mut memory = memory(client);
        assert!(memory.run("hello").await.unwrap_err().is_no_response());
        assert!(memory.messages().is_empty());
    }

    #[tokio::test]
    async fn error_payloads_are_shown_but_not_remembered() {
        let client = Arc::new(EchoCompletions {
            payload: Some(r#"{"error":{"message":"overloaded"}}"#),
            ..Default::default()
        });
        let mut memory = memory(client.clone());
        assert_eq!(memory.run("hi").await.unwrap(), "overloaded");
        assert!(memory.messages().is_empty());
        assert_eq!(memory.run("hi again").await.unwrap(), "overloaded");
        assert_eq!(client.seen.lock().unwrap()[1].len(), 1);
    }

    #[tokio::test]
    async fn only_the_window_is_replayed() {
        let client = Arc::new(EchoCompletions::default());
        let mut memory = memory(client.clone()).with_window(3);
        for prompt in ["a", "b", "c"] {
            memory.run(prompt).await.unwrap();
        }
        let seen = client.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.len(), 3);
        assert_eq!(last[2].content, "c");
        assert_eq!(memory.messages().len(), 6);
    }

    #[test]
    fn streaming_memory_is_unimplemented() {
        let client: Arc<dyn Completions> = Arc::new(EchoCompletions::default());
        let err = TranscriptMemory::new(client, ModelTier::Gpt4, GenerationSettings::default(), true)
            .unwrap_err();
        assert!(err.is_unimplemented());
    }
}
