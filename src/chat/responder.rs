//! One reply per prompt, produced according to the configured [`Mode`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::chat::config::{ChatConfig, Mode};
use crate::client::Completions;
use crate::error::Result;
use crate::indicator::Coordinator;
use crate::memory::{ConversationMemory, TranscriptMemory};
use crate::render::Renderer;
use crate::settings::{GenerationSettings, ModelTier};
use crate::types::{CompletionRequest, CompletionResult};

/// Printed when the service rate limits a streamed reply.
pub const RATE_LIMIT_NOTICE: &str = "RateLimit Error Occurred!! Try again..";

/// How often a stalled stream checks for Ctrl+C.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Produces and renders the reply to one prompt.
#[async_trait]
pub trait Responder: Send {
    /// Display name of the model replying.
    fn label(&self) -> &str;

    /// Reply to `prompt`.  Errors are returned for the loop to report.
    async fn respond(&mut self, prompt: &str, renderer: &mut dyn Renderer) -> Result<()>;

    /// The conversation memory, in the modes that keep one.
    fn memory(&mut self) -> Option<&mut dyn ConversationMemory> {
        None
    }
}

/// Builds the responder for `config`.
///
/// Streaming memory is not available; [`Mode::MemoryStream`] fails with
/// [`crate::Error::Unimplemented`].
pub fn build_responder(
    config: &ChatConfig,
    client: Arc<dyn Completions>,
    coordinator: Coordinator,
) -> Result<Box<dyn Responder>> {
    let tier = config.tier;
    let settings = config.settings;
    let responder: Box<dyn Responder> = match config.mode {
        Mode::NoStream => Box::new(BufferedResponder {
            client,
            tier,
            settings,
            coordinator,
        }),
        Mode::Stream => Box::new(StreamingResponder {
            client,
            tier,
            settings,
            coordinator,
        }),
        Mode::Memory | Mode::MemoryStream => {
            let streaming = config.mode.is_streaming();
            let memory = TranscriptMemory::new(client, tier, settings, streaming)?;
            Box::new(MemoryResponder::new(Box::new(memory), tier, coordinator))
        }
    };
    tracing::debug!(mode = ?config.mode, model = %tier, "responder ready");
    Ok(responder)
}

/////////////////////////////////////////////// Buffered ///////////////////////////////////////////

/// Waits for the whole reply, then prints it.
pub struct BufferedResponder {
    client: Arc<dyn Completions>,
    tier: ModelTier,
    settings: GenerationSettings,
    coordinator: Coordinator,
}

#[async_trait]
impl Responder for BufferedResponder {
    fn label(&self) -> &str {
        self.tier.display_name()
    }

    async fn respond(&mut self, prompt: &str, renderer: &mut dyn Renderer) -> Result<()> {
        let request = CompletionRequest::for_tier(self.tier, prompt, self.settings);
        let client = &self.client;
        let request = &request;
        let reply = self
            .coordinator
            .wrap(move || client.complete(request))
            .call()
            .await?;
        renderer.start_response(self.label());
        renderer.print_text(reply.text());
        renderer.finish_response();
        Ok(())
    }
}

////////////////////////////////////////////// Streaming ///////////////////////////////////////////

/// Prints fragments as they arrive.
pub struct StreamingResponder {
    client: Arc<dyn Completions>,
    tier: ModelTier,
    settings: GenerationSettings,
    coordinator: Coordinator,
}

#[async_trait]
impl Responder for StreamingResponder {
    fn label(&self) -> &str {
        self.tier.display_name()
    }

    async fn respond(&mut self, prompt: &str, renderer: &mut dyn Renderer) -> Result<()> {
        let request = CompletionRequest::for_tier(self.tier, prompt, self.settings).streaming(true);
        // The indicator covers the wait for the first byte.
        let mut fragments = self
            .coordinator
            .run(self.client.complete_stream(&request))
            .await?;

        if !fragments.is_rate_limited() {
            renderer.start_response(self.label());
            loop {
                // A stalled stream still notices Ctrl+C between ticks.
                let next = tokio::select! {
                    next = fragments.next() => Some(next),
                    _ = tokio::time::sleep(INTERRUPT_POLL) => None,
                };
                if renderer.should_interrupt() {
                    tracing::debug!("streamed reply interrupted");
                    renderer.print_interrupted();
                    return Ok(());
                }
                let Some(next) = next else {
                    continue;
                };
                let Some(fragment) = next else {
                    break;
                };
                let piece = match fragment {
                    Ok(fragment) => CompletionResult::from(fragment),
                    Err(err) => {
                        renderer.finish_response();
                        return Err(err);
                    }
                };
                renderer.print_text(piece.text());
                if piece.is_final() {
                    break;
                }
            }
            renderer.finish_response();
        }

        if let Some(err) = fragments.rate_limit() {
            tracing::info!(error = %err, "rate limited, not retrying");
            renderer.print_notice(RATE_LIMIT_NOTICE);
        }
        Ok(())
    }
}

//////////////////////////////////////////////// Memory ////////////////////////////////////////////

/// Replies through the conversation memory.
pub struct MemoryResponder {
    memory: Box<dyn ConversationMemory>,
    label: &'static str,
    coordinator: Coordinator,
}

impl MemoryResponder {
    /// Replies with `memory`, labelled as `tier`.
    pub fn new(
        memory: Box<dyn ConversationMemory>,
        tier: ModelTier,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            memory,
            label: tier.display_name(),
            coordinator,
        }
    }
}

#[async_trait]
impl Responder for MemoryResponder {
    fn label(&self) -> &str {
        self.label
    }

    async fn respond(&mut self, prompt: &str, renderer: &mut dyn Renderer) -> Result<()> {
        let reply = self.coordinator.run(self.memory.run(prompt)).await?;
        renderer.start_response(self.label);
        renderer.print_text(&reply);
        renderer.finish_response();
        Ok(())
    }

    fn memory(&mut self) -> Option<&mut dyn ConversationMemory> {
        Some(&mut *self.memory)
    }
}
