//! Interactive chat application for conversing with OpenAI models.
//!
//! # Usage
//!
//! ```bash
//! # Stream replies from gpt-4
//! chatgpt-cli
//!
//! # Use gpt-3.5-turbo
//! chatgpt-cli --gpt3
//!
//! # Wait for whole replies
//! chatgpt-cli --no-stream
//!
//! # Remember the conversation
//! chatgpt-cli --memory
//! ```
//!
//! The API key is read from `OPENAI_API_KEY`; `OPENAI_BASE_URL` points the client
//! at another compatible endpoint.  Set `RUST_LOG` for diagnostics on stderr.
//!
//! # Commands
//!
//! - `!help` - Show available commands
//! - `!reset-memory` - Clear the conversation memory
//! - `!exit` - Exit the application

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatgpt_cli::chat::{
    ChatArgs, ChatConfig, ChatLoop, EditorSource, PlainTextRenderer, build_responder,
};
use chatgpt_cli::{ApiCredentials, Coordinator, OpenAi, Result};

/// Main entry point for the chatgpt-cli application.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    match run(ChatArgs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("chatgpt-cli: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: ChatArgs) -> Result<()> {
    let config = ChatConfig::try_from(args)?;
    // A missing credential must fail here, not on the first request.
    let client = OpenAi::new(ApiCredentials::from_env()?)?;
    let coordinator = Coordinator::typing(config.tier.display_name());
    let responder = build_responder(&config, Arc::new(client), coordinator)?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })
    .map_err(|e| chatgpt_cli::Error::configuration(format!("cannot handle Ctrl+C: {e}")))?;

    let renderer = PlainTextRenderer::with_color_and_interrupt(config.use_color, interrupted);
    let mut chat = ChatLoop::new(responder, EditorSource::new()?, renderer);
    chat.greet();
    chat.run().await;
    Ok(())
}
