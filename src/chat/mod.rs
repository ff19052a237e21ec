//! Chat application module for interactive conversations with an OpenAI model.
//!
//! This module provides a REPL chat interface built on top of the completion
//! client.  It supports:
//!
//! - Streaming or buffered replies, with a typing indicator while waiting
//! - Optional conversation memory
//! - `!`-prefixed control commands
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`responder`]: one reply per prompt, per mode
//! - [`session`]: the read-dispatch-print loop
//! - [`commands`]: control command parsing

mod commands;
mod config;
mod responder;
mod session;

#[cfg(test)]
mod testing;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ControlCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, Mode};
pub use responder::{
    BufferedResponder, MemoryResponder, RATE_LIMIT_NOTICE, Responder, StreamingResponder,
    build_responder,
};
pub use session::{
    ChatLoop, EditorSource, GOODBYE, Input, LineSource, LoopState, MEMORY_CLEARED, NO_MEMORY,
    read_prompt,
};
