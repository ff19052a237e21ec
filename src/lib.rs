// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod indicator;
pub mod memory;
pub mod render;
pub mod settings;
pub mod sse;
pub mod stream;
pub mod types;

// Re-exports
pub use client::{Completions, OpenAi, interpret_completion};
pub use error::{Error, Result};
pub use indicator::{Coordinator, Indicator, ProgressIndicator, TYPING_INTERVAL, coordinate};
pub use memory::{ConversationMemory, TranscriptMemory};
pub use settings::{ApiCredentials, GenerationSettings, ModelTier};
pub use stream::FragmentStream;
pub use types::*;
