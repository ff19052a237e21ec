//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `clap` and the resolved
//! configuration that drives the chat loop.

use clap::Parser;

use crate::Error;
use crate::error::Result;
use crate::settings::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, GenerationSettings, ModelTier};

/// Command-line arguments for the chatgpt-cli tool.
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "chatgpt-cli", about = "Chat with an OpenAI model from the terminal")]
pub struct ChatArgs {
    /// Use gpt-3.5-turbo with a smaller token budget instead of gpt-4.
    #[arg(long)]
    pub gpt3: bool,

    /// Wait for the whole reply instead of streaming it.
    #[arg(long)]
    pub no_stream: bool,

    /// Remember the conversation; replies are buffered.
    #[arg(long)]
    pub memory: bool,

    /// Remember the conversation and stream replies (not available yet).
    #[arg(long)]
    pub memory_stream: bool,

    /// Disable ANSI colors and styles.
    #[arg(long)]
    pub no_color: bool,

    /// Sampling temperature between 0 and 2 (default: 0.4).
    #[arg(long, value_name = "T")]
    pub temperature: Option<f32>,

    /// Max tokens per response (default: 4000, capped at 3000 with --gpt3).
    #[arg(long, value_name = "TOKENS")]
    pub max_tokens: Option<u32>,
}

/// How replies are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// One buffered completion per prompt.
    NoStream,
    /// One streamed completion per prompt.
    #[default]
    Stream,
    /// Buffered replies through the conversation memory.
    Memory,
    /// Streamed replies through the conversation memory.
    MemoryStream,
}

impl Mode {
    /// True for the modes that keep conversation memory.
    pub fn has_memory(&self) -> bool {
        matches!(self, Mode::Memory | Mode::MemoryStream)
    }

    /// True for the modes that stream replies.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Mode::Stream | Mode::MemoryStream)
    }
}

impl From<&ChatArgs> for Mode {
    fn from(args: &ChatArgs) -> Self {
        if args.no_stream {
            Mode::NoStream
        } else if args.memory {
            Mode::Memory
        } else if args.memory_stream {
            Mode::MemoryStream
        } else {
            Mode::Stream
        }
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model tier replies come from.
    pub tier: ModelTier,

    /// How replies are produced.
    pub mode: Mode,

    /// Sampling parameters, already derived for `tier`.
    pub settings: GenerationSettings,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-4
    /// - Mode: streaming without memory
    /// - Temperature 0.4, max tokens 4000
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            tier: ModelTier::default(),
            mode: Mode::default(),
            settings: GenerationSettings::default(),
            use_color: true,
        }
    }

    /// Switches the model tier, re-deriving the settings for it.
    pub fn with_tier(mut self, tier: ModelTier) -> Result<Self> {
        self.settings = tier.derive_settings(self.settings)?;
        self.tier = tier;
        Ok(self)
    }

    /// Sets the mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let requested = GenerationSettings::new(
            args.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        )?;
        let tier = if args.gpt3 {
            ModelTier::Gpt35Turbo
        } else {
            ModelTier::Gpt4
        };
        Ok(ChatConfig {
            tier,
            mode: Mode::from(&args),
            settings: tier.derive_settings(requested)?,
            use_color: !args.no_color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GPT35_MAX_TOKENS;

    fn parse(argv: &[&str]) -> ChatArgs {
        ChatArgs::try_parse_from(std::iter::once("chatgpt-cli").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.tier, ModelTier::Gpt4);
        assert_eq!(config.mode, Mode::Stream);
        assert_eq!(config.settings.max_tokens(), DEFAULT_MAX_TOKENS);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(parse(&[])).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn gpt3_lowers_the_token_budget() {
        let config = ChatConfig::try_from(parse(&["--gpt3"])).unwrap();
        assert_eq!(config.tier, ModelTier::Gpt35Turbo);
        assert_eq!(config.settings.max_tokens(), GPT35_MAX_TOKENS);
        assert_eq!(config.settings.temperature(), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn mode_flags() {
        let mode = |argv: &[&str]| ChatConfig::try_from(parse(argv)).unwrap().mode;
        assert_eq!(mode(&[]), Mode::Stream);
        assert_eq!(mode(&["--no-stream"]), Mode::NoStream);
        assert_eq!(mode(&["--memory"]), Mode::Memory);
        assert_eq!(mode(&["--memory-stream"]), Mode::MemoryStream);
        assert_eq!(mode(&["--memory", "--no-stream"]), Mode::NoStream);
        assert_eq!(mode(&["--memory", "--memory-stream"]), Mode::Memory);
    }

    #[test]
    fn mode_predicates() {
        assert!(Mode::Memory.has_memory());
        assert!(Mode::MemoryStream.has_memory());
        assert!(!Mode::Stream.has_memory());
        assert!(Mode::Stream.is_streaming());
        assert!(!Mode::NoStream.is_streaming());
    }

    #[test]
    fn config_from_args_custom() {
        let config = ChatConfig::try_from(parse(&[
            "--no-color",
            "--temperature",
            "1.5",
            "--max-tokens",
            "512",
        ]))
        .unwrap();
        assert!(!config.use_color);
        assert_eq!(config.settings.temperature(), 1.5);
        assert_eq!(config.settings.max_tokens(), 512);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = ChatConfig::try_from(parse(&["--temperature", "3"])).unwrap_err();
        assert!(err.is_validation());
        let err = ChatConfig::try_from(parse(&["--max-tokens", "0"])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn switching_tier_rederives() {
        let config = ChatConfig::new()
            .with_mode(Mode::Memory)
            .without_color()
            .with_tier(ModelTier::Gpt35Turbo)
            .unwrap();
        assert_eq!(config.settings.max_tokens(), GPT35_MAX_TOKENS);
        assert_eq!(config.mode, Mode::Memory);
        assert!(!config.use_color);
    }
}
