//! In-session command parsing for the chat application.
//!
//! A command is an entire input line starting with `!`.  Anything else,
//! including a line that merely contains a command, is sent to the model.

/// A parsed control command.
///
/// These commands control the chat loop and are not sent to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Exit the chat application.
    Exit,

    /// Display help information.
    Help,

    /// Clear the conversation memory.
    ResetMemory,
}

impl ControlCommand {
    /// The text the user types.
    pub fn keyword(&self) -> &'static str {
        match self {
            ControlCommand::Exit => "!exit",
            ControlCommand::Help => "!help",
            ControlCommand::ResetMemory => "!reset-memory",
        }
    }
}

/// Parses an input line for a control command.
///
/// Returns `Some(ControlCommand)` if the whole line is a command,
/// or `None` if it should be treated as a regular prompt.
///
/// # Examples
///
/// ```
/// # use chatgpt_cli::chat::{ControlCommand, parse_command};
/// assert_eq!(parse_command("!exit"), Some(ControlCommand::Exit));
/// assert!(parse_command("  !help ").is_none());
/// assert!(parse_command("please !exit").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ControlCommand> {
    match input {
        "!exit" => Some(ControlCommand::Exit),
        "!help" => Some(ControlCommand::Help),
        "!reset-memory" => Some(ControlCommand::ResetMemory),
        _ => None,
    }
}

/// Returns help text for the available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  !exit           Exit the chat
  !help           Show this help message
  !reset-memory   Clear the conversation memory (memory modes only)

End a line with \ to continue the prompt on the next line.
Ctrl+C stops a streaming reply; Ctrl+D exits."#
}
