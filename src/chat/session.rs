//! The interactive chat loop.
//!
//! [`ChatLoop`] is a small state machine: it reads a prompt, handles control
//! commands locally, and hands everything else to a [`Responder`].  Errors from a
//! turn are reported inline and the loop carries on; only `!exit` or end of
//! input stops it.

use std::io;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::commands::{ControlCommand, help_text, parse_command};
use crate::chat::responder::Responder;
use crate::error::{Error, Result};
use crate::render::Renderer;

/// Prompt shown for a new message.
pub const PROMPT: &str = "You: ";

/// Prompt shown for continuation lines.
pub const CONTINUATION_PROMPT: &str = "...  ";

/// Shown after the conversation memory was cleared.
pub const MEMORY_CLEARED: &str = "Memory Cleared!!";

/// Shown when `!reset-memory` is used without a memory mode.
pub const NO_MEMORY: &str = "No conversation memory to clear; start with --memory to enable it.";

/// Shown when the loop ends.
pub const GOODBYE: &str = "Goodbye!";

/////////////////////////////////////////////// Input //////////////////////////////////////////////

/// One read from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line of text, without its newline.
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D or end of input.
    Eof,
}

/// Where prompts come from.
pub trait LineSource {
    /// Read one line after showing `prompt`.
    fn read_line(&mut self, prompt: &str) -> Result<Input>;

    /// Record a submitted prompt in the history, if the source keeps one.
    fn remember(&mut self, entry: &str) {
        _ = entry;
    }
}

/// A rustyline editor with in-memory history.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    /// Opens the terminal.
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(readline_error)?;
        Ok(Self { editor })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Input::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(readline_error(err)),
        }
    }

    fn remember(&mut self, entry: &str) {
        let _ = self.editor.add_history_entry(entry);
    }
}

fn readline_error(err: ReadlineError) -> Error {
    match err {
        ReadlineError::Io(e) => Error::io("terminal input failed", e),
        other => Error::io(
            "terminal input failed",
            io::Error::other(other.to_string()),
        ),
    }
}

/// Read one prompt, joining lines that end in `\`.
///
/// An interrupt or end of input in the middle of a block abandons the block.
pub fn read_prompt(source: &mut dyn LineSource) -> Result<Input> {
    let mut block = String::new();
    let mut prompt = PROMPT;
    loop {
        let line = match source.read_line(prompt)? {
            Input::Line(line) => line,
            other => return Ok(other),
        };
        match line.strip_suffix('\\') {
            Some(head) => {
                block.push_str(head);
                block.push('\n');
                prompt = CONTINUATION_PROMPT;
            }
            None => {
                block.push_str(&line);
                return Ok(Input::Line(block));
            }
        }
    }
}

///////////////////////////////////////////// ChatLoop /////////////////////////////////////////////

/// Where the loop is.
#[derive(Debug, Clone)]
pub enum LoopState {
    /// Waiting for the user.
    AwaitingInput,
    /// A prompt is being answered.
    Dispatching(String),
    /// The reply has been rendered; a failed turn carries its error.
    Printing(Option<Error>),
    /// The loop is done.
    Exiting,
}

/// The read-dispatch-print loop.
pub struct ChatLoop<S: LineSource, R: Renderer> {
    responder: Box<dyn Responder>,
    source: S,
    renderer: R,
    state: LoopState,
}

impl<S: LineSource, R: Renderer> ChatLoop<S, R> {
    /// Creates a loop waiting for input.
    pub fn new(responder: Box<dyn Responder>, source: S, renderer: R) -> Self {
        Self {
            responder,
            source,
            renderer,
            state: LoopState::AwaitingInput,
        }
    }

    /// The current state.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// The renderer output goes to.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Print the startup banner.
    pub fn greet(&mut self) {
        let label = self.responder.label().to_string();
        self.renderer
            .print_info(&format!("Chatting with {label}. Type !help for commands, !exit to quit."));
    }

    /// Run until `!exit` or end of input.
    pub async fn run(&mut self) {
        while !matches!(self.advance().await, LoopState::Exiting) {}
    }

    /// Take one transition.
    pub async fn advance(&mut self) -> &LoopState {
        let state = std::mem::replace(&mut self.state, LoopState::AwaitingInput);
        self.state = match state {
            LoopState::AwaitingInput => self.read(),
            LoopState::Dispatching(prompt) => {
                tracing::debug!(chars = prompt.len(), "dispatching prompt");
                self.renderer.clear_interrupt();
                let outcome = self.responder.respond(&prompt, &mut self.renderer).await;
                LoopState::Printing(outcome.err())
            }
            LoopState::Printing(failure) => {
                if let Some(err) = failure {
                    tracing::warn!(error = %err, "turn failed");
                    self.renderer.print_error(&err.to_string());
                }
                LoopState::AwaitingInput
            }
            LoopState::Exiting => LoopState::Exiting,
        };
        &self.state
    }

    fn read(&mut self) -> LoopState {
        match read_prompt(&mut self.source) {
            Ok(Input::Line(line)) => self.interpret(line),
            Ok(Input::Interrupted) => LoopState::AwaitingInput,
            Ok(Input::Eof) => {
                self.renderer.print_info(GOODBYE);
                LoopState::Exiting
            }
            Err(err) => {
                self.renderer.print_error(&err.to_string());
                LoopState::Exiting
            }
        }
    }

    fn interpret(&mut self, line: String) -> LoopState {
        if line.trim().is_empty() {
            return LoopState::AwaitingInput;
        }
        self.source.remember(&line);

        let Some(command) = parse_command(&line) else {
            return LoopState::Dispatching(line);
        };
        tracing::debug!(command = command.keyword(), "control command");
        match command {
            ControlCommand::Exit => {
                self.renderer.print_info(GOODBYE);
                LoopState::Exiting
            }
            ControlCommand::Help => {
                self.renderer.print_info(help_text());
                LoopState::AwaitingInput
            }
            ControlCommand::ResetMemory => {
                match self.responder.memory() {
                    Some(memory) => {
                        memory.reset();
                        self.renderer.print_info(MEMORY_CLEARED);
                    }
                    None => self.renderer.print_info(NO_MEMORY),
                }
                LoopState::AwaitingInput
            }
        }
    }
}
