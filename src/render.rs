//! Output rendering for the chat loop.
//!
//! This module provides the [`Renderer`] trait and a plain-text implementation
//! that writes replies to stdout and errors to stderr, with optional ANSI styling.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI escape code for bold text (used for the model header).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for cyan text (used for the model header).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dim text (used for the interrupt marker).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording output in tests
pub trait Renderer: Send {
    /// Called before a reply, with the display name of the model.
    fn start_response(&mut self, label: &str);

    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as fragments are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a notice the user should not miss, such as a rate limit.
    fn print_notice(&mut self, notice: &str) {
        self.print_info(notice);
    }

    /// Called when a reply is complete.
    fn finish_response(&mut self);

    /// Called when the reply is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }

    /// Forget any pending interrupt before a new reply.
    fn clear_interrupt(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    use_color: bool,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::to_writers(io::stdout(), io::stderr(), use_color)
    }

    /// Creates a renderer over arbitrary writers.
    pub fn to_writers(
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
        use_color: bool,
    ) -> Self {
        Self {
            out: Box::new(out),
            err: Box::new(err),
            use_color,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Creates a new PlainTextRenderer with specified color and interrupt flag.
    pub fn with_color_and_interrupt(use_color: bool, interrupted: Arc<AtomicBool>) -> Self {
        Self::with_color(use_color).with_interrupt(interrupted)
    }

    fn write_out(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        if let Some(last) = text.chars().last() {
            self.line_start = last == '\n';
        }
    }

    fn write_styled(&mut self, style: &str, text: &str) {
        if self.use_color {
            self.write_out(&format!("{style}{text}{ANSI_RESET}"));
        } else {
            self.write_out(text);
        }
    }

    /// Moves to a fresh line if a reply left the cursor mid-line.
    fn break_line(&mut self) {
        if !self.line_start {
            self.write_out("\n");
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self, label: &str) {
        self.break_line();
        if self.use_color {
            self.write_out(&format!("{ANSI_BOLD}{ANSI_CYAN}{label}:{ANSI_RESET} "));
        } else {
            self.write_out(&format!("{label}: "));
        }
    }

    fn print_text(&mut self, text: &str) {
        self.write_out(text);
    }

    fn print_error(&mut self, error: &str) {
        self.break_line();
        let line = if self.use_color {
            format!("{ANSI_RED}Error: {error}{ANSI_RESET}\n")
        } else {
            format!("Error: {error}\n")
        };
        let _ = self.err.write_all(line.as_bytes());
        let _ = self.err.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.break_line();
        self.write_out(&format!("{info}\n"));
    }

    fn print_notice(&mut self, notice: &str) {
        self.break_line();
        self.write_styled(ANSI_YELLOW, notice);
        self.write_out("\n");
    }

    fn finish_response(&mut self) {
        self.write_out("\n");
    }

    fn print_interrupted(&mut self) {
        self.break_line();
        self.write_styled(ANSI_DIM, "[interrupted]");
        self.write_out("\n");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn clear_interrupt(&mut self) {
        if let Some(flag) = &self.interrupted {
            flag.store(false, Ordering::Relaxed);
        }
    }
}
