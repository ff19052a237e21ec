//! Fakes shared by the chat tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::Completions;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::stream::FragmentStream;
use crate::types::{CompletionRequest, CompletionResult};

/// Replays canned replies and records every request.
#[derive(Default)]
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<Result<CompletionResult>>>,
    streams: Mutex<VecDeque<Result<FragmentStream>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletions {
    pub fn reply(self, reply: Result<CompletionResult>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn stream(self, stream: Result<FragmentStream>) -> Self {
        self.streams.lock().unwrap().push_back(stream);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completions for ScriptedCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::no_response("no scripted reply")))
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(request.clone());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::no_response("no scripted stream")))
    }
}

/// Records what was rendered, one entry per call.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub events: Vec<String>,
    /// Report an interrupt once this many text chunks were printed.
    pub interrupt_after: Option<usize>,
    texts: usize,
}

impl RecordingRenderer {
    pub fn interrupting_after(texts: usize) -> Self {
        Self {
            interrupt_after: Some(texts),
            ..Default::default()
        }
    }

    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| e.strip_prefix("text:"))
            .collect()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

impl Renderer for RecordingRenderer {
    fn start_response(&mut self, label: &str) {
        self.events.push(format!("start:{label}"));
    }

    fn print_text(&mut self, text: &str) {
        self.texts += 1;
        self.events.push(format!("text:{text}"));
    }

    fn print_error(&mut self, error: &str) {
        self.events.push(format!("error:{error}"));
    }

    fn print_info(&mut self, info: &str) {
        self.events.push(format!("info:{info}"));
    }

    fn print_notice(&mut self, notice: &str) {
        self.events.push(format!("notice:{notice}"));
    }

    fn finish_response(&mut self) {
        self.events.push("finish".to_string());
    }

    fn print_interrupted(&mut self) {
        self.events.push("interrupted".to_string());
    }

    fn should_interrupt(&self) -> bool {
        self.interrupt_after.is_some_and(|n| self.texts >= n)
    }

    fn clear_interrupt(&mut self) {
        self.texts = 0;
    }
}
