/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamFragment {
    /// The text carried by this piece; may be empty.
    pub text: String,
    /// True for the piece that closes the reply.
    pub is_final: bool,
}

impl StreamFragment {
    /// Create a fragment that more text will follow.
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    /// Create the closing fragment.
    pub fn last(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// What a completion call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    /// The whole reply at once.
    Full(String),
    /// A piece of a streamed reply.
    Fragment(StreamFragment),
    /// The service answered with an error payload; its message stands in for the
    /// reply but is not part of the conversation.
    ServiceMessage(String),
}

impl CompletionResult {
    /// The text carried by this result.
    pub fn text(&self) -> &str {
        match self {
            CompletionResult::Full(text) | CompletionResult::ServiceMessage(text) => text,
            CompletionResult::Fragment(fragment) => &fragment.text,
        }
    }

    /// Consumes the result, returning its text.
    pub fn into_text(self) -> String {
        match self {
            CompletionResult::Full(text) | CompletionResult::ServiceMessage(text) => text,
            CompletionResult::Fragment(fragment) => fragment.text,
        }
    }

    /// True when nothing more belongs to this reply.
    pub fn is_final(&self) -> bool {
        match self {
            CompletionResult::Full(_) | CompletionResult::ServiceMessage(_) => true,
            CompletionResult::Fragment(fragment) => fragment.is_final,
        }
    }

    /// True when the text came from an error payload rather than the model.
    pub fn is_service_message(&self) -> bool {
        matches!(self, CompletionResult::ServiceMessage(_))
    }
}

impl From<StreamFragment> for CompletionResult {
    fn from(fragment: StreamFragment) -> Self {
        CompletionResult::Fragment(fragment)
    }
}
