//! Response shapes of the chat completion endpoint.

use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// An error object embedded in a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable error message.
    pub message: String,
    /// Error class, e.g. `invalid_request_error`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable code, e.g. `rate_limit_exceeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// The offending parameter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl ApiErrorBody {
    /// True when the error reports exhausted quota or request rate.
    pub fn is_rate_limit(&self) -> bool {
        let mentions = |s: &Option<String>| {
            s.as_deref()
                .is_some_and(|s| s.contains("rate_limit") || s == "insufficient_quota")
        };
        mentions(&self.code) || mentions(&self.error_type)
    }
}

/// One alternative of a buffered completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A buffered completion body.
///
/// Both fields are optional because the service may answer a successful request
/// with an error payload instead of choices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// The generated alternatives.
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    /// An application-level error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

/// Incremental content of a streamed choice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta {
    /// Newly generated text.
    #[serde(default)]
    pub content: Option<String>,
}

/// One alternative of a streamed chunk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// The increment.
    #[serde(default)]
    pub delta: Delta,
    /// Set on the last chunk of the choice.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One `data:` payload of a completion stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// The increments, one per alternative.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// An error reported in place of content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_deserialization() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }))
        .unwrap();
        assert_eq!(completion.choices.len(), 1);
        assert_eq!(completion.choices[0].message.content, "Hello!");
        assert!(completion.error.is_none());
    }

    #[test]
    fn error_payload_deserialization() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "error": {
                "message": "The model is overloaded",
                "type": "server_error",
                "param": null,
                "code": null
            }
        }))
        .unwrap();
        assert!(completion.choices.is_empty());
        let error = completion.error.unwrap();
        assert_eq!(error.message, "The model is overloaded");
        assert_eq!(error.error_type.as_deref(), Some("server_error"));
        assert!(!error.is_rate_limit());
    }

    #[test]
    fn chunk_deserialization() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]
        }))
        .unwrap();
        assert_eq!(chunk.choices[0].delta.content, None);
        assert_eq!(chunk.choices[0].finish_reason, None);
    }

    #[test]
    fn rate_limit_detection() {
        let error = ApiErrorBody {
            message: "Rate limit reached".to_string(),
            error_type: Some("requests".to_string()),
            code: Some("rate_limit_exceeded".to_string()),
            param: None,
        };
        assert!(error.is_rate_limit());
    }
}
