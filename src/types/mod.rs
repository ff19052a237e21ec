// Public modules
pub mod chat_completion;
pub mod chat_message;
pub mod completion_request;
pub mod completion_result;

// Re-exports
pub use chat_completion::{
    ApiErrorBody, ChatCompletion, ChatCompletionChunk, ChunkChoice, CompletionChoice, Delta,
};
pub use chat_message::{ChatMessage, Role};
pub use completion_request::CompletionRequest;
pub use completion_result::{CompletionResult, StreamFragment};
