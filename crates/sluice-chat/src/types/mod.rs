//! Canonical request, event and wire types
//!
//! Backend events are provider-agnostic; chunks and completions follow the
//! OpenAI chat completion wire format.

pub mod chunk;
pub mod event;
pub mod meta;
pub mod request;
pub mod response;

pub use chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta, FinishReason, IndexedToolCall};
pub use event::{BackendCompletion, BackendEvent, FunctionCall, ToolCall, Usage};
pub use meta::ResponseMeta;
pub use request::ChatRequest;
pub use response::{AggregatedResponse, AssistantMessage, ChatCompletion, CompletionChoice};
