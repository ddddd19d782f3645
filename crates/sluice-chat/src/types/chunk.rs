use serde::Serialize;

use super::event::{ToolCall, Usage};

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Model decided to call a tool
    ToolCalls,
}

impl FinishReason {
    /// Pick the finish reason from whether any tool call was produced
    pub const fn from_tool_calls(saw_tool_call: bool) -> Self {
        if saw_tool_call { Self::ToolCalls } else { Self::Stop }
    }
}

/// Streaming chunk in `chat.completion.chunk` format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    /// Only present on the terminal chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Single choice within a chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

/// Incremental update produced by the event normalizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkDelta {
    /// Answer text fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reasoning text fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Reasoning signature, when the redaction policy allows it
    #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    /// Tool call fragments tagged with their position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<IndexedToolCall>>,
}

impl ChunkDelta {
    /// Delta carrying answer text
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Tool call fragment with its zero-based position in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedToolCall {
    pub index: u32,
    #[serde(flatten)]
    pub call: ToolCall,
}
