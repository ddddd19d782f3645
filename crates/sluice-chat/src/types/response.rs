use serde::Serialize;

use super::chunk::FinishReason;
use super::event::{ToolCall, Usage};

/// Complete response folded from a backend call
///
/// Built once by the aggregator with the redaction policy already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedResponse {
    pub id: String,
    pub created: u64,
    pub model: String,
    pub content: String,
    pub reasoning_content: String,
    pub reasoning_signature: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl AggregatedResponse {
    /// Finish reason implied by the folded output
    pub fn finish_reason(&self) -> FinishReason {
        FinishReason::from_tool_calls(!self.tool_calls.is_empty())
    }

    /// Convert into the `chat.completion` wire object
    pub fn to_completion(&self) -> ChatCompletion {
        let message = AssistantMessage {
            role: "assistant",
            reasoning_content: (!self.reasoning_content.is_empty()).then(|| self.reasoning_content.clone()),
            thought_signature: self.reasoning_signature.clone(),
            content: self.content.clone(),
            tool_calls: (!self.tool_calls.is_empty()).then(|| self.tool_calls.clone()),
        };

        ChatCompletion {
            id: self.id.clone(),
            object: "chat.completion",
            created: self.created,
            model: self.model.clone(),
            choices: vec![CompletionChoice {
                index: 0,
                message,
                finish_reason: self.finish_reason(),
            }],
            usage: self.usage,
        }
    }
}

/// Non-streaming response in `chat.completion` format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Single choice within a completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
}

/// Assistant message; reasoning is serialized ahead of the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}
