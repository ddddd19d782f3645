use serde::{Deserialize, Serialize};

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion)
    pub total_tokens: u32,
}

/// A tool call produced by the backend
///
/// The backend may sign a call with an opaque reasoning signature which is
/// only forwarded to clients when the redaction policy allows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    #[serde(default)]
    pub id: String,
    /// Tool kind, always `function` today
    #[serde(rename = "type", default = "default_tool_kind")]
    pub kind: String,
    /// Function name and arguments
    pub function: FunctionCall,
    /// Opaque reasoning signature attached by the backend
    #[serde(rename = "thoughtSignature", default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl ToolCall {
    /// Build an unsigned function tool call
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: default_tool_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
            thought_signature: None,
        }
    }

    /// Attach a reasoning signature
    #[must_use]
    pub fn signed(mut self, signature: impl Into<String>) -> Self {
        self.thought_signature = Some(signature.into());
        self
    }
}

/// Function name and arguments within a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Event delivered by a streaming backend, in generation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Final or running usage statistics
    Usage(Usage),
    /// Reasoning ("thinking") text delta
    Reasoning {
        /// Reasoning text fragment
        text: String,
        /// Signature covering the reasoning so far
        signature: Option<String>,
    },
    /// One or more tool calls
    ToolCalls(Vec<ToolCall>),
    /// Answer text delta
    Text(String),
}

/// Result of a single-shot backend call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendCompletion {
    /// Answer text
    pub content: String,
    /// Reasoning text
    pub reasoning_content: String,
    /// Signature covering the reasoning
    pub reasoning_signature: Option<String>,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// Usage statistics, if the backend reported any
    pub usage: Option<Usage>,
}

fn default_tool_kind() -> String {
    "function".to_owned()
}
