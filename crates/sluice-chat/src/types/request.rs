use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChatError;

/// Marker in model identifiers for the image generation family
const IMAGE_MODEL_MARKER: &str = "-image";

/// Incoming chat completion request
///
/// Messages and tools are kept as raw JSON; their schema belongs to the
/// request builder. Every other top-level field lands in `params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Target model identifier
    #[serde(default)]
    pub model: String,
    /// Conversation messages, in order
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    /// Whether the caller wants incremental chunks
    #[serde(default)]
    pub stream: bool,
    /// Remaining free-form generation parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ChatRequest {
    /// Reject requests that cannot be dispatched at all
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.model.trim().is_empty() {
            return Err(ChatError::InvalidRequest("model is required".to_owned()));
        }

        if self.messages.is_empty() {
            return Err(ChatError::InvalidRequest("messages must not be empty".to_owned()));
        }

        Ok(())
    }

    /// Whether the target model belongs to the image generation family
    pub fn is_image_model(&self) -> bool {
        self.model.contains(IMAGE_MODEL_MARKER)
    }
}
