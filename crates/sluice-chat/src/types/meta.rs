use std::time::{SystemTime, UNIX_EPOCH};

use super::chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta, FinishReason};
use super::event::Usage;

/// Correlation data assigned once per logical request
///
/// Every chunk and the aggregated response of one request carry the same
/// `id` and `created` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Response identifier (`chatcmpl-...`)
    pub id: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model echoed back to the caller
    pub model: String,
}

impl ResponseMeta {
    /// Assign a fresh identifier and timestamp for `model`
    pub fn new(model: impl Into<String>) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created,
            model: model.into(),
        }
    }

    /// Build a content chunk carrying `delta`
    pub fn chunk(&self, delta: ChunkDelta) -> ChatCompletionChunk {
        self.build_chunk(delta, None, None)
    }

    /// Build the terminal chunk with a finish reason and the captured usage
    pub fn terminal_chunk(&self, finish_reason: FinishReason, usage: Option<Usage>) -> ChatCompletionChunk {
        self.build_chunk(ChunkDelta::default(), Some(finish_reason), usage)
    }

    fn build_chunk(
        &self,
        delta: ChunkDelta,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        }
    }
}
