//! Backend event normalization
//!
//! Turns provider-agnostic backend events into OpenAI chunk deltas. Tool call
//! indices are assigned per request and stay stable across deltas that share
//! an id.

use std::collections::HashMap;

use crate::redact::RedactionPolicy;
use crate::types::{BackendEvent, ChunkDelta, IndexedToolCall, Usage};

/// Result of normalizing one backend event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Delta to forward as a content chunk
    Delta(ChunkDelta),
    /// Usage to hold until the terminal chunk
    Usage(Usage),
}

/// Request-scoped normalizer state
#[derive(Debug, Default)]
pub struct EventNormalizer {
    tool_indices: HashMap<String, u32>,
    next_index: u32,
    saw_tool_call: bool,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any tool call has been normalized so far
    pub const fn saw_tool_call(&self) -> bool {
        self.saw_tool_call
    }

    /// Normalize one event; returns `None` for events with nothing to emit
    pub fn normalize(&mut self, event: BackendEvent, policy: RedactionPolicy) -> Option<Normalized> {
        match event {
            BackendEvent::Usage(usage) => Some(Normalized::Usage(usage)),
            BackendEvent::Reasoning { text, signature } => Some(Normalized::Delta(ChunkDelta {
                reasoning_content: Some(text),
                thought_signature: policy.signature(signature),
                ..ChunkDelta::default()
            })),
            BackendEvent::ToolCalls(calls) => {
                if calls.is_empty() {
                    return None;
                }
                self.saw_tool_call = true;

                let tool_calls = calls
                    .into_iter()
                    .map(|call| IndexedToolCall {
                        index: self.index_for(&call.id),
                        call: policy.tool_call(call),
                    })
                    .collect();

                Some(Normalized::Delta(ChunkDelta {
                    tool_calls: Some(tool_calls),
                    ..ChunkDelta::default()
                }))
            }
            BackendEvent::Text(text) => Some(Normalized::Delta(ChunkDelta::content(text))),
        }
    }

    fn index_for(&mut self, id: &str) -> u32 {
        if !id.is_empty()
            && let Some(index) = self.tool_indices.get(id)
        {
            return *index;
        }

        let index = self.next_index;
        self.next_index += 1;
        if !id.is_empty() {
            self.tool_indices.insert(id.to_owned(), index);
        }
        index
    }
}
