use crate::redact::RedactionPolicy;
use crate::types::{AggregatedResponse, BackendCompletion, BackendEvent, ResponseMeta, ToolCall, Usage};

/// Folds backend events into one complete response
#[derive(Debug, Default)]
pub struct Aggregator {
    content: String,
    reasoning_content: String,
    reasoning_signature: Option<String>,
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a single-shot backend result
    pub fn from_completion(completion: BackendCompletion) -> Self {
        Self {
            content: completion.content,
            reasoning_content: completion.reasoning_content,
            reasoning_signature: completion.reasoning_signature.filter(|s| !s.is_empty()),
            tool_calls: completion.tool_calls,
            usage: completion.usage,
        }
    }

    pub fn push(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Text(text) => self.content.push_str(&text),
            BackendEvent::Reasoning { text, signature } => {
                self.reasoning_content.push_str(&text);
                if let Some(signature) = signature.filter(|s| !s.is_empty()) {
                    self.reasoning_signature = Some(signature);
                }
            }
            BackendEvent::ToolCalls(calls) => self.tool_calls.extend(calls),
            BackendEvent::Usage(usage) => self.usage = Some(usage),
        }
    }

    /// Apply the redaction policy and stamp the request metadata
    pub fn finish(self, meta: &ResponseMeta, policy: RedactionPolicy) -> AggregatedResponse {
        AggregatedResponse {
            id: meta.id.clone(),
            created: meta.created,
            model: meta.model.clone(),
            content: self.content,
            reasoning_content: self.reasoning_content,
            reasoning_signature: policy.signature(self.reasoning_signature),
            tool_calls: policy.tool_calls(self.tool_calls),
            usage: self.usage,
        }
    }
}
