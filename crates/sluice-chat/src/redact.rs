use crate::types::ToolCall;

/// Whether reasoning signatures may reach the client
///
/// Applied at the output boundary: both the streaming and the aggregated
/// paths route every signature through the same policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedactionPolicy {
    /// Forward signatures as the backend produced them
    Passthrough,
    /// Drop every signature
    #[default]
    Strip,
}

impl RedactionPolicy {
    /// Map the `pass_signature_to_client` setting
    pub const fn from_passthrough(pass: bool) -> Self {
        if pass { Self::Passthrough } else { Self::Strip }
    }

    pub const fn allows_signature(self) -> bool {
        matches!(self, Self::Passthrough)
    }

    /// Filter a single signature
    pub fn signature(self, signature: Option<String>) -> Option<String> {
        if self.allows_signature() { signature } else { None }
    }

    /// Filter the signature attached to a tool call
    pub fn tool_call(self, mut call: ToolCall) -> ToolCall {
        call.thought_signature = self.signature(call.thought_signature.take());
        call
    }

    pub fn tool_calls(self, calls: Vec<ToolCall>) -> Vec<ToolCall> {
        calls.into_iter().map(|call| self.tool_call(call)).collect()
    }
}
