//! Chat completion orchestration for Sluice
//!
//! Accepts a normalized chat request, borrows a credential, dispatches to a
//! backend generation service and republishes the output as OpenAI-compatible
//! chat completion chunks or a single aggregated response. Rate-limited
//! attempts are retried with credential rotation.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod aggregate;
pub mod channel;
pub mod emitter;
pub mod error;
#[cfg(feature = "http")]
mod handler;
pub mod heartbeat;
pub mod normalize;
pub mod provider;
pub mod redact;
pub mod retry;
pub mod state;
#[cfg(test)]
mod testing;
pub mod types;

pub use aggregate::Aggregator;
pub use channel::{Outbound, ResponseChannel, ResponseReceiver, SseFrame};
pub use emitter::StreamEmitter;
pub use error::{ChatError, to_error_payload};
#[cfg(feature = "http")]
pub use handler::{chat_router, into_response};
pub use normalize::{EventNormalizer, Normalized};
pub use provider::{Backend, BackendRequest, Credential, CredentialId, CredentialSource, QuotaSet, QuotaSource, RequestBuilder};
pub use redact::RedactionPolicy;
pub use retry::{Attempt, RetryContext, RetryHooks, RetryPolicy, RetryState, run_with_retry};
pub use state::{ChatSettings, ChatState, Collaborators, DispatchMode};
pub use types::{AggregatedResponse, BackendCompletion, BackendEvent, ChatRequest, ResponseMeta, Usage};
