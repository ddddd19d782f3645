use std::time::Duration;

use crate::channel::ResponseChannel;
use crate::error::{ChatError, to_error_payload};
use crate::heartbeat::Heartbeat;
use crate::normalize::{EventNormalizer, Normalized};
use crate::redact::RedactionPolicy;
use crate::types::{BackendCompletion, BackendEvent, ChunkDelta, FinishReason, ResponseMeta, Usage};

/// Frames normalized chunks onto a streaming response
///
/// Owns the request's heartbeat; the heartbeat is stopped by [`finish`] and
/// [`fail`] and torn down on drop otherwise.
///
/// [`finish`]: StreamEmitter::finish
/// [`fail`]: StreamEmitter::fail
#[derive(Debug)]
pub struct StreamEmitter {
    channel: ResponseChannel,
    meta: ResponseMeta,
    policy: RedactionPolicy,
    normalizer: EventNormalizer,
    usage: Option<Usage>,
    chunks_written: usize,
    heartbeat: Option<Heartbeat>,
}

impl StreamEmitter {
    /// Switch the channel to streaming and start the heartbeat
    pub async fn start(
        channel: ResponseChannel,
        meta: ResponseMeta,
        policy: RedactionPolicy,
        heartbeat_interval: Duration,
    ) -> Self {
        channel.start_stream().await;
        let heartbeat = Heartbeat::spawn(channel.clone(), heartbeat_interval);

        Self {
            channel,
            meta,
            policy,
            normalizer: EventNormalizer::new(),
            usage: None,
            chunks_written: 0,
            heartbeat: Some(heartbeat),
        }
    }

    /// Number of content chunks written so far
    pub const fn chunks_written(&self) -> usize {
        self.chunks_written
    }

    /// Normalize one backend event and write it immediately
    pub async fn emit(&mut self, event: BackendEvent) {
        match self.normalizer.normalize(event, self.policy) {
            Some(Normalized::Delta(delta)) => self.write_delta(delta).await,
            Some(Normalized::Usage(usage)) => self.usage = Some(usage),
            None => {}
        }
    }

    /// Write a single-shot result as one content chunk
    pub async fn emit_completion(&mut self, completion: BackendCompletion) {
        let delta = ChunkDelta {
            content: Some(completion.content),
            thought_signature: self.policy.signature(completion.reasoning_signature),
            ..ChunkDelta::default()
        };

        if completion.usage.is_some() {
            self.usage = completion.usage;
        }
        self.write_delta(delta).await;
    }

    /// Write the terminal chunk and the `[DONE]` marker
    pub async fn finish(mut self) {
        let finish_reason = FinishReason::from_tool_calls(self.normalizer.saw_tool_call());
        let terminal = self.meta.terminal_chunk(finish_reason, self.usage);

        self.channel.write_json(&terminal).await;
        self.channel.write_done().await;
        self.stop_heartbeat().await;
    }

    /// Terminate the stream with one error frame
    pub async fn fail(mut self, error: &ChatError) {
        self.stop_heartbeat().await;

        if self.channel.is_closed() {
            tracing::debug!(error = %error, "stream failed after client disconnected");
            return;
        }

        let (_, payload) = to_error_payload(error);
        self.channel.write_json(&payload).await;
        self.channel.write_done().await;
    }

    async fn write_delta(&mut self, delta: ChunkDelta) {
        self.channel.write_json(&self.meta.chunk(delta)).await;
        self.chunks_written += 1;
    }

    async fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
    }
}
