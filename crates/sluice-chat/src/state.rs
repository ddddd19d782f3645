//! Request orchestration across the three response modes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use secrecy::ExposeSecret;
use sluice_config::ChatConfig;
use tokio::sync::mpsc;

use crate::aggregate::Aggregator;
use crate::channel::ResponseChannel;
use crate::emitter::StreamEmitter;
use crate::error::{ChatError, to_error_payload};
use crate::provider::{Backend, BackendRequest, Credential, CredentialSource, QuotaSource, RequestBuilder};
use crate::redact::RedactionPolicy;
use crate::retry::{Attempt, RetryContext, RetryHooks, RetryPolicy, RetryState, run_with_retry};
use crate::types::{AggregatedResponse, BackendCompletion, ChatRequest, ResponseMeta};

/// External services the orchestrator borrows
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialSource>,
    pub quotas: Arc<dyn QuotaSource>,
    pub backend: Arc<dyn Backend>,
    pub builder: Arc<dyn RequestBuilder>,
}

/// Runtime settings resolved from [`ChatConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub retry: RetryPolicy,
    pub redaction: RedactionPolicy,
    pub fake_non_stream: bool,
    pub heartbeat_interval: Duration,
    pub response_timeout: Option<Duration>,
    pub event_buffer: usize,
}

impl ChatSettings {
    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        let heartbeat_interval = config.heartbeat_interval_duration()?;
        if heartbeat_interval.is_zero() {
            anyhow::bail!("chat.heartbeat_interval must be greater than 0");
        }
        let response_timeout = config.response_timeout_duration()?;
        if response_timeout.is_some_and(|timeout| timeout.is_zero()) {
            anyhow::bail!("chat.response_timeout must be greater than 0");
        }

        Ok(Self {
            retry: RetryPolicy::from_limit(config.retry_limit),
            redaction: RedactionPolicy::from_passthrough(config.pass_signature_to_client),
            fake_non_stream: config.fake_non_stream,
            heartbeat_interval,
            response_timeout,
            event_buffer: config.event_buffer.max(1),
        })
    }
}

/// How a request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Streaming backend, chunks forwarded as they arrive
    Stream,
    /// Single-shot backend replayed as a two-chunk stream
    StreamImage,
    /// Streaming backend buffered into one JSON response
    FakeNonStream,
    /// Single-shot backend returned as one JSON response
    NonStream,
}

impl DispatchMode {
    pub const fn select(stream: bool, image_model: bool, fake_non_stream: bool) -> Self {
        match (stream, image_model) {
            (true, true) => Self::StreamImage,
            (true, false) => Self::Stream,
            (false, false) if fake_non_stream => Self::FakeNonStream,
            (false, _) => Self::NonStream,
        }
    }

    /// Label attached to log events for this mode
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stream => "chat.stream",
            Self::StreamImage => "chat.stream.image",
            Self::FakeNonStream => "chat.fake_no_stream",
            Self::NonStream => "chat.no_stream",
        }
    }

    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Stream | Self::StreamImage)
    }
}

/// Shared state for the chat completion route
#[derive(Clone)]
pub struct ChatState {
    inner: Arc<ChatStateInner>,
}

struct ChatStateInner {
    collaborators: Collaborators,
    settings: ChatSettings,
}

impl ChatState {
    pub fn new(collaborators: Collaborators, settings: ChatSettings) -> Self {
        Self {
            inner: Arc::new(ChatStateInner {
                collaborators,
                settings,
            }),
        }
    }

    /// Build state from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configured duration is invalid
    pub fn from_config(collaborators: Collaborators, config: &ChatConfig) -> anyhow::Result<Self> {
        Ok(Self::new(collaborators, ChatSettings::from_config(config)?))
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.inner.settings
    }

    /// Serve one request, writing the whole response to `channel`
    ///
    /// Returns once the stream has been terminated or a single JSON result or
    /// error has been written.
    pub async fn handle(&self, request: ChatRequest, channel: ResponseChannel) {
        let settings = self.inner.settings;
        let mode = DispatchMode::select(request.stream, request.is_image_model(), settings.fake_non_stream);

        tracing::debug!(
            mode = mode.label(),
            model = %request.model,
            messages = request.messages.len(),
            "dispatching chat completion"
        );

        if mode.is_streaming() {
            self.stream(mode, &request, &channel).await;
            return;
        }

        channel.disable_timeout().await;

        match self.complete(mode, &request).await {
            Ok(response) => {
                tracing::debug!(
                    mode = mode.label(),
                    model = %request.model,
                    finish_reason = ?response.finish_reason(),
                    "chat completion finished"
                );
                channel.send_json(StatusCode::OK, &response.to_completion()).await;
            }
            Err(error) => respond_error(&channel, mode, &request.model, &error).await,
        }
    }

    async fn stream(&self, mode: DispatchMode, request: &ChatRequest, channel: &ResponseChannel) {
        let settings = self.inner.settings;
        let backend = self.inner.collaborators.backend.as_ref();

        let mut state = match self.prepare(request).await {
            Ok(state) => state,
            Err(error) => return respond_error(channel, mode, &request.model, &error).await,
        };

        let mut emitter = StreamEmitter::start(
            channel.clone(),
            ResponseMeta::new(request.model.clone()),
            settings.redaction,
            settings.heartbeat_interval,
        )
        .await;
        let hooks = self.rotation(request);

        let result = if mode == DispatchMode::StreamImage {
            let mut attempt = SingleShotAttempt { backend };
            match run_with_retry(&mut attempt, &mut state, settings.retry, &hooks).await {
                Ok(completion) => {
                    emitter.emit_completion(completion).await;
                    Ok(())
                }
                Err(error) => Err(error),
            }
        } else {
            let mut attempt = StreamAttempt {
                backend,
                emitter: &mut emitter,
                buffer: settings.event_buffer,
            };
            run_with_retry(&mut attempt, &mut state, settings.retry, &hooks).await
        };

        match result {
            Ok(()) => emitter.finish().await,
            Err(error) => {
                tracing::error!(
                    mode = mode.label(),
                    model = %request.model,
                    credential = %state.credential_tag(),
                    error = %error,
                    "stream failed"
                );
                emitter.fail(&error).await;
            }
        }
    }

    async fn complete(&self, mode: DispatchMode, request: &ChatRequest) -> Result<AggregatedResponse, ChatError> {
        let settings = self.inner.settings;
        let backend = self.inner.collaborators.backend.as_ref();

        let mut state = self.prepare(request).await?;
        let meta = ResponseMeta::new(request.model.clone());
        let hooks = self.rotation(request);

        let aggregator = if mode == DispatchMode::FakeNonStream {
            let mut attempt = BufferedAttempt {
                backend,
                buffer: settings.event_buffer,
            };
            run_with_retry(&mut attempt, &mut state, settings.retry, &hooks).await?
        } else {
            let mut attempt = SingleShotAttempt { backend };
            Aggregator::from_completion(run_with_retry(&mut attempt, &mut state, settings.retry, &hooks).await?)
        };

        Ok(aggregator.finish(&meta, settings.redaction))
    }

    /// Validate, acquire a credential and build the first backend request
    async fn prepare(&self, request: &ChatRequest) -> Result<RetryState, ChatError> {
        request.validate()?;

        let collaborators = &self.inner.collaborators;
        let credential = collaborators
            .credentials
            .credential(&request.model)
            .await
            .ok_or_else(|| ChatError::CredentialUnavailable {
                model: request.model.clone(),
            })?;
        let credential_id = collaborators.credentials.credential_id(&credential);
        let body = build_request(collaborators.builder.as_ref(), request, &credential)?;

        Ok(RetryState {
            request: body,
            credential,
            credential_id,
        })
    }

    fn rotation<'a>(&'a self, request: &'a ChatRequest) -> CredentialRotation<'a> {
        CredentialRotation {
            collaborators: &self.inner.collaborators,
            request,
        }
    }
}

fn build_request(
    builder: &dyn RequestBuilder,
    request: &ChatRequest,
    credential: &Credential,
) -> Result<BackendRequest, ChatError> {
    let mut body = builder.build(request, credential)?;
    if request.is_image_model() {
        builder.augment_for_image_model(&mut body);
    }
    Ok(body)
}

async fn respond_error(channel: &ResponseChannel, mode: DispatchMode, model: &str, error: &ChatError) {
    let (status, payload) = to_error_payload(error);

    if status.is_client_error() && !error.is_rate_limited() {
        tracing::warn!(mode = mode.label(), model, status = status.as_u16(), error = %error, "rejected chat request");
    } else {
        tracing::error!(mode = mode.label(), model, status = status.as_u16(), error = %error, "chat completion failed");
    }

    if channel.headers_sent() {
        tracing::debug!(mode = mode.label(), "response already started, dropping error body");
        return;
    }

    channel.send_json(status, &payload).await;
}

/// Retry hooks backed by the credential pool and quota store
struct CredentialRotation<'a> {
    collaborators: &'a Collaborators,
    request: &'a ChatRequest,
}

#[async_trait]
impl RetryHooks for CredentialRotation<'_> {
    async fn on_attempt(&self, state: &RetryState) {
        self.collaborators
            .credentials
            .record_attempt(&state.credential, &self.request.model)
            .await;
    }

    async fn on_retry(&self, context: &RetryContext, state: &mut RetryState) {
        let credentials = &self.collaborators.credentials;
        let before = state.credential_tag();

        let Some(next) = credentials.credential(&self.request.model).await else {
            tracing::warn!(
                attempt = context.attempt,
                credential = %before,
                "no replacement credential, retrying with the current one"
            );
            return;
        };

        let next_id = credentials.credential_id(&next);
        let same_credential = match (&next_id, &state.credential_id) {
            (Some(next), Some(current)) => next == current,
            _ => next.access_token().expose_secret() == state.credential.access_token().expose_secret(),
        };
        if same_credential {
            tracing::warn!(
                attempt = context.attempt,
                credential = %before,
                "credential pool returned the same credential, retrying with it"
            );
            return;
        }

        match build_request(self.collaborators.builder.as_ref(), self.request, &next) {
            Ok(body) => {
                state.request = body;
                state.credential = next;
                state.credential_id = next_id;
                tracing::info!(
                    attempt = context.attempt,
                    credential = %format!("{before} -> {}", state.credential_tag()),
                    "rotated credential"
                );
            }
            Err(e) => {
                tracing::warn!(
                    attempt = context.attempt,
                    credential = %before,
                    error = %e,
                    "failed to rebuild request for replacement credential, keeping the current one"
                );
            }
        }
    }

    async fn refresh_quota(&self, context: &RetryContext, credential: &Credential) {
        let Some(credential_id) = context.credential_id.as_ref().filter(|id| !id.is_empty()) else {
            tracing::debug!(attempt = context.attempt, "skipping quota refresh for credential without id");
            return;
        };

        let quotas = &self.collaborators.quotas;
        match quotas.fetch_quotas(credential).await {
            Ok(snapshot) => quotas.update_quota(credential_id, snapshot).await,
            Err(e) => {
                tracing::warn!(
                    attempt = context.attempt,
                    credential = %credential_id,
                    error = %e,
                    "quota refresh failed"
                );
            }
        }
    }
}

/// Streams backend events straight into the emitter
struct StreamAttempt<'a> {
    backend: &'a dyn Backend,
    emitter: &'a mut StreamEmitter,
    buffer: usize,
}

#[async_trait]
impl Attempt for StreamAttempt<'_> {
    type Output = ();

    async fn run(&mut self, state: &RetryState) -> Result<(), ChatError> {
        let (tx, mut rx) = mpsc::channel(self.buffer);
        let backend = self.backend;
        let written_before = self.emitter.chunks_written();
        let emitter = &mut *self.emitter;

        let consume = async move {
            while let Some(event) = rx.recv().await {
                emitter.emit(event).await;
            }
        };

        let (result, ()) = tokio::join!(backend.generate_streaming(&state.request, &state.credential, tx), consume);

        // Output already on the wire cannot be retracted, so a retry would duplicate it
        match result {
            Err(error) if error.is_rate_limited() && self.emitter.chunks_written() > written_before => {
                tracing::warn!(
                    credential = %state.credential_tag(),
                    "rate limited after partial output, not retrying"
                );
                Err(error.exhausted())
            }
            other => other,
        }
    }
}

/// Buffers a streaming call into a fresh aggregator per attempt
struct BufferedAttempt<'a> {
    backend: &'a dyn Backend,
    buffer: usize,
}

#[async_trait]
impl Attempt for BufferedAttempt<'_> {
    type Output = Aggregator;

    async fn run(&mut self, state: &RetryState) -> Result<Aggregator, ChatError> {
        let (tx, mut rx) = mpsc::channel(self.buffer);

        let consume = async move {
            let mut aggregator = Aggregator::new();
            while let Some(event) = rx.recv().await {
                aggregator.push(event);
            }
            aggregator
        };

        let (result, aggregator) =
            tokio::join!(self.backend.generate_streaming(&state.request, &state.credential, tx), consume);
        result.map(|()| aggregator)
    }
}

struct SingleShotAttempt<'a> {
    backend: &'a dyn Backend,
}

#[async_trait]
impl Attempt for SingleShotAttempt<'_> {
    type Output = BackendCompletion;

    async fn run(&mut self, state: &RetryState) -> Result<BackendCompletion, ChatError> {
        self.backend.generate_once(&state.request, &state.credential).await
    }
}
