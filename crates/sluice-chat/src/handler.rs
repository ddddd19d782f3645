//! Axum adapter for `POST /v1/chat/completions`

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderName;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::stream;
use http::StatusCode;
use tokio::time::Instant;

use crate::channel::{Outbound, ResponseChannel, ResponseReceiver, SseFrame};
use crate::error::{ChatError, to_error_payload};
use crate::state::ChatState;
use crate::types::ChatRequest;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Build the chat completion router
pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(State(state): State<ChatState>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = ChatError::InvalidRequest(format!("malformed JSON body: {e}"));
            tracing::warn!(error = %error, "rejected chat request");
            return error_response(&error);
        }
    };

    let settings = *state.settings();
    let (channel, receiver) = ResponseChannel::new(settings.event_buffer);

    tokio::spawn(async move {
        state.handle(request, channel).await;
    });

    into_response(receiver, settings.response_timeout).await
}

/// Turn the receiving half of a response channel into an HTTP response
///
/// `timeout` bounds the wait for a response head and is lifted once the
/// orchestrator disables it.
pub async fn into_response(mut receiver: ResponseReceiver, timeout: Option<Duration>) -> Response {
    let mut deadline = timeout.map(|timeout| Instant::now() + timeout);

    loop {
        let next = match deadline {
            Some(at) => {
                if let Ok(next) = tokio::time::timeout_at(at, receiver.recv()).await {
                    next
                } else {
                    tracing::warn!("timed out waiting for chat completion response");
                    return error_response(&ChatError::Backend {
                        status: Some(StatusCode::GATEWAY_TIMEOUT),
                        message: "timed out waiting for the backend response".to_owned(),
                    });
                }
            }
            None => receiver.recv().await,
        };

        match next {
            Some(Outbound::DisableTimeout) => deadline = None,
            Some(Outbound::Json { status, body }) => return (status, Json(body)).into_response(),
            Some(Outbound::StreamStart) => return sse_response(receiver),
            Some(Outbound::Frame(frame)) => {
                tracing::debug!(?frame, "dropping stream frame written before stream start");
            }
            None => {
                return error_response(&ChatError::Internal(anyhow::anyhow!(
                    "response channel closed before a response was written"
                )));
            }
        }
    }
}

fn sse_response(receiver: ResponseReceiver) -> Response {
    let events = stream::unfold(Some(receiver), |receiver| async move {
        let mut receiver = receiver?;

        loop {
            let event = match receiver.recv().await? {
                Outbound::Frame(SseFrame::Data(data)) => Event::default().data(data),
                Outbound::Frame(SseFrame::KeepAlive) => Event::default().comment("heartbeat"),
                Outbound::Frame(SseFrame::Done) => {
                    return Some((Ok::<_, Infallible>(Event::default().data("[DONE]")), None));
                }
                Outbound::Json { .. } | Outbound::StreamStart | Outbound::DisableTimeout => continue,
            };
            return Some((Ok(event), Some(receiver)));
        }
    });

    ([(X_ACCEL_BUFFERING, "no")], Sse::new(events)).into_response()
}

fn error_response(error: &ChatError) -> Response {
    let (status, payload) = to_error_payload(error);
    (status, Json(payload)).into_response()
}
