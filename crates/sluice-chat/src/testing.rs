//! In-memory collaborators shared by unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::StatusCode;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use sluice_config::ChatConfig;
use tokio::sync::mpsc;

use crate::channel::{Outbound, ResponseChannel};
use crate::error::ChatError;
use crate::provider::{
    Backend, BackendRequest, Credential, CredentialId, CredentialSource, QuotaSet, QuotaSource, RequestBuilder,
};
use crate::state::{ChatState, Collaborators};
use crate::types::{BackendCompletion, BackendEvent, ChatRequest};

const TOKEN_PREFIX: &str = "token-";

fn id_of(credential: &Credential) -> String {
    let token = credential.access_token().expose_secret();
    token.strip_prefix(TOKEN_PREFIX).unwrap_or(token).to_owned()
}

/// Round-robin credential pool; ids are derived from the token
#[derive(Clone, Default)]
pub struct MockCredentials {
    ids: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockCredentials {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Arc::new(ids.iter().map(|id| (*id).to_owned()).collect()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialSource for MockCredentials {
    async fn credential(&self, _model: &str) -> Option<Credential> {
        if self.ids.is_empty() {
            return None;
        }
        let next = self.cursor.fetch_add(1, Ordering::SeqCst) % self.ids.len();
        Some(Credential::new(format!("{TOKEN_PREFIX}{}", self.ids[next])))
    }

    fn credential_id(&self, credential: &Credential) -> Option<CredentialId> {
        Some(id_of(credential))
    }

    async fn record_attempt(&self, credential: &Credential, _model: &str) {
        self.attempts.lock().unwrap().push(id_of(credential));
    }
}

#[derive(Clone, Default)]
pub struct MockQuotas {
    fail: bool,
    refreshed: Arc<Mutex<Vec<String>>>,
}

impl MockQuotas {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn refreshed(&self) -> Vec<String> {
        self.refreshed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuotaSource for MockQuotas {
    async fn fetch_quotas(&self, _credential: &Credential) -> Result<QuotaSet, ChatError> {
        if self.fail {
            return Err(ChatError::upstream(StatusCode::SERVICE_UNAVAILABLE, "quota service down"));
        }
        Ok(QuotaSet(json!({ "remaining": 0.5 })))
    }

    async fn update_quota(&self, credential_id: &CredentialId, _quotas: QuotaSet) {
        self.refreshed.lock().unwrap().push(credential_id.clone());
    }
}

/// Scripted result of one backend call
#[derive(Debug, Clone)]
pub enum Outcome {
    Events(Vec<BackendEvent>),
    Completion(BackendCompletion),
    PartialThenFail(Vec<BackendEvent>, StatusCode),
    Fail(StatusCode),
}

pub fn rate_limited() -> Outcome {
    Outcome::Fail(StatusCode::TOO_MANY_REQUESTS)
}

#[derive(Default)]
struct BackendLog {
    streaming_calls: usize,
    once_calls: usize,
    requests: Vec<Value>,
    credentials: Vec<String>,
}

/// Backend that replays one scripted outcome per call
#[derive(Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    log: Arc<Mutex<BackendLog>>,
}

impl MockBackend {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn streaming_calls(&self) -> usize {
        self.log.lock().unwrap().streaming_calls
    }

    pub fn once_calls(&self) -> usize {
        self.log.lock().unwrap().once_calls
    }

    pub fn credentials_seen(&self) -> Vec<String> {
        self.log.lock().unwrap().credentials.clone()
    }

    pub fn requests_seen(&self) -> Vec<Value> {
        self.log.lock().unwrap().requests.clone()
    }

    fn next(&self, request: &BackendRequest, credential: &Credential) -> Outcome {
        let mut log = self.log.lock().unwrap();
        log.requests.push(request.0.clone());
        log.credentials.push(id_of(credential));
        drop(log);

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Fail(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

fn failure(status: StatusCode) -> ChatError {
    ChatError::upstream(status, format!("scripted failure {}", status.as_u16()))
}

#[async_trait]
impl Backend for MockBackend {
    async fn generate_streaming(
        &self,
        request: &BackendRequest,
        credential: &Credential,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<(), ChatError> {
        self.log.lock().unwrap().streaming_calls += 1;

        let (events_to_send, result) = match self.next(request, credential) {
            Outcome::Events(list) => (list, Ok(())),
            Outcome::PartialThenFail(list, status) => (list, Err(failure(status))),
            Outcome::Fail(status) => (Vec::new(), Err(failure(status))),
            Outcome::Completion(_) => (Vec::new(), Err(ChatError::Internal(anyhow::anyhow!("unexpected streaming call")))),
        };

        for event in events_to_send {
            if events.send(event).await.is_err() {
                break;
            }
        }
        result
    }

    async fn generate_once(
        &self,
        request: &BackendRequest,
        credential: &Credential,
    ) -> Result<BackendCompletion, ChatError> {
        self.log.lock().unwrap().once_calls += 1;

        match self.next(request, credential) {
            Outcome::Completion(completion) => Ok(completion),
            Outcome::Fail(status) | Outcome::PartialThenFail(_, status) => Err(failure(status)),
            Outcome::Events(_) => Err(ChatError::Internal(anyhow::anyhow!("unexpected single-shot call"))),
        }
    }
}

/// Builds `{model, credential}` bodies; image requests gain `image: true`
pub struct EchoBuilder;

impl RequestBuilder for EchoBuilder {
    fn build(&self, request: &ChatRequest, credential: &Credential) -> Result<BackendRequest, ChatError> {
        Ok(BackendRequest(json!({
            "model": request.model,
            "credential": id_of(credential),
        })))
    }

    fn augment_for_image_model(&self, request: &mut BackendRequest) {
        if let Some(body) = request.0.as_object_mut() {
            body.insert("image".to_owned(), Value::Bool(true));
        }
    }
}

pub fn echo_state(
    credentials: MockCredentials,
    quotas: MockQuotas,
    backend: MockBackend,
    config: &ChatConfig,
) -> ChatState {
    let collaborators = Collaborators {
        credentials: Arc::new(credentials),
        quotas: Arc::new(quotas),
        backend: Arc::new(backend),
        builder: Arc::new(EchoBuilder),
    };
    ChatState::from_config(collaborators, config).unwrap()
}

/// Run one request to completion and collect everything written
pub async fn collect(state: &ChatState, request: ChatRequest) -> Vec<Outbound> {
    let (channel, mut receiver) = ResponseChannel::new(16);

    let drain = async move {
        let mut out = Vec::new();
        while let Some(message) = receiver.recv().await {
            out.push(message);
        }
        out
    };

    let ((), messages) = tokio::join!(state.handle(request, channel), drain);
    messages
}
