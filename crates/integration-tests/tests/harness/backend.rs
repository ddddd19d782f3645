//! In-memory collaborators standing in for the credential pool, quota
//! service, backend transport and request builder

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use sluice_chat::types::ToolCall;
use sluice_chat::{
    Backend, BackendCompletion, BackendEvent, BackendRequest, ChatError, ChatRequest, Collaborators, Credential,
    CredentialId, CredentialSource, QuotaSet, QuotaSource, RequestBuilder, Usage,
};
use tokio::sync::mpsc;

const TOKEN_PREFIX: &str = "ya29.mock-";

fn account_of(credential: &Credential) -> String {
    let token = credential.access_token().expose_secret();
    token.strip_prefix(TOKEN_PREFIX).unwrap_or(token).to_owned()
}

/// Canned token usage
pub fn usage(prompt: u32, completion: u32) -> Usage {
    Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    }
}

/// The "Hel" + "lo" stream with usage
pub fn hello_stream() -> Reply {
    Reply::Stream(vec![
        BackendEvent::Text("Hel".to_owned()),
        BackendEvent::Text("lo".to_owned()),
        BackendEvent::Usage(usage(5, 2)),
    ])
}

/// Signed reasoning followed by a signed tool call
pub fn signed_tool_stream() -> Reply {
    Reply::Stream(vec![
        BackendEvent::Reasoning {
            text: "Need the weather.".to_owned(),
            signature: Some("sig-reasoning".to_owned()),
        },
        BackendEvent::ToolCalls(vec![
            ToolCall::function("call_weather", "get_weather", "{\"location\":\"Oslo\"}").signed("sig-tool"),
        ]),
        BackendEvent::Usage(usage(12, 7)),
    ])
}

/// Scripted reply for one backend call
#[derive(Debug, Clone)]
pub enum Reply {
    Stream(Vec<BackendEvent>),
    Completion(BackendCompletion),
    /// Stream the events, then fail with the status
    StreamThenFail(Vec<BackendEvent>, StatusCode),
    Fail(StatusCode),
    /// Stream the events with a pause before each one
    Slow(Vec<BackendEvent>, Duration),
}

impl Reply {
    pub const fn rate_limited() -> Self {
        Self::Fail(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Round-robin pool of mock accounts
pub struct MockPool {
    accounts: Vec<String>,
    cursor: AtomicUsize,
    attempts: Mutex<Vec<String>>,
    refreshed: Mutex<Vec<String>>,
    quota_failures: bool,
}

impl MockPool {
    pub fn new(accounts: &[&str]) -> Arc<Self> {
        Self::build(accounts, false)
    }

    /// A pool whose quota service always errors
    pub fn with_failing_quotas(accounts: &[&str]) -> Arc<Self> {
        Self::build(accounts, true)
    }

    fn build(accounts: &[&str], quota_failures: bool) -> Arc<Self> {
        Arc::new(Self {
            accounts: accounts.iter().map(|a| (*a).to_owned()).collect(),
            cursor: AtomicUsize::new(0),
            attempts: Mutex::default(),
            refreshed: Mutex::default(),
            quota_failures,
        })
    }

    /// Accounts in the order attempts were recorded against them
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Accounts whose quota snapshot was refreshed
    pub fn refreshed(&self) -> Vec<String> {
        self.refreshed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialSource for MockPool {
    async fn credential(&self, _model: &str) -> Option<Credential> {
        if self.accounts.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.accounts.len();
        Some(Credential::new(format!("{TOKEN_PREFIX}{}", self.accounts[index])))
    }

    fn credential_id(&self, credential: &Credential) -> Option<CredentialId> {
        Some(account_of(credential))
    }

    async fn record_attempt(&self, credential: &Credential, _model: &str) {
        self.attempts.lock().unwrap().push(account_of(credential));
    }
}

#[async_trait]
impl QuotaSource for MockPool {
    async fn fetch_quotas(&self, _credential: &Credential) -> Result<QuotaSet, ChatError> {
        if self.quota_failures {
            return Err(ChatError::upstream(StatusCode::SERVICE_UNAVAILABLE, "quota endpoint unavailable"));
        }
        Ok(QuotaSet(json!({ "gemini-3-pro": { "remaining": 0.0 } })))
    }

    async fn update_quota(&self, credential_id: &CredentialId, _quotas: QuotaSet) {
        self.refreshed.lock().unwrap().push(credential_id.clone());
    }
}

/// Backend replaying one scripted reply per call
pub struct MockBackend {
    script: Mutex<VecDeque<Reply>>,
    calls: AtomicU32,
    requests: Mutex<Vec<Value>>,
}

impl MockBackend {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
            requests: Mutex::default(),
        })
    }

    /// Total backend calls across both generation modes
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Backend request bodies in call order
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &BackendRequest) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.0.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Fail(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

fn scripted_error(status: StatusCode) -> ChatError {
    ChatError::upstream(status, format!("mock backend returned {}", status.as_u16()))
}

#[async_trait]
impl Backend for MockBackend {
    async fn generate_streaming(
        &self,
        request: &BackendRequest,
        _credential: &Credential,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<(), ChatError> {
        let (script, delay, outcome) = match self.next_reply(request) {
            Reply::Stream(script) => (script, None, Ok(())),
            Reply::Slow(script, delay) => (script, Some(delay), Ok(())),
            Reply::StreamThenFail(script, status) => (script, None, Err(scripted_error(status))),
            Reply::Fail(status) => (Vec::new(), None, Err(scripted_error(status))),
            Reply::Completion(completion) => {
                let mut script = vec![BackendEvent::Text(completion.content)];
                script.extend(completion.usage.map(BackendEvent::Usage));
                (script, None, Ok(()))
            }
        };

        for event in script {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if events.send(event).await.is_err() {
                break;
            }
        }
        outcome
    }

    async fn generate_once(
        &self,
        request: &BackendRequest,
        _credential: &Credential,
    ) -> Result<BackendCompletion, ChatError> {
        match self.next_reply(request) {
            Reply::Completion(completion) => Ok(completion),
            Reply::Stream(script) | Reply::Slow(script, _) => {
                let mut completion = BackendCompletion::default();
                for event in script {
                    match event {
                        BackendEvent::Text(text) => completion.content.push_str(&text),
                        BackendEvent::Reasoning { text, signature } => {
                            completion.reasoning_content.push_str(&text);
                            completion.reasoning_signature = signature.or(completion.reasoning_signature);
                        }
                        BackendEvent::ToolCalls(calls) => completion.tool_calls.extend(calls),
                        BackendEvent::Usage(usage) => completion.usage = Some(usage),
                    }
                }
                Ok(completion)
            }
            Reply::StreamThenFail(_, status) | Reply::Fail(status) => Err(scripted_error(status)),
        }
    }
}

/// Builds `{model, account, contents}` bodies; image models gain a
/// `generationConfig.responseModalities` entry
pub struct EchoBuilder;

impl RequestBuilder for EchoBuilder {
    fn build(&self, request: &ChatRequest, credential: &Credential) -> Result<BackendRequest, ChatError> {
        Ok(BackendRequest(json!({
            "model": request.model,
            "account": account_of(credential),
            "contents": request.messages,
        })))
    }

    fn augment_for_image_model(&self, request: &mut BackendRequest) {
        if let Some(body) = request.0.as_object_mut() {
            body.insert(
                "generationConfig".to_owned(),
                json!({ "responseModalities": ["TEXT", "IMAGE"] }),
            );
        }
    }
}

/// Wire a pool and backend into the collaborator set
pub fn collaborators(pool: &Arc<MockPool>, backend: &Arc<MockBackend>) -> Collaborators {
    Collaborators {
        credentials: Arc::clone(pool) as Arc<dyn CredentialSource>,
        quotas: Arc::clone(pool) as Arc<dyn QuotaSource>,
        backend: Arc::clone(backend) as Arc<dyn Backend>,
        builder: Arc::new(EchoBuilder),
    }
}
