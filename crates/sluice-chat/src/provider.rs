//! Collaborator traits the orchestrator depends on
//!
//! Credential pools, quota bookkeeping, the backend transport and request
//! construction all live outside this crate. They are shared between
//! concurrent requests, so implementations own their locking.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::types::{BackendCompletion, BackendEvent, ChatRequest};

/// Stable identifier used for quota and cooldown bookkeeping
pub type CredentialId = String;

/// Opaque usage credential borrowed for one attempt
#[derive(Debug, Clone)]
pub struct Credential {
    access_token: SecretString,
}

impl Credential {
    /// Wrap an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// Access token, for transports that need to authenticate
    pub const fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Short tag safe for logs: the id when known, else the token tail
    pub fn tag(&self, id: Option<&str>) -> String {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            return id.to_owned();
        }

        let token = self.access_token.expose_secret();
        let tail: String = token
            .chars()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        if tail.is_empty() {
            "unknown".to_owned()
        } else {
            format!("...{tail}")
        }
    }
}

/// Request body addressed to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendRequest(pub Value);

/// Quota snapshot returned by the quota source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaSet(pub Value);

/// Hands out credentials and records their usage
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Next usable credential for `model`, if any
    async fn credential(&self, model: &str) -> Option<Credential>;

    /// Stable identifier for a credential
    fn credential_id(&self, credential: &Credential) -> Option<CredentialId>;

    /// Account one dispatch attempt against a credential
    async fn record_attempt(&self, credential: &Credential, model: &str);
}

/// Fetches and stores per-credential quota
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Query the backend for the credential's current quota
    async fn fetch_quotas(&self, credential: &Credential) -> Result<QuotaSet, ChatError>;

    /// Persist a quota snapshot for a credential
    async fn update_quota(&self, credential_id: &CredentialId, quotas: QuotaSet);
}

/// Backend generation service
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stream events for `request` into `events`, in generation order
    ///
    /// Returns once the backend is done; dropping `events` ends the stream.
    async fn generate_streaming(
        &self,
        request: &BackendRequest,
        credential: &Credential,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<(), ChatError>;

    /// Generate the whole response in one call
    async fn generate_once(
        &self,
        request: &BackendRequest,
        credential: &Credential,
    ) -> Result<BackendCompletion, ChatError>;
}

/// Builds backend requests from chat requests
pub trait RequestBuilder: Send + Sync {
    /// Build the backend body for `request` authenticated by `credential`
    fn build(&self, request: &ChatRequest, credential: &Credential) -> Result<BackendRequest, ChatError>;

    /// Adjust a request for the image generation model family
    fn augment_for_image_model(&self, request: &mut BackendRequest);
}
