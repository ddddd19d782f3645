//! Bounded retry loop with credential rotation
//!
//! A rate-limited attempt rotates the credential, rebuilds the backend request
//! and tries again. Every other failure is surfaced as-is.

use async_trait::async_trait;
use http::StatusCode;

use crate::error::ChatError;
use crate::provider::{BackendRequest, Credential, CredentialId};

/// Hard ceiling on configured retries
pub const MAX_RETRIES: u32 = 10;

/// How many times a rate-limited request may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
}

impl RetryPolicy {
    /// Clamp a configured retry limit into `0..=MAX_RETRIES`
    pub fn from_limit(limit: i64) -> Self {
        let retries = u32::try_from(limit.clamp(0, i64::from(MAX_RETRIES))).unwrap_or(0);
        Self { retries }
    }

    /// Total attempts including the first one
    pub const fn max_attempts(self) -> u32 {
        self.retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_limit(3)
    }
}

/// Mutable dispatch state, replaced in place by rotation
#[derive(Debug, Clone)]
pub struct RetryState {
    pub request: BackendRequest,
    pub credential: Credential,
    pub credential_id: Option<CredentialId>,
}

impl RetryState {
    /// Log-safe tag of the current credential
    pub fn credential_tag(&self) -> String {
        self.credential.tag(self.credential_id.as_deref())
    }
}

/// Describes the attempt that just failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    /// One-based attempt number
    pub attempt: u32,
    pub status: StatusCode,
    pub credential_id: Option<CredentialId>,
}

/// Side effects run around each attempt
#[async_trait]
pub trait RetryHooks: Send + Sync {
    /// Runs before every attempt, including the first
    async fn on_attempt(&self, state: &RetryState);

    /// Rotate the credential after a rate-limited attempt
    async fn on_retry(&self, context: &RetryContext, state: &mut RetryState);

    /// Refresh quota for the credential that was rate limited
    async fn refresh_quota(&self, context: &RetryContext, credential: &Credential);
}

/// One dispatch attempt against the current state
#[async_trait]
pub trait Attempt: Send {
    type Output: Send;

    async fn run(&mut self, state: &RetryState) -> Result<Self::Output, ChatError>;
}

/// Run `attempt` until it succeeds, fails terminally or the bound is reached
pub async fn run_with_retry<A>(
    attempt: &mut A,
    state: &mut RetryState,
    policy: RetryPolicy,
    hooks: &dyn RetryHooks,
) -> Result<A::Output, ChatError>
where
    A: Attempt + ?Sized,
{
    let max_attempts = policy.max_attempts();
    let mut attempt_no = 1;

    loop {
        hooks.on_attempt(state).await;

        let error = match attempt.run(state).await {
            Ok(output) => return Ok(output),
            Err(e) => e,
        };

        if !error.is_rate_limited() {
            return Err(error);
        }

        if attempt_no >= max_attempts {
            tracing::error!(
                attempt = attempt_no,
                credential = %state.credential_tag(),
                "rate limited on final attempt, giving up"
            );
            return Err(error.exhausted());
        }

        tracing::warn!(
            attempt = attempt_no,
            max_attempts,
            status = StatusCode::TOO_MANY_REQUESTS.as_u16(),
            credential = %state.credential_tag(),
            error = %error,
            "rate limited, rotating credential and retrying"
        );

        let context = RetryContext {
            attempt: attempt_no,
            status: StatusCode::TOO_MANY_REQUESTS,
            credential_id: state.credential_id.clone(),
        };
        let failed = state.credential.clone();

        hooks.on_retry(&context, state).await;
        hooks.refresh_quota(&context, &failed).await;

        attempt_no += 1;
    }
}
