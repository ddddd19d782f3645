use http::StatusCode;
use sluice_core::{ErrorPayload, HttpError};
use thiserror::Error;

/// Errors that can occur while serving a chat completion
#[derive(Debug, Error)]
pub enum ChatError {
    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The credential source had nothing to hand out for this model
    #[error("no usable credential available for model `{model}`")]
    CredentialUnavailable { model: String },

    /// Backend rejected the attempt with a rate-limit status
    #[error("{message}")]
    RateLimited { message: String },

    /// Any other backend failure, or a rate limit that outlived the retry budget
    #[error("{message}")]
    Backend {
        /// Status reported by the backend, if any
        status: Option<StatusCode>,
        message: String,
    },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Classify a backend failure by its status code
    pub fn upstream(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();

        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited { message }
        } else {
            Self::Backend {
                status: Some(status),
                message,
            }
        }
    }

    /// Whether this error should rotate the credential and retry
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Status carried by the error itself, if any
    pub const fn explicit_status(&self) -> Option<StatusCode> {
        match self {
            Self::InvalidRequest(_) => Some(StatusCode::BAD_REQUEST),
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Backend { status, .. } => *status,
            Self::CredentialUnavailable { .. } | Self::Internal(_) => None,
        }
    }

    /// Degrade a rate limit that exhausted the retry budget into a backend error
    ///
    /// Status and message are kept; only the classification changes.
    #[must_use]
    pub fn exhausted(self) -> Self {
        match self {
            Self::RateLimited { message } => Self::Backend {
                status: Some(StatusCode::TOO_MANY_REQUESTS),
                message,
            },
            other => other,
        }
    }
}

impl HttpError for ChatError {
    fn status_code(&self) -> StatusCode {
        self.explicit_status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::CredentialUnavailable { .. } => "credential_unavailable_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::Backend { .. } => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Convert any failure into the single error shape sent to callers
///
/// Returns the resolved status together with the payload so the same value
/// can back a JSON response or a terminal stream frame.
pub fn to_error_payload(error: &ChatError) -> (StatusCode, ErrorPayload) {
    let status = error.status_code();
    (status, ErrorPayload::from_error(error, status))
}
