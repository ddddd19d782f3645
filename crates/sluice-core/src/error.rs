use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Trait for domain errors that can be converted to HTTP responses
///
/// Implemented by each feature crate's error type. The adapter layer turns
/// these into an [`ErrorPayload`], keeping domain errors decoupled from axum.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}

/// Uniform error object sent to callers, both as a JSON body and as a
/// terminal stream frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}

/// Inner error description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message
    pub message: String,
    /// Machine-readable error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Resolved HTTP status code
    pub code: u16,
}

impl ErrorPayload {
    /// Build a payload from any [`HttpError`] and the status resolved for it
    pub fn from_error<E: HttpError + ?Sized>(error: &E, status: StatusCode) -> Self {
        Self {
            error: ErrorBody {
                message: error.client_message(),
                error_type: error.error_type().to_owned(),
                code: status.as_u16(),
            },
        }
    }
}
