use std::time::Duration;

use serde::Deserialize;

/// Chat completion orchestration configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Retries allowed after a rate-limited attempt (clamped at runtime)
    #[serde(default = "default_retry_limit")]
    pub retry_limit: i64,
    /// Serve non-streaming requests by buffering a streaming backend call
    #[serde(default)]
    pub fake_non_stream: bool,
    /// Forward reasoning signatures (`thoughtSignature`) to clients
    #[serde(default)]
    pub pass_signature_to_client: bool,
    /// Keep-alive interval for open streams (e.g. "15s")
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: String,
    /// How long the HTTP adapter waits for a response before giving up
    /// (e.g. "5m"). Non-streaming paths lift this limit once they start.
    #[serde(default = "default_response_timeout")]
    pub response_timeout: Option<String>,
    /// Capacity of the in-request backend event and frame channels
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            retry_limit: default_retry_limit(),
            fake_non_stream: false,
            pass_signature_to_client: false,
            heartbeat_interval: default_heartbeat_interval(),
            response_timeout: default_response_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ChatConfig {
    /// Get the heartbeat interval as Duration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid duration
    pub fn heartbeat_interval_duration(&self) -> anyhow::Result<Duration> {
        parse_duration("heartbeat_interval", &self.heartbeat_interval)
    }

    /// Get the response timeout as Duration, if one is configured
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid duration
    pub fn response_timeout_duration(&self) -> anyhow::Result<Option<Duration>> {
        self.response_timeout
            .as_deref()
            .map(|value| parse_duration("response_timeout", value))
            .transpose()
    }
}

fn parse_duration(field: &str, value: &str) -> anyhow::Result<Duration> {
    duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid chat.{field} '{value}': {e}"))
}

#[allow(clippy::missing_const_for_fn)]
fn default_retry_limit() -> i64 {
    3
}

fn default_heartbeat_interval() -> String {
    "15s".to_owned()
}

#[allow(clippy::unnecessary_wraps)]
fn default_response_timeout() -> Option<String> {
    Some("5m".to_owned())
}

#[allow(clippy::missing_const_for_fn)]
fn default_event_buffer() -> usize {
    64
}
