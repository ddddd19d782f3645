//! Programmatic configuration builder for integration tests

use sluice_config::{ChatConfig, Config};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with the default chat settings
    pub fn new() -> Self {
        Self {
            config: Config {
                chat: ChatConfig::default(),
            },
        }
    }

    pub fn with_retry_limit(mut self, retry_limit: i64) -> Self {
        self.config.chat.retry_limit = retry_limit;
        self
    }

    /// Serve non-streaming requests by buffering the streaming backend
    pub fn with_fake_non_stream(mut self) -> Self {
        self.config.chat.fake_non_stream = true;
        self
    }

    /// Forward reasoning signatures to clients
    pub fn with_signature_passthrough(mut self) -> Self {
        self.config.chat.pass_signature_to_client = true;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: &str) -> Self {
        interval.clone_into(&mut self.config.chat.heartbeat_interval);
        self
    }

    pub fn with_response_timeout(mut self, timeout: Option<&str>) -> Self {
        self.config.chat.response_timeout = timeout.map(str::to_owned);
        self
    }

    /// Build the final configuration, panicking if it does not validate
    pub fn build(self) -> Config {
        self.config.validate().unwrap();
        self.config
    }
}
