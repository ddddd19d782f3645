use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails, or
    /// validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if TOML parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if a duration cannot be parsed or a chat setting
    /// would stall the request pipeline
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_chat_config()?;
        Ok(())
    }

    /// Validate chat-specific configuration
    fn validate_chat_config(&self) -> anyhow::Result<()> {
        let heartbeat = self.chat.heartbeat_interval_duration()?;
        if heartbeat.is_zero() {
            anyhow::bail!("chat.heartbeat_interval must be greater than 0");
        }

        if let Some(timeout) = self.chat.response_timeout_duration()?
            && timeout.is_zero()
        {
            anyhow::bail!("chat.response_timeout must be greater than 0 when set");
        }

        if self.chat.event_buffer == 0 {
            anyhow::bail!("chat.event_buffer must be greater than 0");
        }

        Ok(())
    }
}
