#![allow(clippy::must_use_candidate)]

pub mod chat;
mod loader;

use serde::Deserialize;

pub use chat::*;

/// Top-level Sluice configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Chat completion orchestration settings
    #[serde(default)]
    pub chat: ChatConfig,
}
