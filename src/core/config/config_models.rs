// Guild configuration models - one composed document per guild.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::automod::AutomodConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Logging module settings: where message and moderation events go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub module_enabled: bool,
    pub message_enabled: bool,
    pub message_channel: Option<u64>,
    pub mod_enabled: bool,
    pub mod_channel: Option<u64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            module_enabled: false,
            message_enabled: true,
            message_channel: None,
            mod_enabled: true,
            mod_channel: None,
        }
    }
}

/// Everything configurable about one guild, stored and cached as a
/// single document so a message-event read is one lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    pub locale: String,
    pub automod: AutomodConfig,
    pub logging: LoggingConfig,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            automod: AutomodConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
