//! Deployment settings loaded from a TOML file
//!
//! Every section is optional, so an empty file (or no file at all) yields a
//! working configuration that talks to Gemini and accepts no sessions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmSettings,

    /// Instruction template
    #[serde(default)]
    pub prompt: PromptSettings,

    /// Session tokens accepted by the identity resolver
    #[serde(default)]
    pub auth: AuthSettings,

    /// Stored chat history
    #[serde(default)]
    pub history: HistorySettings,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load settings from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".into()));
        }
        if self.history.max_stored_messages == Some(0) {
            return Err(ConfigError::Validation(
                "history.max_stored_messages must be at least 1".into(),
            ));
        }
        if let Some(session) = self
            .auth
            .sessions
            .iter()
            .find(|s| s.token.is_empty() || s.user_id.is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "session for user '{}' has an empty token or user id",
                session.user_id
            )));
        }
        Ok(())
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider name: "gemini" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key (cloud providers)
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Custom API endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout for establishing the upstream stream
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-preview-05-20".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: None,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Path to an instruction template; the built-in one is used when unset
    #[serde(default)]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

/// One accepted session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Keep only this many most recent messages per stored chat
    #[serde(default)]
    pub max_stored_messages: Option<usize>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
