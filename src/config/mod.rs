//! Application configuration

pub mod prompts;
pub mod settings;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use prompts::PromptTemplate;
pub use settings::{ConfigError, SessionEntry, Settings};

/// Process-level configuration read from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub settings_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub gemini_api_key: Option<String>,
    pub ollama_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            settings_path: env::var("THREADSMITH_CONFIG").ok().map(PathBuf::from),
            data_dir: env::var("THREADSMITH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            ollama_url: env::var("OLLAMA_URL").ok(),
        })
    }

    /// Load the TOML settings file if one is configured
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        match &self.settings_path {
            Some(path) => Settings::from_file(path),
            None => Ok(Settings::default()),
        }
    }

    /// Resolve the API key for the configured provider.
    ///
    /// `llm.api_key_env` names the variable to read; otherwise `GEMINI_API_KEY`.
    pub fn api_key(&self, settings: &Settings) -> Option<String> {
        match &settings.llm.api_key_env {
            Some(var) => env::var(var).ok(),
            None => self.gemini_api_key.clone(),
        }
    }
}
