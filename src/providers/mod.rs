//! Generative backends
//!
//! A backend turns a prompt into a lazy stream of text chunks. Chunk boundaries
//! carry no meaning and may fall anywhere inside a word or sentence.

mod gemini;
mod ollama;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use crate::config::{Config, Settings};

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream failed: {0}")]
    Stream(String),
}

/// Finite, non-restartable sequence of text chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// A text-completion service with a streaming interface
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> &str;

    /// Start a generation. Errors returned here happen before any chunk exists;
    /// errors inside the stream happen after output may already have been produced.
    async fn stream_generate(&self, model: &str, prompt: &str)
        -> Result<ChunkStream, ProviderError>;
}

/// Build the backend named in the settings
pub fn from_settings(
    settings: &Settings,
    config: &Config,
) -> Result<Arc<dyn GenerativeBackend>, ProviderError> {
    let timeout = std::time::Duration::from_secs(settings.llm.timeout_secs);

    match settings.llm.provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            let api_key = config
                .api_key(settings)
                .ok_or_else(|| ProviderError::NotConfigured("gemini API key".into()))?;
            let base_url = settings
                .llm
                .endpoint
                .clone()
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string());
            Ok(Arc::new(GeminiProvider::new(base_url, api_key, timeout)?))
        }
        "ollama" => {
            let url = settings
                .llm
                .endpoint
                .clone()
                .or_else(|| config.ollama_url.clone())
                .unwrap_or_else(|| "http://localhost:11434".into());
            Ok(Arc::new(OllamaProvider::new(url, timeout)?))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

/// Splits a byte stream into complete lines, keeping partial lines across pushes.
///
/// Lines are only decoded once their terminating `\n` has arrived, so a UTF-8
/// sequence split across network chunks is decoded whole.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// Whatever is left once the byte stream has ended
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}
