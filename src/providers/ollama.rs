//! Ollama provider implementation

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChunkStream, GenerativeBackend, LineBuffer, ProviderError};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streamed `/api/generate` response
#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaProvider {
    pub fn new(base_url: String, connect_timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GenerativeBackend for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<ChunkStream, ProviderError> {
        let request = OllamaRequest {
            model,
            prompt,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidResponse(format!(
                "{}: {}",
                status, body
            )));
        }

        Ok(Box::pin(ndjson_chunks(response.bytes_stream())))
    }
}

fn ndjson_chunks<S, B>(bytes: S) -> impl Stream<Item = Result<String, ProviderError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]>,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut lines = LineBuffer::default();
        let mut done = false;

        while !done {
            let Some(chunk) = bytes.next().await else { break };
            let chunk = chunk?;
            for line in lines.push(chunk.as_ref()) {
                let Some(parsed) = parse_line(&line)? else { continue };
                if !parsed.response.is_empty() {
                    yield parsed.response;
                }
                if parsed.done {
                    done = true;
                    break;
                }
            }
        }

        if !done {
            if let Some(line) = lines.finish() {
                if let Some(parsed) = parse_line(&line)? {
                    if !parsed.response.is_empty() {
                        yield parsed.response;
                    }
                }
            }
        }
    }
}

fn parse_line(line: &str) -> Result<Option<OllamaChunk>, ProviderError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: OllamaChunk = serde_json::from_str(line)
        .map_err(|e| ProviderError::Stream(format!("unparseable line: {}", e)))?;

    match chunk.error {
        Some(error) => Err(ProviderError::Stream(error)),
        None => Ok(Some(chunk)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, reqwest::Error>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    #[tokio::test]
    async fn test_ndjson_stream() {
        let body = chunks(&[
            "{\"response\":\"Tweet \",\"done\":false}\n{\"resp",
            "onse\":\"1/1\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        ]);

        let texts: Vec<String> = ndjson_chunks(futures::stream::iter(body))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(texts, vec!["Tweet ", "1/1"]);
    }

    #[tokio::test]
    async fn test_ndjson_error_line() {
        let body = chunks(&[
            "{\"response\":\"Hi\",\"done\":false}\n",
            "{\"error\":\"model not found\"}\n",
        ]);

        let items: Vec<Result<String, ProviderError>> =
            ndjson_chunks(futures::stream::iter(body)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Hi");
        assert!(matches!(&items[1], Err(ProviderError::Stream(msg)) if msg == "model not found"));
    }

    #[tokio::test]
    async fn test_ndjson_unterminated_tail() {
        let body = chunks(&["{\"response\":\"tail\",\"done\":true}"]);

        let texts: Vec<String> = ndjson_chunks(futures::stream::iter(body))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(texts, vec!["tail"]);
    }
}
