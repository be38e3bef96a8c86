//! LLM provider abstraction.
//!
//! One implementation per backend, selected once at startup from config and
//! injected as `Arc<dyn LlmProvider>`; business logic never branches on a
//! provider string. Transient empty completions are retried with a bounded
//! exponential backoff; hard provider errors surface immediately.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

/// Maximum characters to send per text to the embedding API. Keeps dense
/// inputs safely under the embedding model's context window.
const MAX_EMBED_CHARS: usize = 3_000;

/// Attempts before an empty completion becomes a hard error.
const MAX_EMPTY_ATTEMPTS: u32 = 4;

/// Initial backoff after an empty completion; doubles per attempt.
const EMPTY_BACKOFF: Duration = Duration::from_millis(500);

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-turn chat completion.
    async fn complete(&self, prompt: &str, model: &str) -> Result<String>;

    /// Batch embedding generation, one vector per input text.
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;
}

impl std::fmt::Debug for dyn LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LlmProvider")
    }
}

/// Build the provider named in config. Unknown provider strings fail here,
/// at startup, not inside the request path.
pub fn from_config(client: reqwest::Client, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider {
            client,
            base_url: config.base_url.clone(),
        })),
        "openai" => Ok(Arc::new(OpenAiProvider {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
        })),
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

/// `complete` wrapped in a bounded retry for transient empty responses.
/// Backoff doubles per attempt; after `MAX_EMPTY_ATTEMPTS` empty replies
/// the call fails instead of blocking forever.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    prompt: &str,
    model: &str,
) -> Result<String> {
    let mut backoff = EMPTY_BACKOFF;
    for attempt in 1..=MAX_EMPTY_ATTEMPTS {
        let response = provider.complete(prompt, model).await?;
        if !response.trim().is_empty() {
            return Ok(response);
        }
        tracing::warn!("Empty completion from model '{model}' (attempt {attempt})");
        if attempt < MAX_EMPTY_ATTEMPTS {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
    anyhow::bail!("Model '{model}' returned an empty completion {MAX_EMPTY_ATTEMPTS} times")
}

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char
/// boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ─── Ollama ──────────────────────────────────────────────

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's
    /// context length instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let req = OllamaChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama chat API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama chat API returned {status}: {body}");
        }

        let body: OllamaChatResponse = resp.json().await?;
        Ok(body.message.content)
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.base_url);

        let batch_size = 32;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = OllamaEmbedRequest {
                model: model.to_string(),
                input: chunk
                    .iter()
                    .map(|t| truncate_for_embedding(t).to_string())
                    .collect(),
                truncate: true,
            };

            let resp = self
                .client
                .post(&url)
                .json(&req)
                .send()
                .await
                .context("Failed to call Ollama embed API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Ollama embed API returned {status}: {body}");
            }

            let body: OllamaEmbedResponse = resp
                .json()
                .await
                .context("Failed to parse Ollama embed response")?;

            all_embeddings.extend(body.embeddings);
        }

        Ok(all_embeddings)
    }
}

// ─── OpenAI-compatible ───────────────────────────────────

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let req = OpenAiChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI chat API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI chat API returned {status}: {body}");
        }

        let body: OpenAiChatResponse = resp.json().await?;
        Ok(body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v1/embeddings", self.base_url);

        let batch_size = 64;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = OpenAiEmbedRequest {
                model: model.to_string(),
                input: chunk
                    .iter()
                    .map(|t| truncate_for_embedding(t).to_string())
                    .collect(),
            };

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&req)
                .send()
                .await
                .context("Failed to call OpenAI embed API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("OpenAI embed API returned {status}: {body}");
            }

            let body: OpenAiEmbedResponse = resp
                .json()
                .await
                .context("Failed to parse OpenAI embed response")?;

            let mut embeddings: Vec<Vec<f32>> =
                body.data.into_iter().map(|d| d.embedding).collect();
            all_embeddings.append(&mut embeddings);
        }

        Ok(all_embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EmptyThenOk {
        calls: AtomicU32,
        empty_count: u32,
    }

    #[async_trait]
    impl LlmProvider for EmptyThenOk {
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.empty_count {
                Ok("  ".to_string())
            } else {
                Ok("hello".to_string())
            }
        }

        async fn embed(&self, _texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_empty_responses() {
        let provider = EmptyThenOk {
            calls: AtomicU32::new(0),
            empty_count: 2,
        };
        let out = complete_with_retry(&provider, "p", "m").await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let provider = EmptyThenOk {
            calls: AtomicU32::new(0),
            empty_count: u32::MAX,
        };
        let err = complete_with_retry(&provider, "p", "m").await.unwrap_err();
        assert!(err.to_string().contains("empty completion"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), MAX_EMPTY_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_retry_propagates_hard_errors() {
        struct AlwaysErr;

        #[async_trait]
        impl LlmProvider for AlwaysErr {
            async fn complete(&self, _prompt: &str, _model: &str) -> Result<String> {
                anyhow::bail!("connection refused")
            }
            async fn embed(&self, _texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
                Ok(Vec::new())
            }
        }

        let err = complete_with_retry(&AlwaysErr, "p", "m").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            ..LlmConfig::default()
        };
        let err = from_config(reqwest::Client::new(), &config).unwrap_err();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[test]
    fn test_truncate_for_embedding_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS); // 2 bytes per char
        let out = truncate_for_embedding(&text);
        assert!(out.len() <= MAX_EMBED_CHARS);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
