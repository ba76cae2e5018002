//! Embedding providers
//!
//! Ollama, OpenAI-compatible endpoints, and a deterministic mock used by
//! tests and offline scans.

use crate::repo::{EmbeddingConfig, EmbeddingProviderKind};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Build the provider named by the configuration, if any
pub fn provider_from_config(config: &EmbeddingConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::None => None,
        EmbeddingProviderKind::Ollama => Some(Arc::new(
            LocalEmbedding::new(&config.endpoint, &config.model)
                .with_dimension(config.dimension)
                .with_retries(config.max_retries),
        )),
        EmbeddingProviderKind::Openai => {
            let api_key = config
                .api_key_env
                .as_deref()
                .and_then(|name| std::env::var(name).ok());
            Some(Arc::new(
                OpenAIEmbedding::new(&config.endpoint, &config.model, api_key.as_deref())
                    .with_dimension(config.dimension)
                    .with_retries(config.max_retries),
            ))
        }
        EmbeddingProviderKind::Mock => Some(Arc::new(MockEmbedding::new(config.dimension))),
    }
}

/// POST `body` as JSON, retrying with linear backoff
async fn post_json<B, R>(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &B,
    max_retries: usize,
) -> Result<R>
where
    B: Serialize + Sync,
    R: DeserializeOwned,
{
    let attempts = max_retries.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        let mut request = client.post(url).json(body);
        if let Some(key) = api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let result = async {
            let response = request
                .send()
                .await
                .context("Failed to send embedding request")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Embedding request failed: {} - {}", status, body);
            }

            response
                .json::<R>()
                .await
                .context("Failed to parse embedding response")
        }
        .await;

        match result {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                tracing::warn!("Embedding request failed (attempt {}): {}", attempt + 1, e);
                last_error = Some(e);
                if attempt + 1 < attempts {
                    tokio::time::sleep(Duration::from_millis(250 * (attempt as u64 + 1))).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Embedding request failed")))
}

/// Local embedding provider using Ollama or compatible API
pub struct LocalEmbedding {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
    max_retries: usize,
}

impl LocalEmbedding {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            dimension: 768,
            max_retries: 3,
        }
    }

    /// Create with Ollama defaults
    pub fn ollama(model: &str) -> Self {
        Self::new("http://localhost:11434", model)
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.endpoint);
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response: OllamaEmbedResponse =
            post_json(&self.client, &url, None, &request, self.max_retries).await?;

        if response.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            );
        }

        Ok(response.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// OpenAI-compatible embedding provider
pub struct OpenAIEmbedding {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    dimension: usize,
    max_retries: usize,
}

impl OpenAIEmbedding {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            client: reqwest::Client::new(),
            dimension: 1536,
            max_retries: 3,
        }
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.endpoint);
        let request = OpenAIEmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let result: OpenAIEmbeddingResponse = post_json(
            &self.client,
            &url,
            self.api_key.as_deref(),
            &request,
            self.max_retries,
        )
        .await?;

        let mut embeddings: Vec<_> = result
            .data
            .into_iter()
            .map(|d| (d.index, d.embedding))
            .collect();

        // Responses are not guaranteed to be in request order
        embeddings.sort_by_key(|(idx, _)| *idx);

        if embeddings.len() != texts.len() {
            anyhow::bail!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            );
        }

        Ok(embeddings.into_iter().map(|(_, e)| e).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Deterministic embeddings derived from the text's content hash
pub struct MockEmbedding {
    dimension: usize,
}

impl MockEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let hash = crate::extract::content_hash(text);
        let bytes = hash.as_bytes();

        (0..self.dimension)
            .map(|i| {
                let byte = bytes[i % bytes.len()] as f32;
                (byte / 255.0) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedding() {
        let provider = MockEmbedding::new(32);
        let embedding = provider.embed("fn main() {}").await.unwrap();
        assert_eq!(embedding.len(), 32);

        assert_eq!(embedding, provider.embed("fn main() {}").await.unwrap());
        assert_ne!(embedding, provider.embed("fn other() {}").await.unwrap());

        let batch = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.embed("a").await.unwrap());
    }

    #[test]
    fn test_provider_from_config() {
        let mut config = EmbeddingConfig::default();
        assert!(provider_from_config(&config).is_none());

        config.provider = EmbeddingProviderKind::Mock;
        config.dimension = 16;
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.dimension(), 16);
    }
}
