//! Embedding provider contract and HTTP implementation
//!
//! The provider turns batches of text into fixed-dimension vectors. It may
//! fail per batch; callers degrade to zero vectors instead of aborting,
//! because semantic matching is an enhancement, not a correctness
//! requirement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Placeholder substituted for blank or whitespace-only inputs before a
/// batch is sent to the provider.
const EMPTY_TEXT_PLACEHOLDER: &str = "empty text";

/// Embedding provider trait
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Fixed output dimensionality
    fn dimension(&self) -> usize;

    /// Model identifier, recorded in cache metadata
    fn model(&self) -> &str;
}

/// Replace invalid entries with a placeholder so the provider never sees
/// empty input, and trim the rest.
pub fn sanitize_batch(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .map(|text| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                EMPTY_TEXT_PLACEHOLDER.to_string()
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

/// A batch of zero vectors, used whenever the provider is unavailable or
/// a batch call fails
pub fn zero_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    vec![vec![0.0; dimension]; count]
}

/// Configuration for the OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingsConfig {
    /// Endpoint base, e.g. "https://api.openai.com/v1"
    pub base_url: String,
    /// Model name, e.g. "text-embedding-3-small"
    pub model: String,
    /// Output dimensionality of the model
    pub dimension: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiEmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 180,
        }
    }
}

/// OpenAI-compatible embeddings client
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    config: OpenAiEmbeddingsConfig,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    /// Create a client from an API key and config
    pub fn new(api_key: impl Into<String>, config: OpenAiEmbeddingsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            config,
        }
    }

    /// Create a client reading the key from an environment variable. An
    /// unset variable produces a credential-less client whose calls fail
    /// with `MissingCredentials`, which callers degrade to zero vectors.
    pub fn from_env(var: &str, config: OpenAiEmbeddingsConfig) -> Self {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Self::new(key, config),
            _ => {
                tracing::warn!(var, "embedding API key not set; semantic matching degraded");
                Self::new("", config)
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials);
        }

        let input = sanitize_batch(texts);
        let request = EmbeddingsRequest {
            model: &self.config.model,
            input: &input,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Response(format!(
                "status {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(e.to_string()))?;

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            if vector.len() != self.config.dimension {
                return Err(ProviderError::DimensionMismatch {
                    expected: self.config.dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
