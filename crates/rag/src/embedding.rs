use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::env;

use docqa_core::{DocQaError, Embedder, HashEmbedder, HashEmbedderConfig};

use crate::config::{EmbeddingConfig, EmbeddingProvider, DEFAULT_OPENAI_BASE_URL};

#[derive(Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

/// Process-wide embedding capability, built once by the host and shared with
/// every session.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
    batch_size: usize,
    model_id: String,
}

impl EmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let backend = match config.provider {
            EmbeddingProvider::OpenAi => EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(
                &config.model,
                &config.base_url,
            )?),
            EmbeddingProvider::Hash => {
                EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig {
                    dimensions: config.dimensions,
                    seed: 1337,
                }))
            }
        };
        Ok(Self::with_backend(backend, config.batch_size))
    }

    pub fn hash() -> Self {
        Self::with_backend(EmbeddingBackend::Hash(HashEmbedder::default()), 64)
    }

    fn with_backend(backend: EmbeddingBackend, batch_size: usize) -> Self {
        let model_id = match &backend {
            EmbeddingBackend::Hash(embedder) => embedder.model_id().to_string(),
            EmbeddingBackend::OpenAi(client) => {
                format!("openai:{}@{}", client.model, client.base_url)
            }
        };
        Self {
            backend,
            batch_size: batch_size.max(1),
            model_id,
        }
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.batch_size) {
            let rows = match &self.backend {
                EmbeddingBackend::Hash(embedder) => embedder.embed(batch)?,
                EmbeddingBackend::OpenAi(client) => client.embed_batch(batch)?,
            };
            if rows.len() != batch.len() {
                return Err(DocQaError::Misaligned {
                    texts: batch.len(),
                    vectors: rows.len(),
                }
                .into());
            }
            out.extend(rows);
        }
        tracing::debug!(inputs = inputs.len(), model = %self.model_id, "embedded batch");
        Ok(out)
    }
}

impl Embedder for EmbeddingClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        self.embed_batch(texts).map_err(|e| match e.downcast::<DocQaError>() {
            Ok(err) => err,
            Err(other) => DocQaError::Embedding(other.to_string()),
        })
    }
}

/// Client for any OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http: Client,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let api_key = env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() && base_url == DEFAULT_OPENAI_BASE_URL {
            return Err(anyhow!("OPENAI_API_KEY is required for openai embeddings"));
        }
        Ok(Self {
            http: Client::new(),
            model: model.to_string(),
            base_url,
            api_key,
        })
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let mut request = self.http.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send()?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openai embeddings request failed: {}",
                response.status()
            ));
        }
        let parsed: OpenAiEmbeddingResponse = response.json()?;
        Ok(into_ordered_rows(parsed.data))
    }
}

fn into_ordered_rows(mut data: Vec<OpenAiEmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|row| row.index);
    data.into_iter().map(|row| row.embedding).collect()
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
