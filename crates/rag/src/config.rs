use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use docqa_core::ChunkConfig;

use crate::answer::AnswerOptions;

pub const DEFAULT_CACHE_DIR: &str = "models_cache";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Hash,
    OpenAi,
}

impl EmbeddingProvider {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "hash" => Some(Self::Hash),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub base_url: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            model: "text-embedding-3-small".to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            dimensions: 256,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

/// Everything a [`crate::DocumentChatbot`] host needs, as read from
/// `docqa.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatbotConfig {
    pub cache: CacheConfig,
    pub chunking: ChunkConfig,
    pub retrieval: AnswerOptions,
    pub embedding: EmbeddingConfig,
}

impl ChatbotConfig {
    /// A missing file is not an error; it means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow!("invalid config: {e}"))
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DOCQA_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = EmbeddingProvider::from_str(&name)
                .ok_or_else(|| anyhow!("unknown embedding provider {name}"))?;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("EMBEDDING_BASE_URL") {
            self.embedding.base_url = url;
        }
        if let Some(dims) = lookup("HASH_EMBED_DIMENSIONS").and_then(|v| v.parse().ok()) {
            self.embedding.dimensions = dims;
        }
        Ok(())
    }
}
