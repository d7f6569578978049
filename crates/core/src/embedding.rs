use rayon::prelude::*;

use crate::error::{DocQaError, Result};

/// Turns text into fixed-width vectors. Identical input must give identical
/// output for the lifetime of a `model_id`.
pub trait Embedder: Send + Sync {
    /// Identifies the model and its settings; cache entries are tagged with it.
    fn model_id(&self) -> &str;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.embed(&[text.to_string()])?;
        match rows.pop() {
            Some(row) if rows.is_empty() => Ok(row),
            _ => Err(DocQaError::Embedding(
                "expected exactly one vector for one input".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedderConfig {
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self {
        Self {
            dimensions: 256,
            seed: 1337,
        }
    }
}

/// Offline bag-of-words embedder: tokens are hashed into buckets and the
/// counts L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    config: HashEmbedderConfig,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Self {
        let config = HashEmbedderConfig {
            dimensions: config.dimensions.max(1),
            ..config
        };
        Self {
            model_id: format!("hash-{}-{}", config.dimensions, config.seed),
            config,
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.config.dimensions];
        for token in tokens(text) {
            let bucket = self.bucket_for(&token);
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    fn bucket_for(&self, token: &str) -> usize {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.config.seed.to_le_bytes());
        hasher.update(token.as_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(head) % self.config.dimensions as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HashEmbedderConfig::default())
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.par_iter().map(|text| self.embed_text(text)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|raw| raw.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
