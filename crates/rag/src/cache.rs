use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use docqa_core::DocQaError;

const CACHE_VERSION: u32 = 1;
const FILE_PREFIX: &str = "embeddings_";
const FILE_SUFFIX: &str = ".bin.zst";

/// Chunks and their embeddings for one document, persisted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub doc_id: String,
    pub model_id: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl CacheEntry {
    pub fn new(
        doc_id: impl Into<String>,
        model_id: impl Into<String>,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        let entry = Self {
            version: CACHE_VERSION,
            doc_id: doc_id.into(),
            model_id: model_id.into(),
            chunks,
            embeddings,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn dimensions(&self) -> usize {
        self.embeddings.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self) -> Result<(), DocQaError> {
        if self.version != CACHE_VERSION {
            return Err(DocQaError::CacheCorrupt(format!(
                "unsupported cache version {}",
                self.version
            )));
        }
        if self.chunks.len() != self.embeddings.len() {
            return Err(DocQaError::Misaligned {
                texts: self.chunks.len(),
                vectors: self.embeddings.len(),
            });
        }
        let dims = self.dimensions();
        if self.embeddings.iter().any(|row| row.len() != dims) {
            return Err(DocQaError::CacheCorrupt(format!(
                "{}: embedding rows differ in width",
                self.doc_id
            )));
        }
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let raw = bincode::serialize(self)?;
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3)?;
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = zstd::stream::Decoder::new(bytes)?;
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        let entry: CacheEntry = bincode::deserialize(&raw)
            .map_err(|e| DocQaError::CacheCorrupt(e.to_string()))?;
        entry.validate()?;
        Ok(entry)
    }
}

#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub doc_id: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Content-addressed store: one compressed file per document id.
///
/// Writes go to a temporary file in the same directory that is renamed into
/// place, so a reader sees either the old entry or the new one. Concurrent
/// writers of the same id are not coordinated; the last rename wins.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))
    }

    pub fn path_for(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{doc_id}{FILE_SUFFIX}"))
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.path_for(doc_id).is_file()
    }

    pub fn load(&self, doc_id: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(doc_id);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let entry = CacheEntry::from_bytes(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        if entry.doc_id != doc_id {
            return Err(DocQaError::CacheCorrupt(format!(
                "{} holds document {}",
                path.display(),
                entry.doc_id
            ))
            .into());
        }
        Ok(Some(entry))
    }

    pub fn store(&self, entry: &CacheEntry) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path_for(&entry.doc_id);
        let bytes = entry.to_bytes()?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(doc_id = %entry.doc_id, bytes = bytes.len(), "cached embeddings");
        Ok(path)
    }

    pub fn remove(&self, doc_id: &str) -> Result<bool> {
        let path = self.path_for(doc_id);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    pub fn entries(&self) -> Result<Vec<CachedDocument>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let item = item?;
            let name = item.file_name().to_string_lossy().to_string();
            let Some(doc_id) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            entries.push(CachedDocument {
                doc_id: doc_id.to_string(),
                path: item.path(),
                bytes: item.metadata()?.len(),
            });
        }
        entries.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        Ok(entries)
    }

    pub fn clear(&self) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_file(&entry.path)?;
        }
        Ok(entries.len())
    }
}
