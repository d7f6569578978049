use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use docqa_core::{
    document_id, strip_toc_blocks, validate_document_id, ChunkConfig, Chunker, DocQaError,
    Embedder, TocHeuristics,
};

use crate::answer::{extract_answer, Answer, AnswerOptions};
use crate::cache::{CacheEntry, EmbeddingCache};
use crate::config::ChatbotConfig;
use crate::retrieval::{rank_top_k, RetrievedChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Empty,
    CacheHit,
    Processed,
}

impl IngestStatus {
    pub fn message(&self) -> &'static str {
        match self {
            IngestStatus::Empty => "Empty document.",
            IngestStatus::CacheHit => "Loaded cached embeddings.",
            IngestStatus::Processed => "Document processed.",
        }
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The one document a session answers from. Chunk `i` owns embedding row `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDocument {
    pub id: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl From<CacheEntry> for ActiveDocument {
    fn from(entry: CacheEntry) -> Self {
        Self {
            id: entry.doc_id,
            chunks: entry.chunks,
            embeddings: entry.embeddings,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskResponse {
    pub answer: Answer,
    pub chunks: Vec<RetrievedChunk>,
}

pub struct DocumentChatbot {
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
    chunker: Chunker,
    toc: TocHeuristics,
    active: Option<ActiveDocument>,
}

impl DocumentChatbot {
    pub fn new(embedder: Arc<dyn Embedder>, cache: EmbeddingCache) -> Self {
        Self {
            embedder,
            cache,
            chunker: Chunker::default(),
            toc: TocHeuristics::default(),
            active: None,
        }
    }

    pub fn from_config(config: &ChatbotConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(embedder, EmbeddingCache::new(&config.cache.dir)).with_chunking(config.chunking)
    }

    pub fn with_chunking(mut self, config: ChunkConfig) -> Self {
        self.chunker = Chunker::new(config);
        self
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn active(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    pub fn document_id(&self) -> Option<&str> {
        self.active.as_ref().map(|doc| doc.id.as_str())
    }

    pub fn chunks(&self) -> &[String] {
        self.active.as_ref().map(|doc| doc.chunks.as_slice()).unwrap_or(&[])
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        self.active
            .as_ref()
            .map(|doc| doc.embeddings.as_slice())
            .unwrap_or(&[])
    }

    /// Makes `text` the active document, reusing cached embeddings when the
    /// same content was embedded before by the same model. A missing or empty
    /// `doc_id` means the content hash. On error the previous document stays
    /// active.
    pub fn ingest(&mut self, text: &str, doc_id: Option<&str>) -> Result<IngestStatus> {
        if text.is_empty() {
            self.reset();
            return Ok(IngestStatus::Empty);
        }
        let doc_id = match doc_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                validate_document_id(id)?;
                id.to_string()
            }
            None => document_id(text),
        };
        self.cache.ensure_dir()?;

        if let Some(entry) = self.cache.load(&doc_id)? {
            if entry.model_id == self.embedder.model_id() {
                info!(doc_id = %doc_id, chunks = entry.chunks.len(), "loaded cached embeddings");
                self.active = Some(entry.into());
                return Ok(IngestStatus::CacheHit);
            }
            warn!(
                doc_id = %doc_id,
                cached_model = %entry.model_id,
                model = %self.embedder.model_id(),
                "cached embeddings come from another model, recomputing"
            );
        }

        let chunks = self.chunk(text);
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&chunks)?
        };
        if embeddings.len() != chunks.len() {
            return Err(DocQaError::Misaligned {
                texts: chunks.len(),
                vectors: embeddings.len(),
            }
            .into());
        }
        let entry = CacheEntry::new(doc_id, self.embedder.model_id(), chunks, embeddings)?;
        self.cache.store(&entry)?;
        info!(doc_id = %entry.doc_id, chunks = entry.chunks.len(), "document processed");
        self.active = Some(entry.into());
        Ok(IngestStatus::Processed)
    }

    fn chunk(&self, text: &str) -> Vec<String> {
        let stripped = strip_toc_blocks(text, &self.toc);
        let chunks = self.chunker.chunk_text(&stripped);
        let total = chunks.len();
        let kept: Vec<String> = chunks
            .into_iter()
            .filter(|chunk| !self.toc.looks_like_toc(chunk))
            .collect();
        debug!(total, kept = kept.len(), "chunked document");
        kept
    }

    pub fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let Some(doc) = self.searchable() else {
            return Ok(Vec::new());
        };
        let query = self.embedder.embed_one(question)?;
        Ok(rank_chunks(doc, &query, top_k))
    }

    pub fn answer(&self, question: &str, options: &AnswerOptions) -> Result<Answer> {
        Ok(self.ask(question, options)?.answer)
    }

    /// Answers and also returns the ranked chunks the answer was drawn from.
    pub fn ask(&self, question: &str, options: &AnswerOptions) -> Result<AskResponse> {
        let Some(doc) = self.searchable() else {
            return Ok(AskResponse {
                answer: Answer::NoDocument,
                chunks: Vec::new(),
            });
        };
        let query = self.embedder.embed_one(question)?;
        let chunks = rank_chunks(doc, &query, options.top_k.max(1));
        let answer = extract_answer(self.embedder.as_ref(), &query, &chunks, options)?;
        Ok(AskResponse { answer, chunks })
    }

    pub fn reset(&mut self) {
        self.active = None;
    }

    fn searchable(&self) -> Option<&ActiveDocument> {
        self.active.as_ref().filter(|doc| !doc.chunks.is_empty())
    }
}

fn rank_chunks(doc: &ActiveDocument, query: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
    rank_top_k(query, &doc.embeddings, top_k)
        .into_iter()
        .map(|(index, score)| RetrievedChunk {
            index,
            score,
            text: doc.chunks[index].clone(),
        })
        .collect()
}
