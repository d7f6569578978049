mod chunk;
mod document;
mod embedding;
mod error;
mod extract;
mod normalization;

pub use chunk::{ChunkConfig, Chunker};
pub use document::{document_id, validate_document_id};
pub use embedding::{Embedder, HashEmbedder, HashEmbedderConfig};
pub use error::{DocQaError, Result};
pub use extract::{FileExtractor, TextExtractor, SUPPORTED_EXTENSIONS};
pub use normalization::{
    looks_like_toc, normalize_text, split_sentences, strip_toc_blocks, word_count, TocHeuristics,
};
