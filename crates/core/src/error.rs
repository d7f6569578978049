use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocQaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported input format: {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("pdf extract failed: {0}")]
    Pdf(String),
    #[error("docx extract failed: {0}")]
    Docx(String),
    #[error("embedding backend error: {0}")]
    Embedding(String),
    #[error("corrupt cache entry: {0}")]
    CacheCorrupt(String),
    #[error("invalid document id: {0:?}")]
    InvalidDocumentId(String),
    #[error("embedding count mismatch: {texts} texts, {vectors} vectors")]
    Misaligned { texts: usize, vectors: usize },
}

pub type Result<T> = std::result::Result<T, DocQaError>;

impl From<zip::result::ZipError> for DocQaError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Docx(value.to_string())
    }
}
