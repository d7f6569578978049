use sha2::{Digest, Sha256};

use crate::error::{DocQaError, Result};

/// Content address of a document: SHA-256 of its UTF-8 text, hex encoded.
pub fn document_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Explicit ids end up in cache file names, so they must be a single safe
/// path component.
pub fn validate_document_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(DocQaError::InvalidDocumentId(id.to_string()))
    }
}
