use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use docqa_core::{split_sentences, DocQaError, Embedder};

use crate::retrieval::{rank_top_k, RetrievedChunk};

pub const NO_DOCUMENT: &str = "No document loaded.";
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";
pub const NOT_SUMMARIZABLE: &str =
    "Relevant information was found, but could not be summarized clearly.";

/// Sentences this short or shorter are headers and fragments.
pub const MIN_SENTENCE_CHARS: usize = 25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnswerOptions {
    pub top_k: usize,
    pub max_sentences: usize,
    pub min_score: f32,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_sentences: 3,
            min_score: 0.2,
        }
    }
}

/// Outcome of a question. Only `Extracted` carries document text; the other
/// variants render as fixed sentinel messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Extracted(String),
    NoDocument,
    LowConfidence { best_score: f32 },
    Unsummarizable,
}

impl Answer {
    pub fn text(&self) -> &str {
        match self {
            Answer::Extracted(text) => text,
            Answer::NoDocument => NO_DOCUMENT,
            Answer::LowConfidence { .. } => NO_RELEVANT_INFORMATION,
            Answer::Unsummarizable => NOT_SUMMARIZABLE,
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, Answer::Extracted(_))
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

pub fn candidate_sentences(chunks: &[RetrievedChunk]) -> Vec<String> {
    chunks
        .iter()
        .flat_map(|chunk| split_sentences(&chunk.text))
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
        .map(str::to_string)
        .collect()
}

/// Picks the sentences of `retrieved` closest to the question vector and
/// joins them most relevant first.
pub fn extract_answer(
    embedder: &dyn Embedder,
    query: &[f32],
    retrieved: &[RetrievedChunk],
    options: &AnswerOptions,
) -> Result<Answer> {
    let Some(best) = retrieved.first() else {
        return Ok(Answer::NoDocument);
    };
    if best.score < options.min_score {
        tracing::debug!(best_score = best.score, min_score = options.min_score, "below threshold");
        return Ok(Answer::LowConfidence {
            best_score: best.score,
        });
    }
    let candidates = candidate_sentences(retrieved);
    if candidates.is_empty() {
        return Ok(Answer::Unsummarizable);
    }
    let sentence_vectors = embedder.embed(&candidates)?;
    if sentence_vectors.len() != candidates.len() {
        return Err(DocQaError::Misaligned {
            texts: candidates.len(),
            vectors: sentence_vectors.len(),
        }
        .into());
    }
    let picked = rank_top_k(query, &sentence_vectors, options.max_sentences.max(1));
    let answer = picked
        .iter()
        .map(|(idx, _)| candidates[*idx].as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Answer::Extracted(answer))
}
