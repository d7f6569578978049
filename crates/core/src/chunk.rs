use serde::{Deserialize, Serialize};

use crate::normalization::{normalize_text, split_sentences, word_count};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkConfig {
    pub max_words: usize,
    pub overlap_sentences: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_words: 250,
            overlap_sentences: 2,
        }
    }
}

/// Packs paragraphs (or the sentences of oversized paragraphs) into chunks of
/// at most `max_words` words, carrying the trailing units of each chunk into
/// the next one.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk_text(&self, raw: &str) -> Vec<String> {
        self.chunk_normalized(&normalize_text(raw))
    }

    pub fn chunk_normalized(&self, normalized: &str) -> Vec<String> {
        self.chunk_units(normalized)
            .into_iter()
            .map(|units| units.join(" "))
            .collect()
    }

    /// Same packing as [`Chunker::chunk_normalized`], but keeps the units of
    /// each chunk apart.
    pub fn chunk_units(&self, normalized: &str) -> Vec<Vec<String>> {
        let max_words = self.config.max_words.max(1);
        let mut chunks = Vec::new();
        let mut acc = Accumulator::default();
        for paragraph in normalized.lines().map(str::trim).filter(|p| !p.is_empty()) {
            if word_count(paragraph) > max_words {
                for sentence in split_sentences(paragraph) {
                    acc.push(sentence, max_words, self.config.overlap_sentences, &mut chunks);
                }
            } else {
                acc.push(paragraph, max_words, self.config.overlap_sentences, &mut chunks);
            }
        }
        if !acc.units.is_empty() {
            chunks.push(acc.units);
        }
        chunks
    }
}

#[derive(Default)]
struct Accumulator {
    units: Vec<String>,
    words: usize,
}

impl Accumulator {
    fn push(&mut self, unit: &str, max_words: usize, overlap: usize, chunks: &mut Vec<Vec<String>>) {
        let unit = unit.trim();
        let unit_words = word_count(unit);
        if unit_words == 0 {
            return;
        }
        if !self.units.is_empty() && self.words + unit_words > max_words {
            let keep = overlap.min(self.units.len());
            let mut seed = self.units[self.units.len() - keep..].to_vec();
            chunks.push(std::mem::take(&mut self.units));
            let mut seed_words: usize = seed.iter().map(|u| word_count(u)).sum();
            // oldest overlap units go first when the seed would overflow the next chunk
            while !seed.is_empty() && seed_words + unit_words > max_words {
                seed_words -= word_count(&seed.remove(0));
            }
            self.units = seed;
            self.words = seed_words;
        }
        self.units.push(unit.to_string());
        self.words += unit_words;
    }
}
