use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?] +").unwrap());

const TOC_KEYWORDS: [&str; 5] = ["table of contents", "contents", "chapter", "section", "page"];

/// Thresholds for spotting table-of-contents and page-index noise.
#[derive(Debug, Clone, Copy)]
pub struct TocHeuristics {
    pub min_short_lines: usize,
    pub max_line_len: usize,
    pub digit_ratio: f32,
}

impl Default for TocHeuristics {
    fn default() -> Self {
        Self {
            min_short_lines: 6,
            max_line_len: 40,
            digit_ratio: 0.15,
        }
    }
}

impl TocHeuristics {
    /// Many short lines with a high share of digits, like a page index.
    pub fn is_index_like(&self, text: &str) -> bool {
        let short_lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| line.chars().count() <= self.max_line_len)
            .count();
        short_lines >= self.min_short_lines && digit_ratio(text) >= self.digit_ratio
    }

    pub fn looks_like_toc(&self, chunk: &str) -> bool {
        if chunk.lines().all(|line| line.trim().is_empty()) {
            return false;
        }
        self.is_index_like(chunk) || has_toc_keyword(chunk)
    }
}

pub fn looks_like_toc(chunk: &str) -> bool {
    TocHeuristics::default().looks_like_toc(chunk)
}

fn has_toc_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    TOC_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn digit_ratio(text: &str) -> f32 {
    let total = text.chars().count().max(1);
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    digits as f32 / total as f32
}

/// Merges wrapped lines into one paragraph per line.
///
/// Line endings are unified and runs of spaces/tabs collapsed first. A blank
/// line ends the current paragraph, and so does a line ending in `.`, `!` or
/// `?`; every other line is treated as wrapped and joined onto the buffer.
pub fn normalize_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let unified = unify_line_endings(raw);
    let collapsed = HORIZONTAL_WS.replace_all(&unified, " ");

    let mut paragraphs: Vec<String> = Vec::new();
    let mut buffer = String::new();
    for line in collapsed.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            flush_paragraph(&mut buffer, &mut paragraphs);
            continue;
        }
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(line);
        if line.ends_with(['.', '!', '?']) {
            flush_paragraph(&mut buffer, &mut paragraphs);
        }
    }
    flush_paragraph(&mut buffer, &mut paragraphs);
    paragraphs.join("\n")
}

fn flush_paragraph(buffer: &mut String, paragraphs: &mut Vec<String>) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        paragraphs.push(trimmed.to_string());
    }
    buffer.clear();
}

fn unify_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Drops blank-line separated blocks that read like a page index.
///
/// Runs on raw text, before [`normalize_text`] merges the short lines of an
/// index into a single paragraph and the line structure is lost.
pub fn strip_toc_blocks(raw: &str, heuristics: &TocHeuristics) -> String {
    let unified = unify_line_endings(raw);
    let mut kept: Vec<String> = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in unified.split('\n') {
        if line.trim().is_empty() {
            keep_block(&mut block, &mut kept, heuristics);
        } else {
            block.push(line);
        }
    }
    keep_block(&mut block, &mut kept, heuristics);
    kept.join("\n\n")
}

fn keep_block(block: &mut Vec<&str>, kept: &mut Vec<String>, heuristics: &TocHeuristics) {
    if block.is_empty() {
        return;
    }
    let text = block.join("\n");
    block.clear();
    if heuristics.is_index_like(&text) {
        tracing::debug!(chars = text.len(), "dropping index-like block");
        return;
    }
    kept.push(text);
}

/// Splits at runs of spaces that follow terminal punctuation. The punctuation
/// stays with the sentence before it.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for gap in SENTENCE_BREAK.find_iter(text) {
        let cut = gap.start() + 1;
        sentences.push(&text[start..cut]);
        start = gap.end();
    }
    sentences.push(&text[start..]);
    sentences
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
