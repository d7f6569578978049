use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docqa_core::{document_id, ChunkConfig, DocQaError, Embedder, HashEmbedder};
use docqa_rag::{
    Answer, AnswerOptions, DocumentChatbot, EmbeddingCache, EmbeddingClient, IngestStatus,
    NO_RELEVANT_INFORMATION,
};
use tempfile::tempdir;

const PARIS: &str = "Paris is the capital of France. It is known for the Eiffel Tower and its museums.\n\nBerlin is the capital of Germany. The city has a long and complex history.";

/// Hash embeddings that remember every text they were asked to embed.
struct Recording {
    inner: HashEmbedder,
    model_id: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl Recording {
    fn new(model_id: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::default(),
            model_id: model_id.to_string(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Embedder for Recording {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DocQaError::Embedding("backend unavailable".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        self.inner.embed(texts)
    }
}

/// One dimension per vocabulary word.
struct Vocab(&'static [&'static str]);

impl Embedder for Vocab {
    fn model_id(&self) -> &str {
        "vocab"
    }

    fn embed(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                self.0
                    .iter()
                    .map(|word| {
                        lower
                            .split(|c: char| !c.is_alphanumeric())
                            .filter(|token| token == word)
                            .count() as f32
                    })
                    .collect()
            })
            .collect())
    }
}

#[test]
fn answers_from_the_relevant_sentence() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(
        Arc::new(EmbeddingClient::hash()),
        EmbeddingCache::new(dir.path()),
    );
    assert_eq!(bot.ingest(PARIS, None).unwrap(), IngestStatus::Processed);
    assert_eq!(bot.document_id(), Some(document_id(PARIS).as_str()));
    assert_eq!(bot.chunks().len(), bot.embeddings().len());

    let response = bot
        .ask("What is the capital of France?", &AnswerOptions::default())
        .unwrap();
    assert!(response.answer.is_extracted());
    assert!(response
        .answer
        .text()
        .starts_with("Paris is the capital of France."));
    assert!(!response.chunks.is_empty());
}

#[test]
fn second_ingest_is_served_from_cache() {
    let dir = tempdir().unwrap();
    let first = Recording::new("recording");
    let mut bot = DocumentChatbot::new(first.clone(), EmbeddingCache::new(dir.path()));
    assert_eq!(bot.ingest(PARIS, None).unwrap(), IngestStatus::Processed);
    assert_eq!(first.calls(), 1);
    let chunks = bot.chunks().to_vec();
    let embeddings = bot.embeddings().to_vec();

    assert_eq!(bot.ingest(PARIS, None).unwrap(), IngestStatus::CacheHit);
    assert_eq!(first.calls(), 1);

    let second = Recording::new("recording");
    let mut fresh = DocumentChatbot::new(second.clone(), EmbeddingCache::new(dir.path()));
    assert_eq!(fresh.ingest(PARIS, None).unwrap(), IngestStatus::CacheHit);
    assert_eq!(second.calls(), 0);
    assert_eq!(fresh.chunks(), chunks.as_slice());
    let bits = |rows: &[Vec<f32>]| -> Vec<Vec<u32>> {
        rows.iter()
            .map(|row| row.iter().map(|v| v.to_bits()).collect())
            .collect()
    };
    assert_eq!(bits(fresh.embeddings()), bits(embeddings.as_slice()));
}

#[test]
fn one_character_change_is_a_new_document() {
    let dir = tempdir().unwrap();
    let embedder = Recording::new("recording");
    let mut bot = DocumentChatbot::new(embedder.clone(), EmbeddingCache::new(dir.path()));
    bot.ingest(PARIS, None).unwrap();
    let changed = PARIS.replace("France.", "France!");
    assert_eq!(bot.ingest(&changed, None).unwrap(), IngestStatus::Processed);
    assert_eq!(embedder.calls(), 2);
    assert_ne!(document_id(PARIS), document_id(&changed));
    assert_eq!(bot.cache().entries().unwrap().len(), 2);
}

#[test]
fn other_model_recomputes() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(Recording::new("model-a"), EmbeddingCache::new(dir.path()));
    bot.ingest(PARIS, None).unwrap();

    let other = Recording::new("model-b");
    let mut bot = DocumentChatbot::new(other.clone(), EmbeddingCache::new(dir.path()));
    assert_eq!(bot.ingest(PARIS, None).unwrap(), IngestStatus::Processed);
    assert_eq!(other.calls(), 1);
    let entry = bot.cache().load(&document_id(PARIS)).unwrap().unwrap();
    assert_eq!(entry.model_id, "model-b");
}

#[test]
fn empty_document_clears_state() {
    let dir = tempdir().unwrap();
    let embedder = Recording::new("recording");
    let mut bot = DocumentChatbot::new(embedder.clone(), EmbeddingCache::new(dir.path()));
    let options = AnswerOptions::default();
    assert_eq!(bot.answer("anything?", &options).unwrap(), Answer::NoDocument);
    assert!(bot.retrieve("anything?", 3).unwrap().is_empty());

    bot.ingest(PARIS, None).unwrap();
    assert_eq!(bot.ingest("", None).unwrap(), IngestStatus::Empty);
    assert!(bot.chunks().is_empty());
    assert!(bot.document_id().is_none());
    assert_eq!(
        bot.answer("capital?", &options).unwrap().to_string(),
        "No document loaded."
    );
}

#[test]
fn whitespace_only_document_has_no_chunks() {
    let dir = tempdir().unwrap();
    let embedder = Recording::new("recording");
    let mut bot = DocumentChatbot::new(embedder.clone(), EmbeddingCache::new(dir.path()));
    assert_eq!(bot.ingest("  \n\n\t ", None).unwrap(), IngestStatus::Processed);
    assert_eq!(embedder.calls(), 0);
    assert!(bot.chunks().is_empty());
    assert_eq!(
        bot.answer("anything?", &AnswerOptions::default()).unwrap(),
        Answer::NoDocument
    );
}

#[test]
fn retrieval_is_ranked_and_bounded() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(
        Arc::new(EmbeddingClient::hash()),
        EmbeddingCache::new(dir.path()),
    )
    .with_chunking(ChunkConfig {
        max_words: 12,
        overlap_sentences: 0,
    });
    let text = "Rivers carry water from mountains to the sea. \
        Glaciers carve valleys over thousands of years. \
        Deserts receive very little rain each year. \
        Forests store carbon in trees and soil. \
        Oceans cover most of the surface of the planet.";
    bot.ingest(text, None).unwrap();
    let total = bot.chunks().len();
    assert!(total >= 3);

    let top = bot.retrieve("Which forests store carbon?", 2).unwrap();
    assert_eq!(top.len(), 2);
    assert!(top[0].score >= top[1].score);
    assert!(top[0].text.contains("Forests"));
    assert_eq!(top[0].text, bot.chunks()[top[0].index]);

    assert_eq!(bot.retrieve("water", 100).unwrap().len(), total);
    assert!(bot.retrieve("water", 0).unwrap().is_empty());
}

#[test]
fn weak_match_returns_sentinel() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(
        Arc::new(Vocab(&["bananas", "tropical", "eiffel"])),
        EmbeddingCache::new(dir.path()),
    );
    bot.ingest(
        "Bananas grow best in warm and tropical climates around the world.",
        None,
    )
    .unwrap();
    let answer = bot.answer("eiffel", &AnswerOptions::default()).unwrap();
    assert!(matches!(answer, Answer::LowConfidence { .. }));
    assert_eq!(answer.text(), NO_RELEVANT_INFORMATION);
}

#[test]
fn fragments_only_cannot_be_summarized() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(
        Arc::new(Vocab(&["bananas", "tropical"])),
        EmbeddingCache::new(dir.path()),
    );
    bot.ingest("Bananas. Tropical bananas.", None).unwrap();
    let answer = bot.answer("bananas", &AnswerOptions::default()).unwrap();
    assert_eq!(answer, Answer::Unsummarizable);
}

#[test]
fn page_index_never_reaches_the_embedder() {
    let dir = tempdir().unwrap();
    let embedder = Recording::new("recording");
    let mut bot = DocumentChatbot::new(embedder.clone(), EmbeddingCache::new(dir.path()));
    let text = format!(
        "Scope 12\nTerms 14\nRisks 17\nCosts 21\nPlans 25\nStaff 28\nTools 31\nNotes 34\n\n{PARIS}"
    );
    bot.ingest(&text, None).unwrap();
    assert!(!bot.chunks().is_empty());
    assert!(embedder.seen().iter().all(|text| !text.contains("Scope 12")));
    assert!(bot.chunks().iter().all(|chunk| !chunk.contains("Scope")));
}

#[test]
fn explicit_ids_are_used_and_checked() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(Recording::new("recording"), EmbeddingCache::new(dir.path()));
    bot.ingest(PARIS, Some("manual-1")).unwrap();
    assert_eq!(bot.document_id(), Some("manual-1"));
    assert!(bot.cache().contains("manual-1"));

    assert!(bot.ingest(PARIS, Some("../escape")).is_err());
    assert_eq!(bot.document_id(), Some("manual-1"));
}

#[test]
fn empty_explicit_id_falls_back_to_content_hash() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(Recording::new("recording"), EmbeddingCache::new(dir.path()));
    assert_eq!(bot.ingest(PARIS, Some("")).unwrap(), IngestStatus::Processed);
    assert_eq!(bot.document_id(), Some(document_id(PARIS).as_str()));
    assert_eq!(bot.ingest(PARIS, None).unwrap(), IngestStatus::CacheHit);
}

#[test]
fn failed_ingest_keeps_previous_document() {
    let dir = tempdir().unwrap();
    let embedder = Recording::new("recording");
    let mut bot = DocumentChatbot::new(embedder.clone(), EmbeddingCache::new(dir.path()));
    bot.ingest(PARIS, None).unwrap();
    let before = bot.active().cloned();

    embedder.fail.store(true, Ordering::SeqCst);
    let other = "Lisbon is the capital of Portugal and sits on the Atlantic coast.";
    let err = bot.ingest(other, None).unwrap_err();
    assert!(err.to_string().contains("backend unavailable"));
    assert_eq!(bot.active().cloned(), before);
    assert!(!bot.cache().contains(&document_id(other)));
}

#[test]
fn reset_forgets_the_document() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(Recording::new("recording"), EmbeddingCache::new(dir.path()));
    bot.ingest(PARIS, None).unwrap();
    bot.reset();
    assert!(bot.active().is_none());
    assert!(bot.cache().contains(&document_id(PARIS)));
}

#[test]
fn short_document_is_one_relevant_chunk() {
    let dir = tempdir().unwrap();
    let mut bot = DocumentChatbot::new(
        Arc::new(EmbeddingClient::hash()),
        EmbeddingCache::new(dir.path()),
    );
    bot.ingest(
        "Paris is the capital of France. It is known for the Eiffel Tower.",
        None,
    )
    .unwrap();
    let response = bot
        .ask("What is the capital of France?", &AnswerOptions::default())
        .unwrap();
    assert_eq!(response.chunks.len(), 1);
    assert!(response.chunks[0].score > 0.2);
    assert!(response
        .answer
        .text()
        .contains("Paris is the capital of France."));
}
