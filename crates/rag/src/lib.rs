pub mod answer;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod retrieval;
pub mod session;

pub use answer::{
    extract_answer, Answer, AnswerOptions, NOT_SUMMARIZABLE, NO_DOCUMENT,
    NO_RELEVANT_INFORMATION,
};
pub use cache::{CacheEntry, CachedDocument, EmbeddingCache};
pub use config::{CacheConfig, ChatbotConfig, EmbeddingConfig, EmbeddingProvider};
pub use embedding::{EmbeddingBackend, EmbeddingClient, OpenAiEmbeddingClient};
pub use retrieval::{cosine_similarity, rank_top_k, RetrievedChunk};
pub use session::{ActiveDocument, AskResponse, DocumentChatbot, IngestStatus};
