//! DocChat Core Library
//!
//! Retrieval-augmented document QA engine.
//!
//! # Features
//! - Three parallel semantic views per document: overlapping raw chunks,
//!   10:1 logical summaries, 3:1 paragraph summaries
//! - Cross-collection vector search with filtering and strategy selection
//! - Reusable search result sets (`search_id`) with a TTL/LRU cache
//! - Question answering with per-claim citations and relevancy filtering

pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod registry;
pub mod search;
pub mod store;
pub mod system;

pub use config::{Config, VectorStoreApi};
pub use error::{DocChatError, Error, Result, Stage};
pub use index::{
    chunk_id, split_into_chunks, split_into_paragraphs, IngestPipeline, ParagraphReport,
    SummaryReport, UploadOutcome, UploadReport,
};
pub use llm::{
    summarize, ChatClient, ChatMessage, CompletionParams, DemoChatClient, DemoEmbedder, Embedder,
    OpenAiClient, RetryPolicy,
};
pub use registry::{ClearedCollection, DocumentInfo, DocumentRegistry};
pub use search::{
    filter_citations, AskRequest, AskResponse, Citation, ConversationTurn, QaOrchestrator,
    SearchCache, SearchEngine, SearchHit, SearchRequest, SearchResultSet, SearchStrategy,
};
pub use store::{
    cosine_similarity, ChunkRecord, Collection, HttpVectorStore, MemoryVectorStore, StoreHit,
    VectorStore, WhereFilter,
};
pub use system::{CollectionInfo, RagSystem, SystemStatus};
