//! Search, search cache, and question answering (C6/C7/C8)

mod ask;
mod cache;
mod engine;

pub use ask::{AskRequest, AskResponse, Citation, ConversationTurn, QaOrchestrator};
pub use cache::SearchCache;
pub use engine::{filter_citations, SearchEngine};

use crate::store::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default result count for a search
pub const DEFAULT_TOP_K: usize = 10;

/// Hard ceiling on requested result counts
pub const MAX_TOP_K: usize = 50;

/// Scores closer than this are considered tied
pub const SCORE_EPSILON: f32 = 1e-6;

/// Which collections a search fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Basic,
    Enhanced,
    Paragraph,
}

impl SearchStrategy {
    pub fn collections(&self) -> Vec<Collection> {
        match self {
            SearchStrategy::Basic => vec![Collection::Documents],
            SearchStrategy::Enhanced => {
                vec![Collection::LogicalSummaries, Collection::Documents]
            }
            SearchStrategy::Paragraph => {
                vec![Collection::ParagraphSummaries, Collection::Documents]
            }
        }
    }
}

/// Search request (C6). Unknown fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub query: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Explicit collection subset; strategy selection applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<Collection>>,

    /// Allow-list of document filenames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,

    /// Deny-list of document filenames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_documents: Option<Vec<String>>,

    /// Minimum similarity for returned hits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    #[serde(default = "default_true")]
    pub return_chunks: bool,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            collections: None,
            documents: None,
            exclude_documents: None,
            threshold: None,
            return_chunks: true,
        }
    }
}

/// A single ranked hit. `score` is similarity, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub score: f32,
    pub document: String,
    pub chunk_id: String,
    pub collection: Collection,
    pub metadata: Value,
}

/// A stored, reusable search result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultSet {
    pub search_id: Uuid,
    pub query: String,
    pub results: Vec<SearchHit>,
    pub unique_documents: Vec<String>,
    pub chunk_ids: Vec<String>,
    pub collections_searched: Vec<Collection>,
    pub timestamp: DateTime<Utc>,
    pub processing_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_collections() {
        assert_eq!(
            SearchStrategy::Basic.collections(),
            vec![Collection::Documents]
        );
        assert!(SearchStrategy::Enhanced
            .collections()
            .contains(&Collection::LogicalSummaries));
        assert!(SearchStrategy::Paragraph
            .collections()
            .contains(&Collection::ParagraphSummaries));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: SearchRequest = serde_json::from_str(r#"{"query": "neural networks"}"#).unwrap();
        assert_eq!(req.top_k, DEFAULT_TOP_K);
        assert!(req.return_chunks);
        assert!(req.collections.is_none());
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let raw = r#"{"query": "x", "shenanigans": true}"#;
        assert!(serde_json::from_str::<SearchRequest>(raw).is_err());
    }

    #[test]
    fn test_strategy_parses_lowercase() {
        let s: SearchStrategy = serde_json::from_str(r#""paragraph""#).unwrap();
        assert_eq!(s, SearchStrategy::Paragraph);
    }
}
