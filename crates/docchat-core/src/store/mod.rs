//! Vector store abstraction (C3)
//!
//! Collection-keyed CRUD and k-NN query with exact-match metadata filters.
//! Two implementations: an HTTP client for a remote store and an in-memory
//! store for tests and demo runs.

mod http;
mod memory;

pub use http::HttpVectorStore;
pub use memory::MemoryVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three representation collections, in tie-break rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Documents,
    ParagraphSummaries,
    LogicalSummaries,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Documents,
        Collection::LogicalSummaries,
        Collection::ParagraphSummaries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Documents => "documents",
            Collection::LogicalSummaries => "logical_summaries",
            Collection::ParagraphSummaries => "paragraph_summaries",
        }
    }

    /// Rank used to break score ties in merged search results
    pub fn rank(&self) -> u8 {
        match self {
            Collection::Documents => 0,
            Collection::ParagraphSummaries => 1,
            Collection::LogicalSummaries => 2,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk as written to and read from the store.
///
/// Metadata always mirrors `chunk_id` and `document`, so filter
/// predicates on either field can be evaluated by the store itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub content: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

impl ChunkRecord {
    /// Document filename carried in metadata
    pub fn document(&self) -> &str {
        self.metadata
            .get("document")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Chunk index carried in metadata (0 when absent)
    pub fn chunk_index(&self) -> usize {
        self.metadata
            .get("chunk_index")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }
}

/// A raw store hit: distance, not similarity.
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub chunk_id: String,
    pub content: String,
    pub distance: f32,
    pub metadata: Value,
}

/// Conjunction of exact-match metadata predicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhereFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_in: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_not_in: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id_in: Option<Vec<String>>,
}

impl WhereFilter {
    pub fn for_document(filename: impl Into<String>) -> Self {
        Self {
            document_in: Some(vec![filename.into()]),
            ..Self::default()
        }
    }

    pub fn for_chunk_ids(chunk_ids: Vec<String>) -> Self {
        Self {
            chunk_id_in: Some(chunk_ids),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document_in.is_none() && self.document_not_in.is_none() && self.chunk_id_in.is_none()
    }

    /// Evaluate the conjunction against one record's identity fields.
    pub fn matches(&self, document: &str, chunk_id: &str) -> bool {
        if let Some(ref allow) = self.document_in {
            if !allow.iter().any(|d| d == document) {
                return false;
            }
        }
        if let Some(ref deny) = self.document_not_in {
            if deny.iter().any(|d| d == document) {
                return false;
            }
        }
        if let Some(ref ids) = self.chunk_id_in {
            if !ids.iter().any(|id| id == chunk_id) {
                return false;
            }
        }
        true
    }
}

/// Collection-keyed vector store operations.
///
/// `query` returns hits sorted by ascending distance. `upsert` is
/// idempotent on `chunk_id`; content and embedding are written together.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, collection: Collection, records: Vec<ChunkRecord>) -> Result<()>;

    async fn query(
        &self,
        collection: Collection,
        vector: &[f32],
        k: usize,
        filter: &WhereFilter,
    ) -> Result<Vec<StoreHit>>;

    /// Fetch records matching the filter, without scoring
    async fn get(&self, collection: Collection, filter: &WhereFilter) -> Result<Vec<ChunkRecord>>;

    /// Delete matching records, returning the count removed
    async fn delete(&self, collection: Collection, filter: &WhereFilter) -> Result<usize>;

    async fn count(&self, collection: Collection, filter: &WhereFilter) -> Result<usize>;

    /// Distinct values of a metadata field across a collection
    async fn list_distinct(&self, collection: Collection, field: &str) -> Result<Vec<String>>;

    async fn heartbeat(&self) -> bool;
}

/// Cosine similarity between two vectors of equal dimension.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_and_ranks() {
        assert_eq!(Collection::Documents.as_str(), "documents");
        assert_eq!(Collection::LogicalSummaries.as_str(), "logical_summaries");
        assert_eq!(Collection::ParagraphSummaries.as_str(), "paragraph_summaries");
        assert!(Collection::Documents.rank() < Collection::ParagraphSummaries.rank());
        assert!(Collection::ParagraphSummaries.rank() < Collection::LogicalSummaries.rank());
    }

    #[test]
    fn test_where_filter_conjunction() {
        let filter = WhereFilter {
            document_in: Some(vec!["a.txt".into(), "b.txt".into()]),
            document_not_in: Some(vec!["b.txt".into()]),
            chunk_id_in: None,
        };
        assert!(filter.matches("a.txt", "a.txt::documents::0000"));
        assert!(!filter.matches("b.txt", "b.txt::documents::0000"));
        assert!(!filter.matches("c.txt", "c.txt::documents::0000"));
    }

    #[test]
    fn test_where_filter_chunk_ids() {
        let filter = WhereFilter::for_chunk_ids(vec!["a.txt::documents::0001".into()]);
        assert!(filter.matches("a.txt", "a.txt::documents::0001"));
        assert!(!filter.matches("a.txt", "a.txt::documents::0002"));
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0, 0.0]), 0.0);
    }
}
