//! Document registry (C9)
//!
//! In-memory inventory of which documents exist in which collections.
//! Rebuilt on startup by scanning the vector store; kept current by the
//! ingestion pipeline. Counts match the store within one ingestion step.

use crate::error::Result;
use crate::store::{Collection, VectorStore, WhereFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-document inventory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    /// Chunk counts keyed by collection name
    pub collections: HashMap<String, usize>,
    pub total_chunks: usize,
    pub first_ingested_at: DateTime<Utc>,
}

/// Deletion count for one collection after a clear-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearedCollection {
    pub collection: Collection,
    pub deleted: usize,
}

pub struct DocumentRegistry {
    inner: RwLock<HashMap<String, DocumentInfo>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild the inventory from the store's distinct documents.
    pub async fn rebuild(&self, store: &dyn VectorStore) -> Result<()> {
        let mut rebuilt: HashMap<String, DocumentInfo> = HashMap::new();
        let now = Utc::now();

        for collection in Collection::ALL {
            let documents = store.list_distinct(collection, "document").await?;
            for filename in documents {
                let count = store
                    .count(collection, &WhereFilter::for_document(&filename))
                    .await?;
                let entry = rebuilt
                    .entry(filename.clone())
                    .or_insert_with(|| DocumentInfo {
                        filename: filename.clone(),
                        collections: HashMap::new(),
                        total_chunks: 0,
                        first_ingested_at: now,
                    });
                entry
                    .collections
                    .insert(collection.as_str().to_string(), count);
                entry.total_chunks += count;
            }
        }

        let mut inner = self.inner.write().unwrap();
        *inner = rebuilt;
        tracing::info!(documents = inner.len(), "Registry rebuilt from vector store");
        Ok(())
    }

    pub fn has(&self, filename: &str) -> bool {
        self.inner.read().unwrap().contains_key(filename)
    }

    /// All known documents, sorted by filename.
    pub fn list(&self) -> Vec<DocumentInfo> {
        let inner = self.inner.read().unwrap();
        let mut docs: Vec<DocumentInfo> = inner.values().cloned().collect();
        docs.sort_by(|a, b| a.filename.cmp(&b.filename));
        docs
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Record a completed ingestion step for one collection.
    pub fn record(&self, filename: &str, collection: Collection, n_chunks: usize) {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .entry(filename.to_string())
            .or_insert_with(|| DocumentInfo {
                filename: filename.to_string(),
                collections: HashMap::new(),
                total_chunks: 0,
                first_ingested_at: Utc::now(),
            });
        let previous = entry
            .collections
            .insert(collection.as_str().to_string(), n_chunks)
            .unwrap_or(0);
        entry.total_chunks = entry.total_chunks + n_chunks - previous;
    }

    /// Forget a document (used when a forced re-upload replaces it).
    pub fn remove(&self, filename: &str) {
        self.inner.write().unwrap().remove(filename);
    }

    /// Delete every document from every collection, returning per-
    /// collection counts, and reset the inventory.
    pub async fn clear_all(&self, store: &dyn VectorStore) -> Result<Vec<ClearedCollection>> {
        let mut cleared = Vec::new();
        for collection in Collection::ALL {
            let deleted = store.delete(collection, &WhereFilter::default()).await?;
            cleared.push(ClearedCollection {
                collection,
                deleted,
            });
        }
        self.inner.write().unwrap().clear();
        tracing::info!(?cleared, "Cleared all collections");
        Ok(cleared)
    }
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChunkRecord, MemoryVectorStore};
    use serde_json::json;

    fn record(chunk_id: &str, document: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_id: chunk_id.to_string(),
            content: "text".to_string(),
            embedding: vec![1.0],
            metadata: json!({ "document": document, "chunk_index": 0 }),
        }
    }

    #[test]
    fn test_record_and_has() {
        let registry = DocumentRegistry::new();
        assert!(!registry.has("a.txt"));
        registry.record("a.txt", Collection::Documents, 5);
        assert!(registry.has("a.txt"));

        let docs = registry.list();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].total_chunks, 5);
        assert_eq!(docs[0].collections["documents"], 5);
    }

    #[test]
    fn test_record_overwrites_collection_count() {
        let registry = DocumentRegistry::new();
        registry.record("a.txt", Collection::Documents, 5);
        registry.record("a.txt", Collection::LogicalSummaries, 2);
        registry.record("a.txt", Collection::Documents, 7);

        let docs = registry.list();
        assert_eq!(docs[0].collections["documents"], 7);
        assert_eq!(docs[0].total_chunks, 9);
    }

    #[tokio::test]
    async fn test_rebuild_from_store() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![
                    record("a.txt::documents::0000", "a.txt"),
                    record("a.txt::documents::0001", "a.txt"),
                    record("b.txt::documents::0000", "b.txt"),
                ],
            )
            .await
            .unwrap();
        store
            .upsert(
                Collection::LogicalSummaries,
                vec![record("a.txt::logical_summaries::0000", "a.txt")],
            )
            .await
            .unwrap();

        let registry = DocumentRegistry::new();
        registry.rebuild(&store).await.unwrap();

        assert_eq!(registry.len(), 2);
        let docs = registry.list();
        let a = docs.iter().find(|d| d.filename == "a.txt").unwrap();
        assert_eq!(a.collections["documents"], 2);
        assert_eq!(a.collections["logical_summaries"], 1);
        assert_eq!(a.total_chunks, 3);
    }

    #[tokio::test]
    async fn test_clear_all_resets_everything() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![record("a.txt::documents::0000", "a.txt")],
            )
            .await
            .unwrap();

        let registry = DocumentRegistry::new();
        registry.rebuild(&store).await.unwrap();
        assert!(!registry.is_empty());

        let cleared = registry.clear_all(&store).await.unwrap();
        assert_eq!(cleared.len(), 3);
        let docs_cleared = cleared
            .iter()
            .find(|c| c.collection == Collection::Documents)
            .unwrap();
        assert_eq!(docs_cleared.deleted, 1);
        assert!(registry.is_empty());
        assert_eq!(
            store
                .count(Collection::Documents, &WhereFilter::default())
                .await
                .unwrap(),
            0
        );
    }
}
