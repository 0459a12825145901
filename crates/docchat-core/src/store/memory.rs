//! In-memory vector store for tests and demo runs
//!
//! Brute-force cosine distance over all stored vectors, `RwLock`-guarded
//! maps per collection. Ordering matches the HTTP store: ascending
//! distance.

use super::{cosine_similarity, ChunkRecord, Collection, StoreHit, VectorStore, WhereFilter};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct MemoryVectorStore {
    collections: RwLock<HashMap<Collection, Vec<ChunkRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, collection: Collection, records: Vec<ChunkRecord>) -> Result<()> {
        let mut guard = self.collections.write().unwrap();
        let stored = guard.entry(collection).or_default();
        for record in records {
            stored.retain(|r| r.chunk_id != record.chunk_id);
            stored.push(record);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        vector: &[f32],
        k: usize,
        filter: &WhereFilter,
    ) -> Result<Vec<StoreHit>> {
        let guard = self.collections.read().unwrap();
        let mut hits: Vec<StoreHit> = guard
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.matches(r.document(), &r.chunk_id))
                    .map(|r| StoreHit {
                        chunk_id: r.chunk_id.clone(),
                        content: r.content.clone(),
                        distance: 1.0 - cosine_similarity(vector, &r.embedding),
                        metadata: r.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, collection: Collection, filter: &WhereFilter) -> Result<Vec<ChunkRecord>> {
        let guard = self.collections.read().unwrap();
        let mut records: Vec<ChunkRecord> = guard
            .get(&collection)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|r| filter.matches(r.document(), &r.chunk_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        Ok(records)
    }

    async fn delete(&self, collection: Collection, filter: &WhereFilter) -> Result<usize> {
        let mut guard = self.collections.write().unwrap();
        let Some(stored) = guard.get_mut(&collection) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|r| !filter.matches(r.document(), &r.chunk_id));
        Ok(before - stored.len())
    }

    async fn count(&self, collection: Collection, filter: &WhereFilter) -> Result<usize> {
        let guard = self.collections.read().unwrap();
        Ok(guard
            .get(&collection)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|r| filter.matches(r.document(), &r.chunk_id))
                    .count()
            })
            .unwrap_or(0))
    }

    async fn list_distinct(&self, collection: Collection, field: &str) -> Result<Vec<String>> {
        let guard = self.collections.read().unwrap();
        let mut values: Vec<String> = Vec::new();
        if let Some(stored) = guard.get(&collection) {
            for record in stored {
                if let Some(value) = record.metadata.get(field).and_then(|v| v.as_str()) {
                    if !values.iter().any(|v| v == value) {
                        values.push(value.to_string());
                    }
                }
            }
        }
        Ok(values)
    }

    async fn heartbeat(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(chunk_id: &str, document: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk_id: chunk_id.to_string(),
            content: format!("content of {chunk_id}"),
            embedding,
            metadata: json!({ "document": document, "chunk_index": 0 }),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_id() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![record("a::documents::0000", "a", vec![1.0, 0.0])],
            )
            .await
            .unwrap();
        store
            .upsert(
                Collection::Documents,
                vec![record("a::documents::0000", "a", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        assert_eq!(
            store
                .count(Collection::Documents, &WhereFilter::default())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_query_orders_by_ascending_distance() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![
                    record("a::documents::0000", "a", vec![1.0, 0.0]),
                    record("a::documents::0001", "a", vec![0.0, 1.0]),
                    record("a::documents::0002", "a", vec![0.7, 0.7]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .query(
                Collection::Documents,
                &[1.0, 0.0],
                10,
                &WhereFilter::default(),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_id, "a::documents::0000");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[tokio::test]
    async fn test_query_respects_document_filter() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![
                    record("a::documents::0000", "a", vec![1.0, 0.0]),
                    record("b::documents::0000", "b", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .query(
                Collection::Documents,
                &[1.0, 0.0],
                10,
                &WhereFilter::for_document("b"),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "b::documents::0000");
    }

    #[tokio::test]
    async fn test_delete_returns_count() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![
                    record("a::documents::0000", "a", vec![1.0]),
                    record("a::documents::0001", "a", vec![1.0]),
                    record("b::documents::0000", "b", vec![1.0]),
                ],
            )
            .await
            .unwrap();
        let deleted = store
            .delete(Collection::Documents, &WhereFilter::for_document("a"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(
            store
                .count(Collection::Documents, &WhereFilter::default())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_list_distinct_documents() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                Collection::Documents,
                vec![
                    record("a::documents::0000", "a", vec![1.0]),
                    record("a::documents::0001", "a", vec![1.0]),
                    record("b::documents::0000", "b", vec![1.0]),
                ],
            )
            .await
            .unwrap();
        let docs = store
            .list_distinct(Collection::Documents, "document")
            .await
            .unwrap();
        assert_eq!(docs, vec!["a".to_string(), "b".to_string()]);
    }
}
