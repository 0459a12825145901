//! HTTP client for a remote vector store
//!
//! Speaks a Chroma-style REST surface: collection-keyed upsert, query,
//! get, delete, and count, plus a version-dependent heartbeat path that is
//! resolved from configuration.

use super::{ChunkRecord, Collection, StoreHit, VectorStore, WhereFilter};
use crate::config::Config;
use crate::error::{DocChatError, Result, Stage};
use crate::llm::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub struct HttpVectorStore {
    http: reqwest::Client,
    base_url: String,
    api_base: String,
    heartbeat_path: String,
    retry: RetryPolicy,
}

impl HttpVectorStore {
    /// Create a store client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.store_timeout_secs))
            .build()
            .map_err(DocChatError::Http)?;

        let base_url = config.vector_store_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            api_base: format!("{}{}", base_url, config.vector_store_api.base_path()),
            heartbeat_path: config.vector_store_api.heartbeat_path().to_string(),
            base_url,
            retry: RetryPolicy::default(),
        })
    }

    fn collection_url(&self, collection: Collection, op: &str) -> String {
        format!("{}/collections/{}/{}", self.api_base, collection.as_str(), op)
    }

    async fn post_json(&self, stage: Stage, url: &str, body: Value) -> Result<Value> {
        let call = || async {
            let response = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(DocChatError::Http)?;

            let status = response.status();
            if status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                return Err(DocChatError::upstream(
                    stage,
                    format!("vector store error (HTTP {}): {}", status, text),
                ));
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(DocChatError::Internal(format!(
                    "vector store rejected request (HTTP {}): {}",
                    status, text
                )));
            }
            response.json::<Value>().await.map_err(DocChatError::Http)
        };
        with_retry(&self.retry, stage, call).await
    }
}

/// Build a Chroma-style `where` document from the typed filter.
fn where_clause(filter: &WhereFilter) -> Option<Value> {
    let mut predicates = Vec::new();
    if let Some(ref docs) = filter.document_in {
        predicates.push(json!({ "document": { "$in": docs } }));
    }
    if let Some(ref docs) = filter.document_not_in {
        predicates.push(json!({ "document": { "$nin": docs } }));
    }
    if let Some(ref ids) = filter.chunk_id_in {
        predicates.push(json!({ "chunk_id": { "$in": ids } }));
    }
    match predicates.len() {
        0 => None,
        1 => Some(predicates.pop().unwrap()),
        _ => Some(json!({ "$and": predicates })),
    }
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    documents: Vec<Option<String>>,
    #[serde(default)]
    metadatas: Vec<Option<Value>>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<Value>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn upsert(&self, collection: Collection, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        #[derive(Serialize)]
        struct UpsertRequest {
            ids: Vec<String>,
            embeddings: Vec<Vec<f32>>,
            documents: Vec<String>,
            metadatas: Vec<Value>,
        }

        let request = UpsertRequest {
            ids: records.iter().map(|r| r.chunk_id.clone()).collect(),
            embeddings: records.iter().map(|r| r.embedding.clone()).collect(),
            documents: records.iter().map(|r| r.content.clone()).collect(),
            metadatas: records.iter().map(|r| r.metadata.clone()).collect(),
        };

        let url = self.collection_url(collection, "upsert");
        self.post_json(Stage::Upsert, &url, serde_json::to_value(request)?)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        vector: &[f32],
        k: usize,
        filter: &WhereFilter,
    ) -> Result<Vec<StoreHit>> {
        let mut body = json!({
            "query_embeddings": [vector],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(clause) = where_clause(filter) {
            body["where"] = clause;
        }

        let url = self.collection_url(collection, "query");
        let raw = self.post_json(Stage::Store, &url, body).await?;
        let parsed: QueryResponse = serde_json::from_value(raw)?;

        let ids = parsed.ids.into_iter().next().unwrap_or_default();
        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let distances = parsed.distances.into_iter().next().unwrap_or_default();

        let mut hits = Vec::with_capacity(ids.len());
        for (i, chunk_id) in ids.into_iter().enumerate() {
            hits.push(StoreHit {
                chunk_id,
                content: documents.get(i).cloned().flatten().unwrap_or_default(),
                distance: distances.get(i).copied().unwrap_or(1.0),
                metadata: metadatas.get(i).cloned().flatten().unwrap_or(Value::Null),
            });
        }
        Ok(hits)
    }

    async fn get(&self, collection: Collection, filter: &WhereFilter) -> Result<Vec<ChunkRecord>> {
        let mut body = json!({ "include": ["documents", "metadatas"] });
        if let Some(clause) = where_clause(filter) {
            body["where"] = clause;
        }

        let url = self.collection_url(collection, "get");
        let raw = self.post_json(Stage::Store, &url, body).await?;
        let parsed: GetResponse = serde_json::from_value(raw)?;

        let mut records = Vec::with_capacity(parsed.ids.len());
        for (i, chunk_id) in parsed.ids.into_iter().enumerate() {
            records.push(ChunkRecord {
                chunk_id,
                content: parsed.documents.get(i).cloned().flatten().unwrap_or_default(),
                embedding: Vec::new(),
                metadata: parsed
                    .metadatas
                    .get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or(Value::Null),
            });
        }
        records.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        Ok(records)
    }

    async fn delete(&self, collection: Collection, filter: &WhereFilter) -> Result<usize> {
        let mut body = json!({});
        if let Some(clause) = where_clause(filter) {
            body["where"] = clause;
        }

        let url = self.collection_url(collection, "delete");
        let raw = self.post_json(Stage::Store, &url, body).await?;
        // The store answers with the ids it removed
        let deleted = raw.as_array().map(|ids| ids.len()).unwrap_or(0);
        Ok(deleted)
    }

    async fn count(&self, collection: Collection, filter: &WhereFilter) -> Result<usize> {
        if filter.is_empty() {
            let url = self.collection_url(collection, "count");
            let call = || async {
                let response = self.http.get(&url).send().await.map_err(DocChatError::Http)?;
                if !response.status().is_success() {
                    return Err(DocChatError::upstream(
                        Stage::Store,
                        format!("count failed (HTTP {})", response.status()),
                    ));
                }
                response.json::<usize>().await.map_err(DocChatError::Http)
            };
            return with_retry(&self.retry, Stage::Store, call).await;
        }
        // Filtered counts are not served directly; fetch ids and count
        Ok(self.get(collection, filter).await?.len())
    }

    async fn list_distinct(&self, collection: Collection, field: &str) -> Result<Vec<String>> {
        let records = self.get(collection, &WhereFilter::default()).await?;
        let mut values = Vec::new();
        for record in records {
            if let Some(value) = record.metadata.get(field).and_then(|v| v.as_str()) {
                if !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
            }
        }
        Ok(values)
    }

    async fn heartbeat(&self) -> bool {
        let url = format!("{}{}", self.base_url, self.heartbeat_path);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Vector store heartbeat failed");
                false
            }
        }
    }
}
