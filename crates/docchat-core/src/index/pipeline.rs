//! Upload-and-basic-ingest pipeline
//!
//! Writes the `documents` collection: hash, duplicate check, chunk, batch
//! embed, one batched upsert. Partial failure rolls back with a
//! compensating delete scoped to the document.

use super::{chunk_id, chunker, ensure_live, IngestLock};
use crate::config::Config;
use crate::error::{DocChatError, Result};
use crate::llm::{ChatClient, Embedder};
use crate::registry::DocumentRegistry;
use crate::store::{ChunkRecord, Collection, VectorStore, WhereFilter};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of an upload request.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The document was chunked, embedded and written
    Ingested(UploadReport),
    /// The document is already present and `force` was not set
    AlreadyExists,
}

/// Report for a completed basic ingest.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub filename: String,
    pub chunks_created: usize,
    pub content_hash: String,
    pub processing_time: f64,
}

/// Ingestion pipeline for one vector store / client set.
pub struct IngestPipeline {
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) chat: Arc<dyn ChatClient>,
    pub(crate) registry: Arc<DocumentRegistry>,
    pub(crate) config: Config,
    pub(crate) locks: IngestLock,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
        registry: Arc<DocumentRegistry>,
        config: Config,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            registry,
            config,
            locks: IngestLock::new(),
        }
    }

    /// Upload extracted text and write the raw-chunk view.
    ///
    /// Duplicate filenames are reported as `AlreadyExists` without touching
    /// the store unless `force` is set, in which case all existing views of
    /// the document are replaced.
    pub async fn upload(
        &self,
        filename: &str,
        text: &str,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome> {
        let started = Instant::now();
        let _guard = self.locks.acquire(filename)?;
        ensure_live(cancel)?;

        let content_hash = format!("{:x}", Sha256::digest(text.as_bytes()));

        if self.registry.has(filename) {
            if !force {
                tracing::info!(filename, "Upload skipped, document already present");
                return Ok(UploadOutcome::AlreadyExists);
            }
            // Forced re-upload replaces every view of the document
            for collection in Collection::ALL {
                self.store
                    .delete(collection, &WhereFilter::for_document(filename))
                    .await?;
            }
            self.registry.remove(filename);
        }

        let chunk_texts =
            chunker::split_into_chunks(text, self.config.chunk_size, self.config.chunk_overlap);
        if chunk_texts.is_empty() {
            return Ok(UploadOutcome::Ingested(UploadReport {
                filename: filename.to_string(),
                chunks_created: 0,
                content_hash,
                processing_time: started.elapsed().as_secs_f64(),
            }));
        }
        tracing::info!(filename, chunks = chunk_texts.len(), "Created raw chunks");

        ensure_live(cancel)?;
        let embeddings = match cancel.run_until_cancelled(self.embedder.embed_batch(&chunk_texts)).await
        {
            Some(result) => result?,
            None => return Err(DocChatError::Canceled),
        };
        self.check_dimensions(&embeddings)?;

        let total_chunks = chunk_texts.len();
        let ingested_at = Utc::now().to_rfc3339();
        let records: Vec<ChunkRecord> = chunk_texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| {
                let short_hash = format!("{:x}", Sha256::digest(content.as_bytes()));
                let id = chunk_id(filename, Collection::Documents, i);
                ChunkRecord {
                    // chunk_id is duplicated into metadata so the store can
                    // evaluate chunk_id predicates server-side
                    metadata: json!({
                        "document": filename,
                        "collection": Collection::Documents.as_str(),
                        "chunk_id": id,
                        "chunk_index": i,
                        "total_chunks": total_chunks,
                        "chunk_hash": &short_hash[..12],
                        "ingested_at": ingested_at,
                    }),
                    chunk_id: id,
                    content,
                    embedding,
                }
            })
            .collect();

        // One batched upsert; roll back the document on partial failure
        let upsert = self.store.upsert(Collection::Documents, records);
        match cancel.run_until_cancelled(upsert).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                self.compensate(filename).await;
                return Err(e);
            }
            None => {
                self.compensate(filename).await;
                return Err(DocChatError::Canceled);
            }
        }

        self.registry
            .record(filename, Collection::Documents, total_chunks);

        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(filename, total_chunks, processing_time, "Upload complete");

        Ok(UploadOutcome::Ingested(UploadReport {
            filename: filename.to_string(),
            chunks_created: total_chunks,
            content_hash,
            processing_time,
        }))
    }

    pub(crate) fn check_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        let expected = self.config.embedding_dimensions;
        for embedding in embeddings {
            if embedding.len() != expected {
                return Err(DocChatError::Internal(format!(
                    "embedding dimension {} does not match configured {}",
                    embedding.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Best-effort rollback of a failed basic ingest. Never masks the
    /// original error.
    async fn compensate(&self, filename: &str) {
        match self
            .store
            .delete(Collection::Documents, &WhereFilter::for_document(filename))
            .await
        {
            Ok(deleted) => {
                tracing::warn!(filename, deleted, "Rolled back partial ingest");
            }
            Err(e) => {
                tracing::error!(filename, error = %e, "Compensating delete failed");
            }
        }
    }
}
