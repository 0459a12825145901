//! Logical summaries ingest: windows of raw chunks compressed 10:1

use super::{chunk_id, ensure_live, fetch_ordered_chunks, IngestPipeline};
use crate::error::{DocChatError, Result};
use crate::llm::summarize;
use crate::store::{ChunkRecord, Collection};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Raw chunks summarized per logical window
const WINDOW_SIZE: usize = 10;

/// Target output length as a fraction of the window's character length
const LOGICAL_RATIO: f32 = 0.12;

const LOGICAL_INSTRUCTION: &str = "Compress this passage to roughly one tenth of its length. \
     Keep proper names, key events, and terms a reader would search for.";

/// Report for a completed summaries ingest.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub filename: String,
    pub summaries_created: usize,
    pub total_input_chars: usize,
    pub total_output_chars: usize,
    pub overall_ratio: f32,
    pub processing_time: f64,
}

struct WindowSummary {
    index: usize,
    window_start: usize,
    window_end: usize,
    source_chunk_ids: Vec<String>,
    source_chars: usize,
    summary: String,
    embedding: Vec<f32>,
}

impl IngestPipeline {
    /// Summarize windows of 10 consecutive raw chunks into the
    /// `logical_summaries` collection.
    ///
    /// Requires a prior basic ingest for the document. Summarize-and-embed
    /// tasks run with bounded parallelism; everything is upserted in one
    /// batch once all windows are done.
    pub async fn ingest_logical_summaries(
        &self,
        filename: &str,
        cancel: &CancellationToken,
    ) -> Result<SummaryReport> {
        let started = Instant::now();
        let _guard = self.locks.acquire(filename)?;
        ensure_live(cancel)?;

        let chunks = fetch_ordered_chunks(self.store.as_ref(), filename).await?;
        if chunks.is_empty() {
            return Err(DocChatError::NotFound(filename.to_string()));
        }

        let windows: Vec<&[ChunkRecord]> = chunks.chunks(WINDOW_SIZE).collect();
        tracing::info!(
            filename,
            windows = windows.len(),
            "Starting logical summary ingest"
        );

        let tasks = windows.into_iter().enumerate().map(|(index, window)| {
            let body: String = window
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let source_chunk_ids: Vec<String> =
                window.iter().map(|c| c.chunk_id.clone()).collect();
            let window_start = window.first().map(|c| c.chunk_index()).unwrap_or(0);
            let window_end = window.last().map(|c| c.chunk_index()).unwrap_or(0);

            async move {
                let summary =
                    summarize(self.chat.as_ref(), LOGICAL_INSTRUCTION, &body, LOGICAL_RATIO)
                        .await?;
                let embedding = self.embedder.embed(&summary).await?;
                Ok::<_, DocChatError>(WindowSummary {
                    index,
                    window_start,
                    window_end,
                    source_chunk_ids,
                    source_chars: body.chars().count(),
                    summary,
                    embedding,
                })
            }
        });

        let collected: Vec<Result<WindowSummary>> = match cancel
            .run_until_cancelled(
                stream::iter(tasks)
                    .buffer_unordered(self.config.summary_concurrency)
                    .collect::<Vec<_>>(),
            )
            .await
        {
            Some(results) => results,
            None => return Err(DocChatError::Canceled),
        };

        let mut summaries: Vec<WindowSummary> =
            collected.into_iter().collect::<Result<Vec<_>>>()?;
        summaries.sort_by_key(|s| s.index);

        let embeddings: Vec<Vec<f32>> = summaries.iter().map(|s| s.embedding.clone()).collect();
        self.check_dimensions(&embeddings)?;

        let mut total_input_chars = 0usize;
        let mut total_output_chars = 0usize;
        let ingested_at = Utc::now().to_rfc3339();
        let records: Vec<ChunkRecord> = summaries
            .into_iter()
            .map(|s| {
                let summary_chars = s.summary.chars().count();
                total_input_chars += s.source_chars;
                total_output_chars += summary_chars;
                let ratio = if summary_chars > 0 {
                    s.source_chars as f32 / summary_chars as f32
                } else {
                    1.0
                };
                let id = chunk_id(filename, Collection::LogicalSummaries, s.index);
                ChunkRecord {
                    metadata: json!({
                        "document": filename,
                        "collection": Collection::LogicalSummaries.as_str(),
                        "chunk_id": id,
                        "chunk_index": s.index,
                        "window_start": s.window_start,
                        "window_end": s.window_end,
                        "source_chunk_ids": s.source_chunk_ids,
                        "compression_ratio": ratio,
                        "ingested_at": ingested_at,
                    }),
                    chunk_id: id,
                    content: s.summary,
                    embedding: s.embedding,
                }
            })
            .collect();

        ensure_live(cancel)?;
        let created = records.len();
        self.store
            .upsert(Collection::LogicalSummaries, records)
            .await?;
        self.registry
            .record(filename, Collection::LogicalSummaries, created);

        let overall_ratio = if total_output_chars > 0 {
            total_input_chars as f32 / total_output_chars as f32
        } else {
            1.0
        };
        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(
            filename,
            summaries = created,
            overall_ratio,
            processing_time,
            "Logical summary ingest complete"
        );

        Ok(SummaryReport {
            filename: filename.to_string(),
            summaries_created: created,
            total_input_chars,
            total_output_chars,
            overall_ratio,
            processing_time,
        })
    }
}
