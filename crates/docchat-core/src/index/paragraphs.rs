//! Paragraph summaries ingest: natural paragraphs compressed 3:1

use super::{chunk_id, chunker, ensure_live, fetch_ordered_chunks, reconstruct_text, IngestPipeline};
use crate::error::{DocChatError, Result};
use crate::llm::summarize;
use crate::store::{ChunkRecord, Collection};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Target output length as a fraction of the paragraph's character length
const PARAGRAPH_RATIO: f32 = 0.40;

const PARAGRAPH_INSTRUCTION: &str = "Summarize this paragraph to about a third of its length \
     while keeping the main ideas, proper nouns, and searchable keywords.";

/// Report for a completed paragraph ingest.
#[derive(Debug, Clone, Serialize)]
pub struct ParagraphReport {
    pub filename: String,
    pub paragraphs_processed: usize,
    pub total_input_chars: usize,
    pub total_output_chars: usize,
    pub overall_ratio: f32,
    pub processing_time: f64,
}

struct ParagraphSummary {
    index: usize,
    source_length: usize,
    summary: String,
    embedding: Vec<f32>,
}

impl IngestPipeline {
    /// Summarize the document's natural paragraphs into the
    /// `paragraph_summaries` collection.
    ///
    /// The document text is rebuilt from its raw chunks, so a prior basic
    /// ingest is required.
    pub async fn ingest_paragraph_summaries(
        &self,
        filename: &str,
        cancel: &CancellationToken,
    ) -> Result<ParagraphReport> {
        let started = Instant::now();
        let _guard = self.locks.acquire(filename)?;
        ensure_live(cancel)?;

        let chunks = fetch_ordered_chunks(self.store.as_ref(), filename).await?;
        if chunks.is_empty() {
            return Err(DocChatError::NotFound(filename.to_string()));
        }

        let text = reconstruct_text(&chunks, self.config.chunk_overlap);
        let paragraphs = chunker::split_into_paragraphs(&text);
        if paragraphs.is_empty() {
            return Ok(ParagraphReport {
                filename: filename.to_string(),
                paragraphs_processed: 0,
                total_input_chars: 0,
                total_output_chars: 0,
                overall_ratio: 1.0,
                processing_time: started.elapsed().as_secs_f64(),
            });
        }
        let total_paragraphs = paragraphs.len();
        tracing::info!(filename, paragraphs = total_paragraphs, "Starting paragraph ingest");

        let tasks = paragraphs.into_iter().enumerate().map(|(index, paragraph)| {
            async move {
                let summary = summarize(
                    self.chat.as_ref(),
                    PARAGRAPH_INSTRUCTION,
                    &paragraph,
                    PARAGRAPH_RATIO,
                )
                .await?;
                let embedding = self.embedder.embed(&summary).await?;
                Ok::<_, DocChatError>(ParagraphSummary {
                    index,
                    source_length: paragraph.chars().count(),
                    summary,
                    embedding,
                })
            }
        });

        let collected: Vec<Result<ParagraphSummary>> = match cancel
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

        let mut summaries: Vec<ParagraphSummary> =
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
                let summary_length = s.summary.chars().count();
                total_input_chars += s.source_length;
                total_output_chars += summary_length;
                let ratio = if summary_length > 0 {
                    s.source_length as f32 / summary_length as f32
                } else {
                    1.0
                };
                let id = chunk_id(filename, Collection::ParagraphSummaries, s.index);
                ChunkRecord {
                    metadata: json!({
                        "document": filename,
                        "collection": Collection::ParagraphSummaries.as_str(),
                        "chunk_id": id,
                        "chunk_index": s.index,
                        "paragraph_index": s.index,
                        "total_paragraphs": total_paragraphs,
                        "source_length": s.source_length,
                        "summary_length": summary_length,
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
            .upsert(Collection::ParagraphSummaries, records)
            .await?;
        self.registry
            .record(filename, Collection::ParagraphSummaries, created);

        let overall_ratio = if total_output_chars > 0 {
            total_input_chars as f32 / total_output_chars as f32
        } else {
            1.0
        };
        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(
            filename,
            paragraphs = created,
            overall_ratio,
            processing_time,
            "Paragraph ingest complete"
        );

        Ok(ParagraphReport {
            filename: filename.to_string(),
            paragraphs_processed: created,
            total_input_chars,
            total_output_chars,
            overall_ratio,
            processing_time,
        })
    }
}
