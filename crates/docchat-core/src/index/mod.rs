//! Ingestion: chunking and the three-collection pipeline (C4/C5)

pub mod chunker;
mod paragraphs;
mod pipeline;
mod summaries;

pub use chunker::{split_into_chunks, split_into_paragraphs};
pub use paragraphs::ParagraphReport;
pub use pipeline::{IngestPipeline, UploadOutcome, UploadReport};
pub use summaries::SummaryReport;

use crate::error::{DocChatError, Result};
use crate::store::{ChunkRecord, Collection, VectorStore, WhereFilter};
use std::collections::HashSet;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Stable, document-scoped chunk identifier.
pub fn chunk_id(document: &str, collection: Collection, index: usize) -> String {
    format!("{}::{}::{:04}", document, collection.as_str(), index)
}

/// Bail out with `Canceled` if the request was aborted.
pub(crate) fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(DocChatError::Canceled)
    } else {
        Ok(())
    }
}

/// Fetch a document's raw chunks ordered by chunk index.
pub(crate) async fn fetch_ordered_chunks(
    store: &dyn VectorStore,
    filename: &str,
) -> Result<Vec<ChunkRecord>> {
    let mut chunks = store
        .get(Collection::Documents, &WhereFilter::for_document(filename))
        .await?;
    chunks.sort_by_key(|c| c.chunk_index());
    Ok(chunks)
}

/// Rebuild a document's text from its ordered raw chunks.
///
/// Every chunk after the first starts with `overlap` characters copied
/// from its predecessor; stripping them yields the original text.
pub(crate) fn reconstruct_text(chunks: &[ChunkRecord], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(&chunk.content);
        } else {
            let mut iter = chunk.content.chars();
            for _ in 0..overlap {
                if iter.next().is_none() {
                    break;
                }
            }
            text.push_str(iter.as_str());
        }
    }
    text
}

/// Per-filename try-lock preventing concurrent ingestion of one document.
pub(crate) struct IngestLock {
    active: Mutex<HashSet<String>>,
}

impl IngestLock {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Acquire the lock for `filename`, failing fast on contention.
    pub fn acquire(&self, filename: &str) -> Result<IngestGuard<'_>> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(filename.to_string()) {
            return Err(DocChatError::AlreadyIngesting(filename.to_string()));
        }
        Ok(IngestGuard {
            lock: self,
            filename: filename.to_string(),
        })
    }
}

pub(crate) struct IngestGuard<'a> {
    lock: &'a IngestLock,
    filename: String,
}

impl Drop for IngestGuard<'_> {
    fn drop(&mut self) {
        self.lock.active.lock().unwrap().remove(&self.filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(
            chunk_id("report.pdf", Collection::Documents, 7),
            "report.pdf::documents::0007"
        );
        assert_eq!(
            chunk_id("a.txt", Collection::LogicalSummaries, 12),
            "a.txt::logical_summaries::0012"
        );
    }

    #[test]
    fn test_ingest_lock_contention() {
        let lock = IngestLock::new();
        let guard = lock.acquire("a.txt").unwrap();
        assert!(matches!(
            lock.acquire("a.txt"),
            Err(DocChatError::AlreadyIngesting(_))
        ));
        // A different filename is unaffected
        let _other = lock.acquire("b.txt").unwrap();
        drop(guard);
        let _again = lock.acquire("a.txt").unwrap();
    }

    #[test]
    fn test_reconstruct_text_strips_overlap() {
        let source = "abcdefghijklmnopqrstuvwxyz";
        let parts = ["abcdefghij", "ghijklmnop", "mnopqrstuvwxyz"];
        let chunks: Vec<ChunkRecord> = parts
            .iter()
            .enumerate()
            .map(|(i, p)| ChunkRecord {
                chunk_id: chunk_id("x", Collection::Documents, i),
                content: p.to_string(),
                embedding: Vec::new(),
                metadata: json!({ "document": "x", "chunk_index": i }),
            })
            .collect();
        assert_eq!(reconstruct_text(&chunks, 4), source);
    }
}
