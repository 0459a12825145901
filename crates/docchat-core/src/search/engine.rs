//! Cross-collection search engine (C6)

use super::{
    SearchCache, SearchHit, SearchRequest, SearchResultSet, SearchStrategy, MAX_TOP_K,
    SCORE_EPSILON,
};
use crate::error::{DocChatError, Result};
use crate::llm::Embedder;
use crate::store::{Collection, StoreHit, VectorStore, WhereFilter};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    cache: Arc<SearchCache>,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        cache: Arc<SearchCache>,
    ) -> Self {
        Self {
            store,
            embedder,
            cache,
        }
    }

    /// Run a strategy-selected query across one or more collections.
    ///
    /// Every successful search is stored in the cache under a fresh
    /// `search_id`, regardless of `return_chunks`.
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResultSet> {
        let started = Instant::now();

        let query = request.query.trim();
        if query.is_empty() {
            return Err(DocChatError::InvalidQuery("query must not be empty".into()));
        }
        if request.top_k == 0 {
            return Err(DocChatError::InvalidQuery("top_k must be positive".into()));
        }
        let top_k = request.top_k.min(MAX_TOP_K);

        let filter = WhereFilter {
            document_in: request.documents.clone(),
            document_not_in: request.exclude_documents.clone(),
            chunk_id_in: None,
        };

        let collections = match request.collections {
            Some(ref explicit) if !explicit.is_empty() => explicit.clone(),
            _ => self.select_collections(&filter).await?,
        };

        tracing::info!(query, ?collections, top_k, "Searching");

        let query_vec = match cancel.run_until_cancelled(self.embedder.embed(query)).await {
            Some(result) => result?,
            None => return Err(DocChatError::Canceled),
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for collection in &collections {
            if cancel.is_cancelled() {
                return Err(DocChatError::Canceled);
            }
            let store_hits = self
                .store
                .query(*collection, &query_vec, top_k * 3, &filter)
                .await?;
            hits.extend(store_hits.into_iter().map(|h| to_search_hit(h, *collection)));
        }

        if let Some(threshold) = request.threshold {
            hits.retain(|h| h.score >= threshold);
        }
        sort_hits(&mut hits);
        hits.truncate(top_k);

        let unique_documents = distinct_in_order(hits.iter().map(|h| h.document.clone()));
        let chunk_ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();

        let result = SearchResultSet {
            search_id: Uuid::new_v4(),
            query: query.to_string(),
            results: hits,
            unique_documents,
            chunk_ids,
            collections_searched: collections,
            timestamp: Utc::now(),
            processing_time: started.elapsed().as_secs_f64(),
        };
        self.cache.put(&result);

        tracing::info!(
            search_id = %result.search_id,
            results = result.results.len(),
            "Search complete"
        );

        if request.return_chunks {
            Ok(result)
        } else {
            Ok(SearchResultSet {
                chunk_ids: Vec::new(),
                ..result
            })
        }
    }

    /// Pick collections when the request names none: paragraph summaries
    /// win, then logical summaries, then raw documents alone.
    async fn select_collections(&self, filter: &WhereFilter) -> Result<Vec<Collection>> {
        let population_filter = WhereFilter {
            document_in: filter.document_in.clone(),
            ..WhereFilter::default()
        };
        let strategy = if self
            .store
            .count(Collection::ParagraphSummaries, &population_filter)
            .await?
            > 0
        {
            SearchStrategy::Paragraph
        } else if self
            .store
            .count(Collection::LogicalSummaries, &population_filter)
            .await?
            > 0
        {
            SearchStrategy::Enhanced
        } else {
            SearchStrategy::Basic
        };
        Ok(strategy.collections())
    }
}

fn to_search_hit(hit: StoreHit, collection: Collection) -> SearchHit {
    let document = hit
        .metadata
        .get("document")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    SearchHit {
        content: hit.content,
        score: (1.0 - hit.distance).clamp(0.0, 1.0),
        document,
        chunk_id: hit.chunk_id,
        collection,
        metadata: hit.metadata,
    }
}

/// Sort by similarity descending; ties (within epsilon) break on
/// collection rank, then lexicographic chunk id.
fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        let qa = (a.score / SCORE_EPSILON).round() as i64;
        let qb = (b.score / SCORE_EPSILON).round() as i64;
        qb.cmp(&qa)
            .then_with(|| a.collection.rank().cmp(&b.collection.rank()))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

fn distinct_in_order(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Drop hits below the citation threshold, always keeping the single
/// best hit so weak matches still produce a source.
pub fn filter_citations(hits: &[SearchHit], threshold: f32) -> Vec<SearchHit> {
    let kept: Vec<SearchHit> = hits
        .iter()
        .filter(|h| h.score >= threshold)
        .cloned()
        .collect();
    if !kept.is_empty() {
        return kept;
    }
    hits.iter()
        .cloned()
        .max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(chunk_id: &str, score: f32, collection: Collection) -> SearchHit {
        SearchHit {
            content: String::new(),
            score,
            document: "doc.txt".to_string(),
            chunk_id: chunk_id.to_string(),
            collection,
            metadata: json!({}),
        }
    }

    #[test]
    fn test_sort_hits_by_score() {
        let mut hits = vec![
            hit("a", 0.2, Collection::Documents),
            hit("b", 0.9, Collection::Documents),
            hit("c", 0.5, Collection::Documents),
        ];
        sort_hits(&mut hits);
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_tie_breaks_on_collection_rank_then_id() {
        let mut hits = vec![
            hit("z", 0.5, Collection::LogicalSummaries),
            hit("m", 0.5, Collection::Documents),
            hit("a", 0.5, Collection::ParagraphSummaries),
            hit("b", 0.5, Collection::Documents),
        ];
        sort_hits(&mut hits);
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "m", "a", "z"]);
    }

    #[test]
    fn test_near_ties_within_epsilon_are_ties() {
        let mut hits = vec![
            hit("b", 0.5000000, Collection::LogicalSummaries),
            hit("a", 0.5000002, Collection::Documents),
        ];
        sort_hits(&mut hits);
        assert_eq!(hits[0].chunk_id, "a");
    }

    #[test]
    fn test_distance_to_similarity_clamps() {
        let store_hit = StoreHit {
            chunk_id: "x".into(),
            content: String::new(),
            distance: 1.7,
            metadata: json!({"document": "d"}),
        };
        let converted = to_search_hit(store_hit, Collection::Documents);
        assert_eq!(converted.score, 0.0);
        assert_eq!(converted.document, "d");
    }

    #[test]
    fn test_filter_citations_threshold() {
        let hits = vec![
            hit("a", 0.9, Collection::Documents),
            hit("b", 0.5, Collection::Documents),
            hit("c", 0.1, Collection::Documents),
        ];
        let kept = filter_citations(&hits, 0.4);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|h| h.score >= 0.4));
    }

    #[test]
    fn test_filter_citations_keeps_best_when_all_below() {
        let hits = vec![
            hit("a", 0.1, Collection::Documents),
            hit("b", 0.3, Collection::Documents),
            hit("c", 0.2, Collection::Documents),
        ];
        let kept = filter_citations(&hits, 0.4);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk_id, "b");
    }

    #[test]
    fn test_filter_citations_empty_input() {
        assert!(filter_citations(&[], 0.4).is_empty());
    }
}
