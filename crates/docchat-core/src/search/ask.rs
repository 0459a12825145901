//! Question answering orchestrator (C8)
//!
//! Resolves context (explicit chunk ids, a cached search, filtered or
//! unfiltered fresh search), prompts the LLM, and returns a sourced
//! answer. `raw_citations` is always present, possibly empty.

use super::{filter_citations, SearchCache, SearchEngine, SearchHit, SearchRequest};
use crate::config::Config;
use crate::error::{DocChatError, Result};
use crate::llm::{ChatClient, CompletionParams, Embedder};
use crate::store::{Collection, VectorStore, WhereFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Q/A pairs of history kept when building the prompt
const HISTORY_TURNS: usize = 3;

const DEFAULT_ASK_TOP_K: usize = 8;

const BASE_INSTRUCTION: &str = "You are a helpful assistant that answers questions using only \
the provided context passages. Never invent information beyond them. Support each claim by \
citing its passage tag, e.g. [c1], together with the source file and chunk id when useful. \
If the passages do not contain enough information to answer, reply \"I don't know based on \
the provided documents\".";

const INSUFFICIENT_ANSWER: &str =
    "I don't know based on the provided documents. No relevant passages were found.";

/// One prior exchange in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Ask request (C8). Unknown fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskRequest {
    pub question: String,

    #[serde(default = "default_ask_top_k")]
    pub top_k: usize,

    /// Reuse the result set of a previous search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_id: Option<Uuid>,

    /// Use these exact chunks as context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_documents: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<ConversationTurn>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_strategy: Option<super::SearchStrategy>,

    /// Formatting directive appended to the base instruction, never merged
    /// into the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_ask_top_k() -> usize {
    DEFAULT_ASK_TOP_K
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: DEFAULT_ASK_TOP_K,
            search_id: None,
            chunk_ids: None,
            documents: None,
            exclude_documents: None,
            conversation_history: None,
            search_strategy: None,
            system_prompt: None,
        }
    }
}

/// Passage reference emitted with an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    pub document: String,
    pub collection: Collection,
    pub chunk_id: String,
    pub relevancy_score: f32,
    pub relevancy_percentage: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub raw_citations: Vec<Citation>,
    pub processing_time: f64,
}

pub struct QaOrchestrator {
    engine: Arc<SearchEngine>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatClient>,
    cache: Arc<SearchCache>,
    config: Config,
}

impl QaOrchestrator {
    pub fn new(
        engine: Arc<SearchEngine>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
        cache: Arc<SearchCache>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            store,
            embedder,
            chat,
            cache,
            config,
        }
    }

    /// Answer a question against the indexed documents.
    pub async fn ask(
        &self,
        request: &AskRequest,
        cancel: &CancellationToken,
    ) -> Result<AskResponse> {
        let started = Instant::now();

        let question = request.question.trim();
        if question.is_empty() {
            return Err(DocChatError::InvalidQuery(
                "question must not be empty".into(),
            ));
        }

        let mut passages = self.resolve_context(request, question, cancel).await?;
        passages.truncate(self.config.max_chunks);

        if passages.is_empty() {
            return Ok(AskResponse {
                answer: INSUFFICIENT_ANSWER.to_string(),
                sources: Vec::new(),
                raw_citations: Vec::new(),
                processing_time: started.elapsed().as_secs_f64(),
            });
        }

        let system = build_system_prompt(request.system_prompt.as_deref());
        let user = build_user_message(
            question,
            &passages,
            request.conversation_history.as_deref().unwrap_or(&[]),
        );

        tracing::info!(question, passages = passages.len(), "Asking LLM");
        let params = CompletionParams {
            temperature: 0.1,
            max_tokens: 1000,
        };
        let answer = match cancel
            .run_until_cancelled(self.chat.complete(&system, &user, params))
            .await
        {
            Some(result) => result?,
            None => return Err(DocChatError::Canceled),
        };

        let raw_citations =
            extract_citations(&answer, &passages, self.config.citation_threshold);
        let sources = distinct_sources(&raw_citations);

        Ok(AskResponse {
            answer,
            sources,
            raw_citations,
            processing_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Context resolution precedence: explicit chunk ids, then a cached
    /// search, then a filtered or unfiltered fresh search.
    async fn resolve_context(
        &self,
        request: &AskRequest,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        if let Some(ref chunk_ids) = request.chunk_ids {
            if !chunk_ids.is_empty() {
                return self.fetch_chunks_scored(chunk_ids, question, cancel).await;
            }
        }

        if let Some(ref search_id) = request.search_id {
            if let Some(cached) = self.cache.get(search_id) {
                tracing::debug!(%search_id, "Reusing cached search results");
                return Ok(cached.results);
            }
            tracing::debug!(%search_id, "Search cache miss, falling back to fresh search");
        }

        let search_request = SearchRequest {
            query: question.to_string(),
            top_k: request.top_k.max(1),
            collections: request.search_strategy.map(|s| s.collections()),
            documents: request.documents.clone(),
            exclude_documents: request.exclude_documents.clone(),
            threshold: None,
            return_chunks: true,
        };
        let result = self.engine.search(&search_request, cancel).await?;
        Ok(result.results)
    }

    /// Fetch exact chunks across the collections and score them against
    /// the question.
    async fn fetch_chunks_scored(
        &self,
        chunk_ids: &[String],
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        let query_vec = match cancel.run_until_cancelled(self.embedder.embed(question)).await {
            Some(result) => result?,
            None => return Err(DocChatError::Canceled),
        };

        let filter = WhereFilter::for_chunk_ids(chunk_ids.to_vec());
        let mut hits = Vec::new();
        for collection in Collection::ALL {
            let store_hits = self
                .store
                .query(collection, &query_vec, chunk_ids.len(), &filter)
                .await?;
            for hit in store_hits {
                let document = hit
                    .metadata
                    .get("document")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                hits.push(SearchHit {
                    content: hit.content,
                    score: (1.0 - hit.distance).clamp(0.0, 1.0),
                    document,
                    chunk_id: hit.chunk_id,
                    collection,
                    metadata: hit.metadata,
                });
            }
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(hits)
    }
}

fn build_system_prompt(system_prompt: Option<&str>) -> String {
    match system_prompt {
        Some(directive) if !directive.trim().is_empty() => {
            format!("{BASE_INSTRUCTION}\n\nFormatting directive:\n{directive}")
        }
        _ => BASE_INSTRUCTION.to_string(),
    }
}

fn build_user_message(
    question: &str,
    passages: &[SearchHit],
    history: &[ConversationTurn],
) -> String {
    let mut message = String::from("Context passages:\n");
    for (i, passage) in passages.iter().enumerate() {
        message.push_str(&format!(
            "[c{}] ({} / {}): {}\n",
            i + 1,
            passage.document,
            passage.chunk_id,
            passage.content
        ));
    }

    if !history.is_empty() {
        message.push_str("\nPrevious conversation:\n");
        let tail = &history[history.len().saturating_sub(HISTORY_TURNS)..];
        for turn in tail {
            message.push_str(&format!("Q: {}\nA: {}\n", turn.question, turn.answer));
        }
    }

    message.push_str(&format!("\nQuestion: {question}\n\nAnswer:"));
    message
}

/// Build citations from the context passages.
///
/// A passage is cited when its `[cN]` tag appears in the answer and its
/// score clears the threshold. When the model cited nothing, the top two
/// passages stand in; the threshold still applies but the single best
/// passage always survives.
fn extract_citations(answer: &str, passages: &[SearchHit], threshold: f32) -> Vec<Citation> {
    let tagged: Vec<&SearchHit> = passages
        .iter()
        .enumerate()
        .filter(|(i, _)| answer.contains(&format!("[c{}]", i + 1)))
        .map(|(_, hit)| hit)
        .collect();

    let pool: Vec<SearchHit> = if tagged.is_empty() {
        let mut by_score: Vec<SearchHit> = passages.to_vec();
        by_score.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        by_score.into_iter().take(2).collect()
    } else {
        tagged.into_iter().cloned().collect()
    };

    filter_citations(&pool, threshold)
        .into_iter()
        .map(|hit| Citation {
            text: hit.content,
            document: hit.document,
            collection: hit.collection,
            chunk_id: hit.chunk_id,
            relevancy_score: hit.score,
            relevancy_percentage: hit.score * 100.0,
        })
        .collect()
}

fn distinct_sources(citations: &[Citation]) -> Vec<String> {
    let mut sources = Vec::new();
    for citation in citations {
        if !sources.contains(&citation.document) {
            sources.push(citation.document.clone());
        }
    }
    sources
}
