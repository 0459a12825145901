//! Embedding and chat clients (C1/C2)
//!
//! Traits at the seams, an OpenAI-compatible HTTP implementation, and
//! deterministic stubs for demo mode. Retries live here and nowhere else;
//! higher layers receive a single classified error.

mod client;
mod retry;
mod stub;

pub use client::OpenAiClient;
pub use retry::{with_retry, RetryPolicy};
pub use stub::{DemoChatClient, DemoEmbedder};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding generation trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Chat completion trait
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate a completion from a system prompt and user message
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        params: CompletionParams,
    ) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters for a completion call
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

/// Summarize `body` down to `target_ratio` of its character length.
///
/// The ratio is asserted in the prompt; the returned text is additionally
/// truncated at 1.2x the target so the compression bound holds even when
/// the model overshoots.
pub async fn summarize(
    client: &dyn ChatClient,
    instruction: &str,
    body: &str,
    target_ratio: f32,
) -> Result<String> {
    let source_chars = body.chars().count();
    let target_chars = ((source_chars as f32) * target_ratio).ceil().max(1.0) as usize;

    let system = format!(
        "You are an expert at writing summaries of roughly {target_chars} characters \
         that preserve names, key events, and searchable terms."
    );
    let user = format!("{instruction}\n\nText:\n{body}\n\nSummary (about {target_chars} characters):");

    let params = CompletionParams {
        temperature: 0.1,
        // ~4 chars per token, with headroom for the truncation cap
        max_tokens: ((target_chars / 3) as u32).clamp(64, 2048),
    };

    let raw = client.complete(&system, &user, params).await?;
    // Cap derives from the exact target so rounding cannot loosen the
    // compression bound on short inputs
    let cap = ((source_chars as f32) * target_ratio * 1.2) as usize;
    Ok(truncate_chars(raw.trim(), cap))
}

/// Truncate a string to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_chars_cuts_at_limit() {
        assert_eq!(truncate_chars("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_chars_unicode() {
        let text = "héllo wörld";
        let cut = truncate_chars(text, 7);
        assert_eq!(cut.chars().count(), 7);
    }

    #[tokio::test]
    async fn test_summarize_enforces_cap() {
        let client = DemoChatClient::new("demo-chat");
        let body = "word ".repeat(400);
        let summary = summarize(&client, "Compress this passage.", &body, 0.12)
            .await
            .unwrap();
        let cap = ((body.chars().count() as f32) * 0.12 * 1.2) as usize;
        assert!(summary.chars().count() <= cap);
    }

    #[tokio::test]
    async fn test_summarize_cap_tight_on_short_input() {
        let client = DemoChatClient::new("demo-chat");
        let body = "a few short words to compress here now";
        let summary = summarize(&client, "Compress this passage.", body, 0.12)
            .await
            .unwrap();
        let bound = (body.chars().count() as f32) * 0.12 * 1.2;
        assert!(summary.chars().count() as f32 <= bound);
    }
}
