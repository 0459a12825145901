//! Deterministic demo-mode clients
//!
//! Used when `DEMO_MODE` is set and by the integration tests. Embeddings
//! are hash-derived bag-of-words vectors so that texts sharing vocabulary
//! score high cosine similarity; chat echoes a prefix of the user message.

use super::{ChatClient, CompletionParams, Embedder};
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Hash-derived embedder: each token lands in a SHA-256-selected bucket,
/// counts are L2-normalized. Fixed vector per input text.
pub struct DemoEmbedder {
    dimensions: usize,
    model: String,
}

impl DemoEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: "demo-embedder".to_string(),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.to_lowercase().split_whitespace() {
            let token: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_be_bytes(digest[..8].try_into().unwrap()) as usize
                % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for DemoEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Chat stub that echoes the first 200 characters of the user message.
pub struct DemoChatClient {
    model: String,
}

impl DemoChatClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatClient for DemoChatClient {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_message: &str,
        _params: CompletionParams,
    ) -> Result<String> {
        Ok(super::truncate_chars(user_message, 200))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_embedding_deterministic() {
        let embedder = DemoEmbedder::new(64);
        let a = embedder.embed("the quick brown fox").await.unwrap();
        let b = embedder.embed("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_demo_embedding_normalized() {
        let embedder = DemoEmbedder::new(64);
        let v = embedder.embed("alpha beta gamma").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_demo_embedding_overlap_scores_higher() {
        let embedder = DemoEmbedder::new(256);
        let doc = embedder
            .embed("supervised learning uses labeled training data")
            .await
            .unwrap();
        let near = embedder
            .embed("labeled training data supervised")
            .await
            .unwrap();
        let far = embedder.embed("completely unrelated words here").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&doc, &near) > dot(&doc, &far));
    }

    #[tokio::test]
    async fn test_demo_chat_echoes_prefix() {
        let client = DemoChatClient::new("demo-chat");
        let long = "x".repeat(500);
        let out = client
            .complete("system", &long, CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(out.chars().count(), 200);
    }
}
