//! HTTP client for OpenAI-compatible embedding and chat services

use super::{ChatClient, ChatMessage, CompletionParams, Embedder};
use crate::config::Config;
use crate::error::{DocChatError, Result, Stage};
use crate::llm::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible client serving both embeddings and chat completions.
///
/// Separate underlying HTTP clients carry the per-class timeouts
/// (embedding vs. chat) and bearer keys.
pub struct OpenAiClient {
    embed_http: reqwest::Client,
    chat_http: reqwest::Client,
    base_url: String,
    embedding_model: String,
    chat_model: String,
    embedding_dimensions: usize,
    embedding_api_key: Option<String>,
    llm_api_key: Option<String>,
    llm_timeout_secs: u64,
    batch_limit: usize,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let embed_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.embed_timeout_secs))
            .build()
            .map_err(DocChatError::Http)?;
        let chat_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(DocChatError::Http)?;

        Ok(Self {
            embed_http,
            chat_http,
            base_url: config.llm_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            embedding_dimensions: config.embedding_dimensions,
            embedding_api_key: config.embedding_api_key.clone(),
            llm_api_key: config.llm_api_key.clone(),
            llm_timeout_secs: config.llm_timeout_secs,
            batch_limit: config.embed_batch_limit.max(1),
            retry: RetryPolicy::default(),
        })
    }

    async fn embed_one_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct EmbedResponse {
            data: Vec<EmbedData>,
        }

        #[derive(Deserialize)]
        struct EmbedData {
            embedding: Vec<f32>,
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let mut req = self.embed_http.post(&url).json(&request);
        if let Some(ref key) = self.embedding_api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.map_err(DocChatError::Http)?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocChatError::upstream(
                Stage::Embed,
                format!("embedding service error (HTTP {}): {}", status, body),
            ));
        }
        if !status.is_success() {
            // 4xx responses are permanent, surface them without retry
            let body = response.text().await.unwrap_or_default();
            return Err(DocChatError::Config(format!(
                "embedding request rejected (HTTP {}): {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(DocChatError::Http)?;
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            // Deterministic contract violation, not a transient fault
            return Err(DocChatError::Internal(format!(
                "embedding count mismatch: sent {} inputs, got {} vectors",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| DocChatError::upstream(Stage::Embed, "no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_limit) {
            tracing::debug!(batch_size = batch.len(), "Embedding batch");
            let vectors = with_retry(&self.retry, Stage::Embed, || self.embed_one_batch(batch))
                .await?;
            all.extend(vectors);
        }
        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.embedding_dimensions
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        params: CompletionParams,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_message),
        ];
        let url = format!("{}/v1/chat/completions", self.base_url);

        let do_call = || async {
            let request = ChatRequest {
                model: &self.chat_model,
                messages: &messages,
                temperature: params.temperature,
                max_tokens: params.max_tokens,
            };

            let mut req = self.chat_http.post(&url).json(&request);
            if let Some(ref key) = self.llm_api_key {
                req = req.header("Authorization", format!("Bearer {}", key));
            }

            let response = req.send().await.map_err(|e| {
                if e.is_timeout() {
                    DocChatError::LlmTimeout {
                        timeout_secs: self.llm_timeout_secs,
                    }
                } else {
                    DocChatError::Http(e)
                }
            })?;

            let status = response.status();
            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(DocChatError::upstream(
                    Stage::Llm,
                    format!("LLM service error (HTTP {}): {}", status, body),
                ));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DocChatError::Config(format!(
                    "LLM request rejected (HTTP {}): {}",
                    status, body
                )));
            }

            let parsed: ChatResponse = response.json().await.map_err(DocChatError::Http)?;
            parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| DocChatError::upstream(Stage::Llm, "no choices in response"))
        };

        with_retry(&self.retry, Stage::Llm, do_call).await
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}
