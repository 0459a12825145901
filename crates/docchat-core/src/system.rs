//! System facade wiring all components together
//!
//! Transport layers construct one `RagSystem` at startup and call into it;
//! every dependency is passed explicitly.

use crate::config::Config;
use crate::error::Result;
use crate::index::IngestPipeline;
use crate::llm::{ChatClient, DemoChatClient, DemoEmbedder, Embedder, OpenAiClient};
use crate::registry::DocumentRegistry;
use crate::search::{QaOrchestrator, SearchCache, SearchEngine};
use crate::store::{Collection, HttpVectorStore, MemoryVectorStore, VectorStore, WhereFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Health and inventory snapshot for the status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub vector_store: String,
    pub embedding: String,
    pub llm: String,
    pub documents: usize,
    pub collections: Vec<CollectionInfo>,
}

/// Size and membership of one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub collection: Collection,
    pub chunks: usize,
    pub documents: Vec<String>,
}

pub struct RagSystem {
    pub config: Config,
    pub registry: Arc<DocumentRegistry>,
    pub pipeline: IngestPipeline,
    pub search: Arc<SearchEngine>,
    pub qa: QaOrchestrator,
    store: Arc<dyn VectorStore>,
}

impl RagSystem {
    /// Build a system from configuration: live clients, or deterministic
    /// stubs plus an in-memory store in demo mode.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        if config.demo_mode {
            tracing::info!("Running in demo mode with stub clients");
            let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
            let embedder: Arc<dyn Embedder> =
                Arc::new(DemoEmbedder::new(config.embedding_dimensions));
            let chat: Arc<dyn ChatClient> = Arc::new(DemoChatClient::new("demo-chat"));
            return Self::assemble(config, store, embedder, chat).await;
        }

        let client = Arc::new(OpenAiClient::new(&config)?);
        let store: Arc<dyn VectorStore> = Arc::new(HttpVectorStore::new(&config)?);
        Self::assemble(config, store, client.clone(), client).await
    }

    /// Build a system around caller-provided components. Used by tests and
    /// embedders of the core.
    pub async fn with_components(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
    ) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, store, embedder, chat).await
    }

    async fn assemble(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
    ) -> Result<Self> {
        let registry = Arc::new(DocumentRegistry::new());
        registry.rebuild(store.as_ref()).await?;

        let cache = Arc::new(SearchCache::new(
            config.search_cache_capacity,
            Duration::from_secs(config.search_cache_ttl_secs),
        ));
        let pipeline = IngestPipeline::new(
            store.clone(),
            embedder.clone(),
            chat.clone(),
            registry.clone(),
            config.clone(),
        );
        let search = Arc::new(SearchEngine::new(
            store.clone(),
            embedder.clone(),
            cache.clone(),
        ));
        let qa = QaOrchestrator::new(
            search.clone(),
            store.clone(),
            embedder.clone(),
            chat.clone(),
            cache,
            config.clone(),
        );

        tracing::info!(documents = registry.len(), "RAG system initialized");
        Ok(Self {
            config,
            registry,
            pipeline,
            search,
            qa,
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Health of the dependencies plus document and collection counts.
    pub async fn status(&self) -> SystemStatus {
        let vector_store = if self.store.heartbeat().await {
            "connected"
        } else {
            "disconnected"
        };
        let (embedding, llm) = if self.config.demo_mode {
            ("demo", "demo")
        } else {
            // Model reachability is probed lazily, on first use
            ("configured", "configured")
        };

        let mut collections = Vec::new();
        for collection in Collection::ALL {
            let chunks = self
                .store
                .count(collection, &WhereFilter::default())
                .await
                .unwrap_or(0);
            let documents = self
                .store
                .list_distinct(collection, "document")
                .await
                .unwrap_or_default();
            collections.push(CollectionInfo {
                collection,
                chunks,
                documents,
            });
        }

        SystemStatus {
            vector_store: vector_store.to_string(),
            embedding: embedding.to_string(),
            llm: llm.to_string(),
            documents: self.registry.len(),
            collections,
        }
    }

    /// Per-collection sizes and distinct documents.
    pub async fn collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut infos = Vec::new();
        for collection in Collection::ALL {
            let chunks = self.store.count(collection, &WhereFilter::default()).await?;
            let documents = self.store.list_distinct(collection, "document").await?;
            infos.push(CollectionInfo {
                collection,
                chunks,
                documents,
            });
        }
        Ok(infos)
    }
}
