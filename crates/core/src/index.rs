//! In-memory semantic index over one repository's documents.
//!
//! The index is rebuilt wholesale: `build` embeds every document, assembles a fresh
//! [`FlatVectorStore`] and swaps it in under the write lock. Searches clone the current
//! `Arc` under a read lock and work on that snapshot, so a search running during a build
//! sees either the complete old store or the complete new one.

use crate::embeddings::{self, EmbeddingRequest};
use crate::error::{CoreError, Result};
use crate::models::Document;
use crate::vectorstore::{FlatVectorStore, IndexEntry};
use providers::EmbeddingProvider;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    current: RwLock<Option<Arc<FlatVectorStore>>>,
    build_lock: Mutex<()>,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(CoreError::Configuration(
                "index dimension must be greater than zero".into(),
            ));
        }
        Ok(Self {
            embedder,
            dimension,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Replaces the index with `documents`. On error the previous index stays in place.
    pub async fn build(&self, documents: Vec<Document>) -> Result<usize> {
        let _building = self.build_lock.lock().await;

        if documents.is_empty() {
            warn!("No texts to index");
        }
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embedded = embeddings::embed(
            EmbeddingRequest {
                texts,
                dimension: self.dimension,
            },
            self.embedder.as_ref(),
        )
        .await
        .map_err(|e| {
            warn!("Index build aborted: {}", e);
            e
        })?;

        let entries: Vec<IndexEntry> = embedded
            .vectors
            .into_iter()
            .zip(documents)
            .map(|(vector, document)| IndexEntry { vector, document })
            .collect();
        let store = Arc::new(FlatVectorStore::new(self.dimension, entries));
        let count = store.len();

        *self.current.write().await = Some(store);
        info!("Indexed {} documents", count);
        Ok(count)
    }

    /// Up to `k` documents nearest to `query`. Empty before the first build.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    /// Like [`search`](Self::search) but keeps the squared distance of each hit.
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(store) = self.snapshot().await else {
            debug!("Search before any build");
            return Ok(Vec::new());
        };
        if store.is_empty() {
            return Ok(Vec::new());
        }

        let embedded = embeddings::embed(
            EmbeddingRequest {
                texts: vec![query.to_string()],
                dimension: self.dimension,
            },
            self.embedder.as_ref(),
        )
        .await?;
        let Some(query_vector) = embedded.vectors.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(store
            .nearest(&query_vector, k)
            .into_iter()
            .map(|(entry, distance)| (entry.document.clone(), distance))
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.map(|s| s.len()).unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_built(&self) -> bool {
        self.current.read().await.is_some()
    }

    async fn snapshot(&self) -> Option<Arc<FlatVectorStore>> {
        self.current.read().await.clone()
    }
}
