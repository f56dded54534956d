//! Explicitly constructed application services.
//!
//! One `AppContext` owns the shared index, the retriever and one [`SafeMutator`] per
//! project root. Request handlers borrow it instead of reaching for globals. Blocking work
//! (walking the tree, running git, writing files) is moved onto tokio's blocking pool.

use crate::config::AppConfig;
use crate::embeddings;
use crate::error::{CoreError, Result};
use crate::index::SemanticIndex;
use crate::models::{Document, MutationResult, Snapshot};
use crate::mutator::SafeMutator;
use crate::paths;
use crate::scanner::RepoScanner;
use crate::search::ContextRetriever;
use crate::snapshot::SnapshotStore;
use providers::hashing::HashingEmbedder;
use providers::openai::{OpenAiConfig, OpenAiEmbedder};
use providers::{EmbeddingProvider, ProviderRegistry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{error, info, warn};

pub struct AppContext {
    config: AppConfig,
    index: Arc<SemanticIndex>,
    retriever: ContextRetriever,
    mutators: Arc<MutatorRegistry>,
}

impl AppContext {
    pub fn new(config: AppConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let index = Arc::new(SemanticIndex::new(embedder, config.embeddings.dimension)?);
        let retriever = ContextRetriever::new(index.clone());
        let mutators = Arc::new(MutatorRegistry::new(config.clone()));
        Ok(Self {
            config,
            index,
            retriever,
            mutators,
        })
    }

    /// Builds the embedder named by `embeddings.provider` and wires everything around it.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let registry = build_registry(&config);
        let embedder = embeddings::provider_from(&registry, None)?;
        info!(
            "Using embedding provider {} (dimension {})",
            config.embeddings.provider, config.embeddings.dimension
        );
        Self::new(config, embedder)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<SemanticIndex> {
        &self.index
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    pub fn scanner(&self, root: &Path) -> RepoScanner {
        RepoScanner::with_config(root, &self.config.scan)
    }

    /// Runs the collector on the blocking pool.
    pub async fn scan(&self, root: &Path) -> Result<Vec<Document>> {
        let root = root.to_path_buf();
        let scan_cfg = self.config.scan.clone();
        task::spawn_blocking(move || RepoScanner::with_config(&root, &scan_cfg).scan())
            .await
            .map_err(|e| worker_failed("scan", e))
    }

    /// Scans `root` and rebuilds the shared index from the result.
    pub async fn index_project(&self, root: &Path) -> Result<usize> {
        let documents = self.scan(root).await?;
        self.index.build(documents).await
    }

    pub async fn retrieve(&self, query: &str, max_results: Option<usize>) -> Vec<Document> {
        let k = max_results.unwrap_or(self.config.retrieval.max_results);
        self.retriever.retrieve(query, k).await
    }

    /// The mutator for `root`, created (with its snapshot store) on first use.
    pub fn mutator(&self, root: &Path) -> Result<Arc<SafeMutator>> {
        self.mutators.get_or_create(root)
    }

    /// Validates containment first, then hands the write sequence to a blocking worker.
    pub async fn apply(&self, root: &Path, relative_path: &str, content: String) -> MutationResult {
        let canonical = match paths::canonical_root(root) {
            Ok(p) => p,
            Err(e) => return MutationResult::failed(relative_path, e.to_string()),
        };
        let target = match paths::resolve_within(&canonical, relative_path) {
            Ok(t) if t != canonical => t,
            Ok(_) => {
                let e = CoreError::traversal(
                    relative_path,
                    "does not name a file inside the project root",
                );
                return MutationResult::failed(relative_path, e.to_string());
            }
            Err(e) => {
                warn!("Rejected change to {:?}: {}", relative_path, e);
                return MutationResult::failed(relative_path, e.to_string());
            }
        };

        let mutators = self.mutators.clone();
        let rel = relative_path.to_string();
        let joined = task::spawn_blocking(move || match mutators.get_or_create(&canonical) {
            Ok(m) => m.apply_validated(&rel, &target, &content),
            Err(e) => MutationResult::failed(&rel, e.to_string()),
        })
        .await;
        joined.unwrap_or_else(|e| {
            error!("Mutation worker failed: {}", e);
            MutationResult::failed(relative_path, format!("mutation worker failed: {}", e))
        })
    }

    pub async fn checkpoint(&self, root: &Path, message: &str) -> Option<Snapshot> {
        let mutators = self.mutators.clone();
        let root = root.to_path_buf();
        let message = message.to_string();
        task::spawn_blocking(move || match mutators.get_or_create(&root) {
            Ok(m) => m.checkpoint(&message),
            Err(e) => {
                error!("Snapshot failed: {}", e);
                None
            }
        })
        .await
        .unwrap_or_else(|e| {
            error!("Snapshot worker failed: {}", e);
            None
        })
    }

    pub async fn history(&self, root: &Path, limit: usize) -> Vec<Snapshot> {
        let mutators = self.mutators.clone();
        let root = root.to_path_buf();
        task::spawn_blocking(move || match mutators.get_or_create(&root) {
            Ok(m) => m.snapshots().history(limit),
            Err(e) => {
                error!("Reading snapshot history failed: {}", e);
                Vec::new()
            }
        })
        .await
        .unwrap_or_default()
    }
}

fn worker_failed(task: &str, e: task::JoinError) -> CoreError {
    error!("{} worker failed: {}", task, e);
    CoreError::Worker(format!("{} worker failed: {}", task, e))
}

/// One mutator per canonical root, so every root has exactly one write lock.
struct MutatorRegistry {
    config: AppConfig,
    inner: Mutex<HashMap<PathBuf, Arc<SafeMutator>>>,
}

impl MutatorRegistry {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_create(&self, root: &Path) -> Result<Arc<SafeMutator>> {
        let canonical = paths::canonical_root(root)?;
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(m) = map.get(&canonical) {
            return Ok(m.clone());
        }
        let store = if self.config.snapshots.enabled {
            SnapshotStore::ensure_repo(&canonical, &self.config.snapshots)?
        } else {
            SnapshotStore::detached(&canonical)?
        };
        let mutator = Arc::new(SafeMutator::new(&canonical, Arc::new(store))?);
        map.insert(canonical, mutator.clone());
        Ok(mutator)
    }
}

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_embedding(
        "hashing",
        Arc::new(HashingEmbedder::new(config.embeddings.dimension)),
    );

    let base_url = config
        .embeddings
        .base_url
        .clone()
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok());
    if let Some(base) = base_url {
        let provider = OpenAiEmbedder::new(OpenAiConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: base,
            embedding_model: config.embeddings.model.clone(),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
}
