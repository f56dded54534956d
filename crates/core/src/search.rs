use crate::index::SemanticIndex;
use crate::models::Document;
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Query front end over a shared [`SemanticIndex`].
#[derive(Clone)]
pub struct ContextRetriever {
    index: Arc<SemanticIndex>,
}

impl ContextRetriever {
    pub fn new(index: Arc<SemanticIndex>) -> Self {
        Self { index }
    }

    /// The most relevant documents for `query`, at most `max_results`. An unbuilt index or
    /// a failing embedder yields an empty list.
    pub async fn retrieve(&self, query: &str, max_results: usize) -> Vec<Document> {
        info!("Retrieving context for query: {}", query);
        match self.index.search(query, max_results).await {
            Ok(docs) => docs,
            Err(e) => {
                error!("Context retrieval failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn retrieve_default(&self, query: &str) -> Vec<Document> {
        self.retrieve(query, DEFAULT_MAX_RESULTS).await
    }
}
