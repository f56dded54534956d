use crate::error::{CoreError, Result};
use providers::{EmbeddingProvider, ProviderRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    pub dimension: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f32>>,
}

/// One batched provider call. The provider must return exactly one vector per text, each of
/// the configured dimension; anything else is a configuration error.
pub async fn embed(
    req: EmbeddingRequest,
    provider: &dyn EmbeddingProvider,
) -> Result<EmbeddingResult> {
    if req.texts.is_empty() {
        return Ok(EmbeddingResult { vectors: vec![] });
    }
    let resp = provider.embed(&req.texts).await?;
    if resp.vectors.len() != req.texts.len() {
        return Err(CoreError::Configuration(format!(
            "embedding provider returned {} vectors for {} texts",
            resp.vectors.len(),
            req.texts.len()
        )));
    }
    if let Some((i, v)) = resp
        .vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != req.dimension)
    {
        return Err(CoreError::Configuration(format!(
            "embedding dimension mismatch at input {}: expected {}, got {}",
            i,
            req.dimension,
            v.len()
        )));
    }
    Ok(EmbeddingResult {
        vectors: resp.vectors,
    })
}

/// Resolves the configured provider by name from a registry.
pub fn provider_from(
    registry: &ProviderRegistry,
    name: Option<&str>,
) -> Result<Arc<dyn EmbeddingProvider>> {
    registry
        .embedding(name)
        .map_err(|e| CoreError::Configuration(e.to_string()))
}
