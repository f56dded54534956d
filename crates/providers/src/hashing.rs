//! Local, deterministic embedder based on signed feature hashing.
//!
//! Identifier-like tokens (three characters or longer) are lowercased, hashed with blake3
//! into one of `dimension` buckets with a sign bit, and the resulting vector is
//! L2-normalized. Texts that share vocabulary land close together, which is enough for
//! offline use and tests without a model server.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

const MIN_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for token in text
            .split(|ch: char| !ch.is_alphanumeric() && ch != '_')
            .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        {
            let token = token.to_lowercase();
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let bucket = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
                % self.dimension;
            let sign = if bytes[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_text(t)).collect(),
        })
    }
}
