//! Embedding provider trait and vector distance.
//!
//! Concrete providers (OpenAI, disabled) live in the `pdf-chat` app crate;
//! the indexer and retriever only see [`EmbeddingProvider`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// A service that maps texts to fixed-dimensional vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order, all with the same dimensionality.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`EmbeddingProvider::embed`] for the
/// one-text case (embedding a question for retrieval).
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

/// Squared Euclidean distance between two vectors of equal length.
///
/// ```text
/// d(a, b) = Σ (aᵢ − bᵢ)²
/// ```
///
/// Callers are responsible for checking dimensions; extra trailing
/// components of the longer vector are ignored.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
