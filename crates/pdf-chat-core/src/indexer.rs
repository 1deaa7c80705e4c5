//! Corpus indexer: full text → chunks → embeddings → [`SimilarityIndex`].
//!
//! The whole corpus is re-split and a fresh index is built on every call.
//! With [`IndexOptions::reuse_vectors`] enabled, chunks whose SHA-256 hash
//! already appears in the previous index (or earlier in the same build)
//! take that vector instead of calling the embedding service again.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Context, Result};

use crate::chunk::{chunk_corpus, RecursiveSplitter};
use crate::embedding::EmbeddingProvider;
use crate::index::SimilarityIndex;

/// Tuning knobs for [`build_index`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Maximum texts sent per embedding call.
    pub batch_size: usize,
    pub reuse_vectors: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            reuse_vectors: true,
        }
    }
}

/// Build a similarity index over every chunk of `text`.
///
/// # Errors
///
/// Fails if any embedding call fails, returns the wrong number of vectors,
/// or returns vectors of inconsistent dimensionality. No partial index is
/// returned.
pub async fn build_index(
    text: &str,
    splitter: &RecursiveSplitter,
    embedder: &dyn EmbeddingProvider,
    options: &IndexOptions,
    previous: Option<&SimilarityIndex>,
) -> Result<SimilarityIndex> {
    let chunks = chunk_corpus(text, splitter);
    let reuse = options.reuse_vectors;

    let mut known: HashMap<&str, Vec<f32>> = HashMap::new();
    if reuse {
        if let Some(prev) = previous {
            for (chunk, vector) in prev.iter() {
                known.insert(chunk.hash.as_str(), vector.to_vec());
            }
        }
    }

    let mut pending: Vec<usize> = Vec::new();
    let mut queued: HashSet<&str> = HashSet::new();
    for (pos, chunk) in chunks.iter().enumerate() {
        if reuse && (known.contains_key(chunk.hash.as_str()) || !queued.insert(chunk.hash.as_str()))
        {
            continue;
        }
        pending.push(pos);
    }

    let mut vectors: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
    for batch in pending.chunks(options.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|&pos| chunks[pos].text.clone()).collect();
        let embedded = embedder.embed(&texts).await.with_context(|| {
            format!(
                "failed to embed chunks {}..={} with {}",
                batch[0],
                batch[batch.len() - 1],
                embedder.model_name()
            )
        })?;
        if embedded.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} texts",
                embedded.len(),
                texts.len()
            );
        }
        for (&pos, vector) in batch.iter().zip(embedded) {
            if reuse {
                known.insert(chunks[pos].hash.as_str(), vector.clone());
            }
            vectors[pos] = Some(vector);
        }
    }

    let mut index = SimilarityIndex::new();
    for (chunk, slot) in chunks.iter().zip(vectors) {
        let vector = match slot {
            Some(v) => v,
            None => known
                .get(chunk.hash.as_str())
                .cloned()
                .ok_or_else(|| anyhow!("no embedding produced for chunk {}", chunk.index))?,
        };
        index.insert(chunk.clone(), vector)?;
    }

    tracing::info!(
        chunks = index.len(),
        embedded = pending.len(),
        reused = index.len() - pending.len(),
        corpus_chars = text.chars().count(),
        "built similarity index"
    );

    Ok(index)
}
