//! Exact in-memory similarity index.
//!
//! Stores `(chunk, vector)` pairs and answers top-k queries by brute-force
//! squared L2 distance over every entry. The index is immutable once built
//! and shared behind an `Arc`; a rebuild produces a new index and the old
//! one is dropped when its last reader finishes.

use anyhow::{bail, Result};

use crate::embedding::squared_l2;
use crate::models::{Chunk, SearchHit};

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Flat nearest-neighbour index over chunk embeddings.
#[derive(Default)]
pub struct SimilarityIndex {
    entries: Vec<IndexEntry>,
    dims: Option<usize>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk with its embedding.
    ///
    /// The first vector fixes the index dimensionality; later vectors must
    /// match it.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            bail!("cannot index chunk {} with an empty vector", chunk.index);
        }
        match self.dims {
            Some(dims) if dims != vector.len() => bail!(
                "dimension mismatch for chunk {}: index has {}, vector has {}",
                chunk.index,
                dims,
                vector.len()
            ),
            Some(_) => {}
            None => self.dims = Some(vector.len()),
        }
        self.entries.push(IndexEntry { chunk, vector });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, or `None` while the index is empty.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Iterate over indexed chunks and their vectors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Chunk, &[f32])> {
        self.entries.iter().map(|e| (&e.chunk, e.vector.as_slice()))
    }

    /// Return the `k` chunks closest to `query`, nearest first.
    ///
    /// Ties are broken by chunk order so results are deterministic. An
    /// empty index yields no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let dims = match self.dims {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        if query.len() != dims {
            bail!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                dims
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (pos, squared_l2(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, distance)| SearchHit {
                chunk: self.entries[pos].chunk.clone(),
                distance,
            })
            .collect())
    }
}
