//! Exact nearest-neighbour vector index.
//!
//! [`VectorIndex`] is the capability the retrieval service needs from an
//! index: build once from a full batch, then answer top-k queries. An index
//! is a single generation; there is no insert or delete. Rebuilding means
//! building a new value and replacing the old one.
//!
//! [`FlatL2Index`] is the brute-force implementation: every query scans all
//! stored vectors.
//!
//! # Ranking
//!
//! 1. Distance is squared Euclidean (lower = more similar).
//! 2. Ties are broken by ascending insertion ordinal.
//! 3. At most `min(top_k, len)` hits are returned, ranked from 1.

use crate::embedding::squared_l2;
use crate::error::{RagError, Result};
use crate::models::{Embeddings, SearchHit};

pub trait VectorIndex: Send + Sync + Sized {
    /// Build an index whose ordinal `i` holds `embeddings.vectors[i]` and `texts[i]`.
    ///
    /// # Errors
    ///
    /// [`RagError::InvalidArgument`] if the batch is empty, the text count
    /// differs from the vector count, or rows have differing lengths.
    fn build(embeddings: Embeddings, texts: Vec<String>) -> Result<Self>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension shared by all stored vectors.
    fn dims(&self) -> usize;

    /// Source text stored at `ordinal`.
    fn text(&self, ordinal: usize) -> Option<&str>;

    /// Return the `top_k` stored entries closest to `query`.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;
}

/// Brute-force index over a row-major `f32` buffer.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dims: usize,
    data: Vec<f32>,
    texts: Vec<String>,
}

impl FlatL2Index {
    /// Stored vector at `ordinal`.
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        if ordinal >= self.texts.len() {
            return None;
        }
        let start = ordinal * self.dims;
        Some(&self.data[start..start + self.dims])
    }
}

impl VectorIndex for FlatL2Index {
    fn build(embeddings: Embeddings, texts: Vec<String>) -> Result<Self> {
        if embeddings.is_empty() {
            return Err(RagError::invalid("cannot build an index from zero vectors"));
        }
        if texts.len() != embeddings.len() {
            return Err(RagError::invalid(format!(
                "got {} texts for {} vectors",
                texts.len(),
                embeddings.len()
            )));
        }
        if embeddings.dims == 0 {
            return Err(RagError::invalid("vectors must have at least one dimension"));
        }
        if let Some(row) = embeddings.first_ragged_row() {
            return Err(RagError::invalid(format!(
                "vector {} has {} components, expected {}",
                row,
                embeddings.vectors[row].len(),
                embeddings.dims
            )));
        }

        let dims = embeddings.dims;
        let mut data = Vec::with_capacity(dims * embeddings.len());
        for v in &embeddings.vectors {
            data.extend_from_slice(v);
        }

        Ok(Self { dims, data, texts })
    }

    fn len(&self) -> usize {
        self.texts.len()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn text(&self, ordinal: usize) -> Option<&str> {
        self.texts.get(ordinal).map(String::as_str)
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::invalid("top_k must be a positive integer"));
        }
        if query.len() != self.dims {
            return Err(RagError::invalid(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dims
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::invalid("query vector contains non-finite values"));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dims)
            .map(|row| squared_l2(query, row))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k.min(self.len()));

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(pos, (ordinal, distance))| SearchHit {
                rank: pos + 1,
                text: self.texts[ordinal].clone(),
                distance,
                ordinal,
            })
            .collect())
    }
}
