//! Data types that flow through the retrieval pipeline.

use serde::Serialize;

/// A run of consecutive sentences from one document, joined by single spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of the chunk within its document.
    pub index: usize,
    pub text: String,
    /// Number of sentences grouped into `text`.
    pub sentence_count: usize,
}

/// A dense batch of embedding vectors, one row per input text.
///
/// Every row has exactly `dims` components. A batch may have zero rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub dims: usize,
    pub vectors: Vec<Vec<f32>>,
}

impl Embeddings {
    pub fn empty(dims: usize) -> Self {
        Self {
            dims,
            vectors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Index of the first row whose length differs from `dims`, if any.
    pub fn first_ragged_row(&self) -> Option<usize> {
        self.vectors.iter().position(|v| v.len() != self.dims)
    }
}

/// One ranked match returned by a vector search.
///
/// Serializes to the `search_similar` wire shape:
/// `{"rank", "text", "distance", "index"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub text: String,
    /// Squared Euclidean distance to the query (lower is closer).
    pub distance: f32,
    /// Insertion ordinal of the matched vector.
    #[serde(rename = "index")]
    pub ordinal: usize,
}
