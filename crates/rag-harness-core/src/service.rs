//! Retrieval service: the one owner of the resident model and active index.
//!
//! # State machine
//!
//! ```text
//!                embed_texts / create_vector_index (load)
//! Uninitialized ────────────────────────────────▶ ModelReady
//!                                                 │        ▲
//!                             create_vector_index │        │ model swap
//!                                                 ▼        │
//!                                               IndexReady ┘
//! ```
//!
//! The active index always belongs to the resident model. When a request
//! swaps the model, the index is dropped, since its vectors live in the
//! old model's space.
//!
//! Rebuilding is build-then-publish: the new index is constructed in full
//! and only then replaces the old one, so a failed build leaves the previous
//! generation searchable.

use serde::Serialize;
use tracing::{info, warn};

use crate::embedding::{Embedder, ModelLoader};
use crate::error::{RagError, Result};
use crate::index::{FlatL2Index, VectorIndex};
use crate::models::SearchHit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    ModelReady,
    IndexReady,
}

/// Result of [`RetrievalService::embed_texts`].
#[derive(Debug, Clone, Serialize)]
pub struct EmbedOutput {
    pub success: bool,
    pub embeddings: Vec<Vec<f32>>,
    pub embedding_dim: usize,
    pub num_texts: usize,
    pub model_name: String,
}

/// Result of [`RetrievalService::create_vector_index`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexOutput {
    pub success: bool,
    pub index_created: bool,
    pub num_vectors: usize,
    pub embedding_dim: usize,
    pub model_name: String,
}

/// Result of [`RetrievalService::search_similar`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub success: bool,
    pub query: String,
    pub top_k: i64,
    pub results: Vec<SearchHit>,
}

struct ActiveIndex<I> {
    model_name: String,
    index: I,
}

pub struct RetrievalService<I: VectorIndex = FlatL2Index> {
    embedder: Embedder,
    active: Option<ActiveIndex<I>>,
}

impl RetrievalService<FlatL2Index> {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self::with_embedder(Embedder::new(loader))
    }
}

impl<I: VectorIndex> RetrievalService<I> {
    pub fn with_embedder(embedder: Embedder) -> Self {
        Self {
            embedder,
            active: None,
        }
    }

    pub fn state(&self) -> ServiceState {
        match (&self.active, self.embedder.resident()) {
            (Some(_), _) => ServiceState::IndexReady,
            (None, Some(_)) => ServiceState::ModelReady,
            (None, None) => ServiceState::Uninitialized,
        }
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn index(&self) -> Option<&I> {
        self.active.as_ref().map(|a| &a.index)
    }

    /// Embed `texts` with `model_name`, loading the model if needed.
    ///
    /// Never builds or modifies the index, except that a model swap drops an
    /// index built with the previous model.
    pub fn embed_texts(
        &mut self,
        texts: &[String],
        model_name: &str,
        cache_location: &str,
    ) -> Result<EmbedOutput> {
        self.ensure_model(model_name, cache_location)?;
        let embeddings = self.embedder.encode(texts)?;

        Ok(EmbedOutput {
            success: true,
            embedding_dim: embeddings.dims,
            num_texts: texts.len(),
            embeddings: embeddings.vectors,
            model_name: model_name.to_string(),
        })
    }

    /// Embed `texts` and replace the active index with one built from them.
    ///
    /// Ordinal `i` of the new index is `texts[i]`.
    ///
    /// # Errors
    ///
    /// [`RagError::InvalidArgument`] for an empty `texts` list, checked
    /// before any model is loaded.
    pub fn create_vector_index(
        &mut self,
        texts: Vec<String>,
        model_name: &str,
        cache_location: &str,
    ) -> Result<IndexOutput> {
        if texts.is_empty() {
            return Err(RagError::invalid("texts must not be empty"));
        }

        self.ensure_model(model_name, cache_location)?;
        let embeddings = self.embedder.encode(&texts)?;
        let index = I::build(embeddings, texts)?;

        let output = IndexOutput {
            success: true,
            index_created: true,
            num_vectors: index.len(),
            embedding_dim: index.dims(),
            model_name: model_name.to_string(),
        };
        info!(
            vectors = output.num_vectors,
            dims = output.embedding_dim,
            model = model_name,
            "vector index built"
        );

        self.active = Some(ActiveIndex {
            model_name: model_name.to_string(),
            index,
        });
        Ok(output)
    }

    /// Return the `top_k` indexed chunks closest to `query`.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoModel`] / [`RagError::NoIndex`] before an index exists.
    /// - [`RagError::InvalidArgument`] if `top_k <= 0`.
    pub fn search_similar(&mut self, query: &str, top_k: i64) -> Result<SearchOutput> {
        let active = match &self.active {
            Some(active) => active,
            None if self.embedder.resident().is_none() => return Err(RagError::NoModel),
            None => return Err(RagError::NoIndex),
        };

        let k = usize::try_from(top_k)
            .ok()
            .filter(|k| *k > 0)
            .ok_or_else(|| RagError::invalid("top_k must be a positive integer"))?;

        let query_vec = self.embedder.encode_one(query)?;
        let results = active.index.search(&query_vec, k)?;
        info!(top_k, hits = results.len(), "similarity search");

        Ok(SearchOutput {
            success: true,
            query: query.to_string(),
            top_k,
            results,
        })
    }

    fn ensure_model(&mut self, model_name: &str, cache_location: &str) -> Result<()> {
        self.embedder.ensure_model(model_name, cache_location)?;

        let stale = self
            .active
            .as_ref()
            .is_some_and(|a| a.model_name != model_name);
        if stale {
            if let Some(dropped) = self.active.take() {
                warn!(
                    previous_model = %dropped.model_name,
                    model = model_name,
                    vectors = dropped.index.len(),
                    "embedding model changed, discarding vector index"
                );
            }
        }
        Ok(())
    }
}
