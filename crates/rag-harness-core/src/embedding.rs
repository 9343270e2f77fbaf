//! Embedding model capability traits and the resident-model [`Embedder`].
//!
//! A model is anything that can turn a batch of texts into fixed-dimension
//! vectors ([`TextEncoder`]). Models are produced by a [`ModelLoader`], which
//! is where the expensive work (download, ONNX session setup, endpoint probe)
//! happens. The [`Embedder`] keeps at most one loaded model resident and only
//! reloads when a different model name is requested.
//!
//! Concrete loaders (fastembed, tract, Ollama) live in the `rag-harness`
//! app crate. [`HashLoader`] is a deterministic, dependency-free model used
//! for offline runs and tests.

use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{RagError, Result};
use crate::models::Embeddings;

/// A loaded embedding model.
///
/// `encode` must be deterministic for a fixed model and input, and must
/// return one vector of length [`dims`](TextEncoder::dims) per input text.
pub trait TextEncoder: Send {
    /// Returns the model identifier as requested by the caller.
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a non-empty batch of texts, in input order.
    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Factory for [`TextEncoder`]s.
///
/// `load` may block for a long time. It must either return a fully usable
/// model or an error; it never leaves partial state behind.
pub trait ModelLoader: Send + Sync {
    /// Short provider identifier used in logs (e.g. `"local"`).
    fn provider(&self) -> &str;
    fn load(&self, model_name: &str, cache_location: &str) -> Result<Box<dyn TextEncoder>>;
}

/// Outcome of [`Embedder::ensure_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLoad {
    /// The requested model was already resident.
    Reused,
    /// A model was loaded where none was resident before.
    Loaded,
    /// A different model was resident and has been replaced.
    Replaced { previous: String },
}

impl ModelLoad {
    /// True when the resident model changed identity.
    pub fn swapped(&self) -> bool {
        matches!(self, ModelLoad::Replaced { .. })
    }
}

/// Read-only view of the resident model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHandle<'a> {
    pub name: &'a str,
    pub cache_location: &'a str,
    pub dims: usize,
}

struct Resident {
    cache_location: String,
    encoder: Box<dyn TextEncoder>,
}

/// Owns the single resident embedding model.
pub struct Embedder {
    loader: Box<dyn ModelLoader>,
    resident: Option<Resident>,
}

impl Embedder {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            resident: None,
        }
    }

    /// Make `model_name` the resident model, loading it if needed.
    ///
    /// Idempotent when the resident model already has this name. On load
    /// failure the previously resident model, if any, stays resident.
    pub fn ensure_model(&mut self, model_name: &str, cache_location: &str) -> Result<ModelLoad> {
        if model_name.trim().is_empty() {
            return Err(RagError::invalid("model_name must not be empty"));
        }

        if let Some(resident) = &self.resident {
            if resident.encoder.model_name() == model_name {
                debug!(model = model_name, "reusing resident model");
                return Ok(ModelLoad::Reused);
            }
        }

        info!(
            provider = self.loader.provider(),
            model = model_name,
            cache = cache_location,
            "loading embedding model"
        );
        let started = Instant::now();
        let encoder = self.loader.load(model_name, cache_location)?;
        if encoder.dims() == 0 {
            return Err(RagError::model_unavailable(
                model_name,
                "model reports zero dimensions",
            ));
        }
        info!(
            model = model_name,
            dims = encoder.dims(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedding model ready"
        );

        let previous = self.resident.replace(Resident {
            cache_location: cache_location.to_string(),
            encoder,
        });
        Ok(match previous {
            None => ModelLoad::Loaded,
            Some(prev) => ModelLoad::Replaced {
                previous: prev.encoder.model_name().to_string(),
            },
        })
    }

    pub fn resident(&self) -> Option<ModelHandle<'_>> {
        self.resident.as_ref().map(|r| ModelHandle {
            name: r.encoder.model_name(),
            cache_location: &r.cache_location,
            dims: r.encoder.dims(),
        })
    }

    /// Embed a batch of texts with the resident model.
    ///
    /// An empty batch yields a zero-row matrix without touching the model.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoModel`] if no model is resident.
    /// - [`RagError::Encoding`] if the model fails or returns a malformed
    ///   matrix (wrong row count, ragged rows, NaN or infinite components).
    pub fn encode(&mut self, texts: &[String]) -> Result<Embeddings> {
        let resident = self.resident.as_mut().ok_or(RagError::NoModel)?;
        let dims = resident.encoder.dims();
        if texts.is_empty() {
            return Ok(Embeddings::empty(dims));
        }

        let vectors = resident.encoder.encode(texts)?;
        if vectors.len() != texts.len() {
            return Err(RagError::Encoding(format!(
                "model returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let embeddings = Embeddings { dims, vectors };
        if let Some(row) = embeddings.first_ragged_row() {
            return Err(RagError::Encoding(format!(
                "vector {} has {} components, expected {}",
                row,
                embeddings.vectors[row].len(),
                dims
            )));
        }
        if let Some(row) = embeddings
            .vectors
            .iter()
            .position(|v| v.iter().any(|x| !x.is_finite()))
        {
            return Err(RagError::Encoding(format!(
                "vector {} has non-finite components",
                row
            )));
        }
        Ok(embeddings)
    }

    /// Embed a single query string.
    pub fn encode_one(&mut self, text: &str) -> Result<Vec<f32>> {
        self.encode(&[text.to_string()])?
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Encoding("empty embedding response".to_string()))
    }
}

// ============ Hash model ============

/// Loader for [`HashEncoder`]. Accepts any model name.
pub struct HashLoader {
    dims: usize,
}

impl HashLoader {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl ModelLoader for HashLoader {
    fn provider(&self) -> &str {
        "hash"
    }

    fn load(&self, model_name: &str, _cache_location: &str) -> Result<Box<dyn TextEncoder>> {
        if self.dims == 0 {
            return Err(RagError::model_unavailable(model_name, "hash_dims must be > 0"));
        }
        Ok(Box::new(HashEncoder {
            model_name: model_name.to_string(),
            dims: self.dims,
        }))
    }
}

/// Feature-hashing bag-of-words model.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dims` buckets with a ±1 sign; the result is L2-normalised. Texts that
/// share no tokens are (almost always) far apart, identical texts map to
/// identical vectors.
pub struct HashEncoder {
    model_name: String,
    dims: usize,
}

impl HashEncoder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(head) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize_l2(&mut v);
        v
    }
}

impl TextEncoder for HashEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Scale a vector to unit length in place. Near-zero vectors are left as is.
pub fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Squared Euclidean distance between two vectors of equal length.
///
/// ```text
/// d(a, b) = Σ (aᵢ - bᵢ)²
/// ```
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
