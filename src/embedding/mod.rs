//! Concrete embedding model loaders.
//!
//! Implements [`ModelLoader`] for each provider the config can select:
//! - **`local`** — runs models on this machine via fastembed (primary) or
//!   tract (musl/Intel Mac). Models are downloaded into the request's
//!   `cache_folder` on first load; no network calls afterwards.
//! - **`ollama`** — calls a local Ollama instance's `/api/embed` endpoint.
//!   Loading probes the endpoint once to learn the model's dimension.
//! - **`hash`** — the deterministic hashing model from the core crate.
//!
//! Every loader here blocks. Callers run them off the async runtime
//! (see [`server`](crate::server)).
//!
//! # Provider Selection
//!
//! ```rust
//! # use rag_harness::config::EmbeddingConfig;
//! # use rag_harness::embedding::create_loader;
//! let config = EmbeddingConfig {
//!     provider: "hash".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let loader = create_loader(&config).unwrap();
//! assert_eq!(loader.provider(), "hash");
//! ```

#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use anyhow::{bail, Result};
use rag_harness_core::embedding::{HashLoader, ModelLoader, TextEncoder};
use rag_harness_core::RagError;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Create the [`ModelLoader`] for the configured provider.
///
/// | Config Value | Loader |
/// |-------------|--------|
/// | `"hash"` | [`HashLoader`] |
/// | `"ollama"` | [`OllamaLoader`] |
/// | `"local"` | fastembed or tract, see features |
pub fn create_loader(config: &EmbeddingConfig) -> Result<Box<dyn ModelLoader>> {
    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashLoader::new(config.hash_dims))),
        "ollama" => Ok(Box::new(OllamaLoader::new(config))),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(FastembedLoader::new(config))),
        #[cfg(all(
            feature = "local-embeddings-tract",
            not(feature = "local-embeddings-fastembed")
        ))]
        "local" => Ok(Box::new(local_tract::TractLoader::new(config))),
        #[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
        "local" => bail!(
            "Local embedding provider requires one of: --features local-embeddings-fastembed, --features local-embeddings-tract"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Normalise a requested model name to the lowercase catalogue spelling.
///
/// Accepts sentence-transformers spellings such as `all-MiniLM-L6-v2` or
/// `sentence-transformers/all-MiniLM-L6-v2`.
#[cfg_attr(
    not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")),
    allow(dead_code)
)]
fn catalogue_name(model_name: &str) -> String {
    let lower = model_name.trim().to_lowercase();
    match lower.rsplit_once('/') {
        Some((_, tail)) => tail.to_string(),
        None => lower,
    }
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
fn to_fastembed_model(model_name: &str) -> rag_harness_core::Result<fastembed::EmbeddingModel> {
    match catalogue_name(model_name).as_str() {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        _ => Err(RagError::model_unavailable(
            model_name,
            "unknown local embedding model. Supported models: \
             all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             bge-large-en-v1.5, nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
        )),
    }
}

/// Loads fastembed (ONNX Runtime) models into the request's cache folder.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct FastembedLoader {
    batch_size: usize,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl FastembedLoader {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
        }
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
impl ModelLoader for FastembedLoader {
    fn provider(&self) -> &str {
        "local"
    }

    fn load(
        &self,
        model_name: &str,
        cache_location: &str,
    ) -> rag_harness_core::Result<Box<dyn TextEncoder>> {
        let model = to_fastembed_model(model_name)?;
        std::fs::create_dir_all(cache_location).map_err(|e| {
            RagError::model_unavailable(
                model_name,
                format!("cannot create cache folder {}: {}", cache_location, e),
            )
        })?;

        // Download progress bars would share the terminal with protocol output.
        let options = fastembed::InitOptions::new(model)
            .with_cache_dir(std::path::PathBuf::from(cache_location))
            .with_show_download_progress(false);
        let mut embedding = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| RagError::model_unavailable(model_name, e))?;

        let dims = embedding
            .embed(vec!["dimension probe"], None)
            .map_err(|e| RagError::model_unavailable(model_name, e))?
            .first()
            .map(|v| v.len())
            .unwrap_or(0);

        Ok(Box::new(FastembedEncoder {
            model_name: model_name.to_string(),
            dims,
            batch_size: self.batch_size,
            embedding,
        }))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
struct FastembedEncoder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    embedding: fastembed::TextEmbedding,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl TextEncoder for FastembedEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&mut self, texts: &[String]) -> rag_harness_core::Result<Vec<Vec<f32>>> {
        self.embedding
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| RagError::Encoding(e.to_string()))
    }
}

// ============ Ollama Provider ============

/// Embedding models served by a local Ollama instance.
///
/// Requires Ollama to be running with the model pulled
/// (e.g. `ollama pull nomic-embed-text`). `cache_folder` is ignored; Ollama
/// manages its own model store.
pub struct OllamaLoader {
    url: String,
    timeout: Duration,
    batch_size: usize,
}

impl OllamaLoader {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            batch_size: config.batch_size,
        }
    }
}

impl ModelLoader for OllamaLoader {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn load(
        &self,
        model_name: &str,
        _cache_location: &str,
    ) -> rag_harness_core::Result<Box<dyn TextEncoder>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RagError::model_unavailable(model_name, e))?;

        let probe = ollama_embed(&client, &self.url, model_name, &["dimension probe".to_string()])
            .map_err(|e| RagError::model_unavailable(model_name, e))?;
        let dims = probe.first().map(|v| v.len()).unwrap_or(0);

        Ok(Box::new(OllamaEncoder {
            client,
            url: self.url.clone(),
            model_name: model_name.to_string(),
            dims,
            batch_size: self.batch_size,
        }))
    }
}

struct OllamaEncoder {
    client: reqwest::blocking::Client,
    url: String,
    model_name: String,
    dims: usize,
    batch_size: usize,
}

impl TextEncoder for OllamaEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&mut self, texts: &[String]) -> rag_harness_core::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let vectors = ollama_embed(&self.client, &self.url, &self.model_name, batch)
                .map_err(|e| RagError::Encoding(e.to_string()))?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

fn ollama_embed(
    client: &reqwest::blocking::Client,
    url: &str,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let response = client
        .post(format!("{}/api/embed", url))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .map_err(|e| anyhow::anyhow!("Ollama connection error (is Ollama running at {}?): {}", url, e))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().unwrap_or_default();
        bail!("Ollama API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json()?;
    parse_ollama_response(&json)
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: non-numeric component"))
            })
            .collect::<Result<_>>()?;
        result.push(vec);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_provider_loads_any_name() {
        let cfg = EmbeddingConfig {
            provider: "hash".to_string(),
            hash_dims: 12,
            ..EmbeddingConfig::default()
        };
        let loader = create_loader(&cfg).unwrap();
        let encoder = loader.load("whatever", "./models").unwrap();
        assert_eq!(encoder.dims(), 12);
        assert_eq!(encoder.model_name(), "whatever");
    }

    #[test]
    fn unknown_provider_rejected() {
        let cfg = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_loader(&cfg).is_err());
    }

    #[test]
    fn catalogue_name_accepts_sentence_transformers_spelling() {
        assert_eq!(catalogue_name("all-MiniLM-L6-v2"), "all-minilm-l6-v2");
        assert_eq!(
            catalogue_name("sentence-transformers/all-MiniLM-L6-v2"),
            "all-minilm-l6-v2"
        );
        assert_eq!(catalogue_name(" BGE-small-en-v1.5 "), "bge-small-en-v1.5");
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn unknown_local_model_is_unavailable() {
        assert!(matches!(
            to_fastembed_model("not-a-model"),
            Err(RagError::ModelUnavailable { .. })
        ));
        assert!(to_fastembed_model("all-MiniLM-L6-v2").is_ok());
    }

    #[test]
    fn ollama_unreachable_is_model_unavailable() {
        let cfg = EmbeddingConfig {
            provider: "ollama".to_string(),
            url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 1,
            ..EmbeddingConfig::default()
        };
        let loader = OllamaLoader::new(&cfg);
        let err = loader.load("nomic-embed-text", "./models").err().unwrap();
        assert!(matches!(err, RagError::ModelUnavailable { .. }));
    }

    #[test]
    fn parses_ollama_response() {
        let v = parse_ollama_response(&json!({ "embeddings": [[0.5, -1.0], [2.0, 0.0]] })).unwrap();
        assert_eq!(v, vec![vec![0.5, -1.0], vec![2.0, 0.0]]);
        assert!(parse_ollama_response(&json!({ "embedding": [] })).is_err());
        assert!(parse_ollama_response(&json!({ "embeddings": [["x"]] })).is_err());
    }
}
