//! Tract-based local embedding pipeline (fallback for musl and Intel Mac).
//!
//! Pure-Rust path: loads the ONNX model with tract-onnx and tokenizes with
//! the tokenizers crate. No ONNX Runtime or system deps. Model files live
//! under `<cache_folder>/<model>/` and are downloaded from Hugging Face on
//! first load.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{anyhow, bail, Result};
use rag_harness_core::embedding::{normalize_l2, ModelLoader, TextEncoder};
use rag_harness_core::RagError;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

use super::catalogue_name;
use crate::config::EmbeddingConfig;

const DEFAULT_MAX_LEN: usize = 256;

struct Manifest {
    repo: &'static str,
    onnx: &'static str,
    tokenizer: &'static str,
    dims: usize,
}

fn model_manifest(model_name: &str) -> Result<Manifest> {
    match catalogue_name(model_name).as_str() {
        "all-minilm-l6-v2" => Ok(Manifest {
            repo: "sentence-transformers/all-MiniLM-L6-v2",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
            dims: 384,
        }),
        "all-minilm-l12-v2" => Ok(Manifest {
            repo: "sentence-transformers/all-MiniLM-L12-v2",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
            dims: 384,
        }),
        _ => bail!(
            "tract backend supports all-MiniLM-L6-v2 and all-MiniLM-L12-v2, requested '{}'",
            model_name
        ),
    }
}

fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        path.replace(' ', "%20")
    );
    tracing::info!(url = %url, "downloading model file");
    let resp = reqwest::blocking::get(&url)
        .map_err(|e| anyhow!("Download {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| anyhow!("Download {}: {}", url, e))?;
    let bytes = resp.bytes().map_err(|e| anyhow!("Read body: {}", e))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| anyhow!("Create cache dir: {}", e))?;
    }
    std::fs::write(cache_path, &bytes).map_err(|e| anyhow!("Write cache: {}", e))?;
    Ok(())
}

/// Ensure model and tokenizer are in the cache; return (onnx path, tokenizer path).
fn ensure_cached(manifest: &Manifest, model_name: &str, cache_location: &str) -> Result<(PathBuf, PathBuf)> {
    let model_dir = Path::new(cache_location).join(catalogue_name(model_name));
    let onnx_path = model_dir.join(manifest.onnx);
    let tokenizer_path = model_dir.join(manifest.tokenizer);
    download_to_cache(manifest.repo, manifest.onnx, &onnx_path)?;
    download_to_cache(manifest.repo, manifest.tokenizer, &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path))
}

pub struct TractLoader {
    batch_size: usize,
}

impl TractLoader {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
        }
    }

    fn load_encoder(&self, model_name: &str, cache_location: &str) -> Result<TractEncoder> {
        let manifest = model_manifest(model_name)?;
        let (onnx_path, tokenizer_path) = ensure_cached(&manifest, model_name, cache_location)?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Load tokenizer: {}", e))?;

        let model = tract_onnx::onnx()
            .model_for_path(onnx_path)
            .map_err(|e| anyhow!("Load ONNX: {}", e))?
            .into_optimized()
            .map_err(|e| anyhow!("Optimize: {}", e))?
            .into_runnable()
            .map_err(|e| anyhow!("Build tract runnable: {}", e))?;

        Ok(TractEncoder {
            model_name: model_name.to_string(),
            dims: manifest.dims,
            batch_size: self.batch_size.max(1),
            tokenizer,
            model,
        })
    }
}

impl ModelLoader for TractLoader {
    fn provider(&self) -> &str {
        "local"
    }

    fn load(
        &self,
        model_name: &str,
        cache_location: &str,
    ) -> rag_harness_core::Result<Box<dyn TextEncoder>> {
        let encoder = self
            .load_encoder(model_name, cache_location)
            .map_err(|e| RagError::model_unavailable(model_name, e))?;
        Ok(Box::new(encoder))
    }
}

pub struct TractEncoder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    tokenizer: tokenizers::Tokenizer,
    model: TypedRunnableModel<TypedModel>,
}

impl TextEncoder for TractEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&mut self, texts: &[String]) -> rag_harness_core::Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self
                .encode_batch(batch)
                .map_err(|e| RagError::Encoding(e.to_string()))?;
            all.extend(vectors);
        }
        Ok(all)
    }
}

impl TractEncoder {
    fn encode_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings: Vec<_> = batch
            .iter()
            .map(|s| {
                self.tokenizer
                    .encode(s.as_str(), true)
                    .map_err(|e| anyhow!("Tokenize: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(1)
            .clamp(1, DEFAULT_MAX_LEN);

        let rows = encodings.len();
        let mut input_ids = vec![0i64; rows * max_len];
        let mut attention_mask = vec![0i64; rows * max_len];
        let mut token_type_ids = vec![0i64; rows * max_len];

        for (i, enc) in encodings.iter().enumerate() {
            let ids = enc.get_ids();
            let types = enc.get_type_ids();
            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = 1;
                token_type_ids[i * max_len + j] = types.get(j).copied().unwrap_or(0) as i64;
            }
        }

        let ids_t: Tensor = ndarray::Array2::from_shape_vec((rows, max_len), input_ids)
            .map_err(|e| anyhow!("Input ids shape: {}", e))?
            .into();
        let mask_t: Tensor = ndarray::Array2::from_shape_vec((rows, max_len), attention_mask)
            .map_err(|e| anyhow!("Attention mask shape: {}", e))?
            .into();
        let types_t: Tensor = ndarray::Array2::from_shape_vec((rows, max_len), token_type_ids)
            .map_err(|e| anyhow!("Token type ids shape: {}", e))?
            .into();

        // BERT exports take token_type_ids as a third input; older ones take two.
        let inputs = if self.model.model().inputs.len() >= 3 {
            tvec!(ids_t.into(), mask_t.into(), types_t.into())
        } else {
            tvec!(ids_t.into(), mask_t.into())
        };
        let result = self.model.run(inputs)?;

        let output = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No output tensor"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| anyhow!("Output to array: {}", e))?;

        // [batch, dims] is a pooled sentence embedding; [batch, seq, dims] needs mean pooling.
        let shape = view.shape().to_vec();
        let mut out = Vec::with_capacity(rows);
        match shape.len() {
            2 => {
                for i in 0..shape[0] {
                    let mut v: Vec<f32> = view.slice(ndarray::s![i, ..]).iter().copied().collect();
                    normalize_l2(&mut v);
                    out.push(v);
                }
            }
            3 => {
                let seq_len = shape[1];
                for (i, enc) in encodings.iter().enumerate() {
                    let valid_len = enc.get_ids().len().min(seq_len).min(max_len);
                    let mut sum = vec![0f32; self.dims];
                    for j in 0..valid_len {
                        for (k, &v) in view.slice(ndarray::s![i, j, ..]).iter().enumerate() {
                            if k < self.dims {
                                sum[k] += v;
                            }
                        }
                    }
                    if valid_len > 0 {
                        for x in &mut sum {
                            *x /= valid_len as f32;
                        }
                    }
                    normalize_l2(&mut sum);
                    out.push(sum);
                }
            }
            _ => bail!("Unexpected output shape: {:?}", shape),
        }
        Ok(out)
    }
}
