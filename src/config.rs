//! TOML configuration.
//!
//! Every field has a default, so the service runs without a config file.
//! Values here are defaults for request inputs; a request that names its own
//! `model_name`, `chunk_size`, `top_k`, etc. overrides them.
//!
//! ```toml
//! [embedding]
//! provider = "local"            # local | hash | ollama
//! default_model = "all-MiniLM-L6-v2"
//! cache_folder = "./models"
//!
//! [chunking]
//! chunk_size = 3
//! parser_type = "advanced"      # default | advanced
//!
//! [retrieval]
//! top_k = 5
//!
//! [logging]
//! level = "info"
//! format = "text"               # text | json
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::extract::ParserKind;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_cache_folder")]
    pub cache_folder: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Base URL of the Ollama server (ollama provider only).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_hash_dims")]
    pub hash_dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            default_model: default_model(),
            cache_folder: default_cache_folder(),
            batch_size: default_batch_size(),
            url: None,
            timeout_secs: default_timeout_secs(),
            hash_dims: default_hash_dims(),
        }
    }
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
fn default_provider() -> String {
    "local".to_string()
}
#[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
fn default_provider() -> String {
    "hash".to_string()
}
fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_cache_folder() -> String {
    "./models".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_hash_dims() -> usize {
    384
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_parser_type")]
    pub parser_type: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            parser_type: default_parser_type(),
        }
    }
}

fn default_chunk_size() -> usize {
    3
}
fn default_parser_type() -> String {
    "advanced".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> i64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        ParserKind::parse(&self.chunking.parser_type)
            .map_err(|e| anyhow::anyhow!("chunking.parser_type: {}", e))?;

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.hash_dims == 0 {
            bail!("embedding.hash_dims must be > 0");
        }
        if self.embedding.default_model.trim().is_empty() {
            bail!("embedding.default_model must not be empty");
        }
        match self.embedding.provider.as_str() {
            "local" | "hash" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, hash, or ollama.",
                other
            ),
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => bail!("Unknown logging format: '{}'. Must be text or json.", other),
        }

        Ok(())
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
