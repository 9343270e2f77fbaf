//! The `embedding` tool: wire adapter over [`RetrievalService`].
//!
//! Decodes request inputs, fills omitted ones from config, and turns each
//! service result into its JSON payload. All state (resident model, active
//! index) lives in the wrapped service.

use rag_harness_core::service::RetrievalService;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::traits::{decode_inputs, into_payload, CallError, Tool};

const FUNCTIONS: &[&str] = &["embed_texts", "create_vector_index", "search_similar"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbedInputs {
    texts: Vec<String>,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    cache_folder: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchInputs {
    query: String,
    #[serde(default)]
    top_k: Option<i64>,
}

pub struct EmbeddingTool {
    service: RetrievalService,
    default_model: String,
    default_cache_folder: String,
    default_top_k: i64,
}

impl EmbeddingTool {
    pub fn new(service: RetrievalService, config: &Config) -> Self {
        Self {
            service,
            default_model: config.embedding.default_model.clone(),
            default_cache_folder: config.embedding.cache_folder.clone(),
            default_top_k: config.retrieval.top_k,
        }
    }

    pub fn service(&self) -> &RetrievalService {
        &self.service
    }

    fn model_and_cache(&self, inputs: &EmbedInputs) -> (String, String) {
        (
            inputs
                .model_name
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            inputs
                .cache_folder
                .clone()
                .unwrap_or_else(|| self.default_cache_folder.clone()),
        )
    }

    fn embed_texts(&mut self, inputs: EmbedInputs) -> Value {
        let (model, cache) = self.model_and_cache(&inputs);
        into_payload(
            self.service.embed_texts(&inputs.texts, &model, &cache),
            "Failed to embed texts",
        )
    }

    fn create_vector_index(&mut self, inputs: EmbedInputs) -> Value {
        let (model, cache) = self.model_and_cache(&inputs);
        into_payload(
            self.service.create_vector_index(inputs.texts, &model, &cache),
            "Failed to create vector index",
        )
    }

    fn search_similar(&mut self, inputs: SearchInputs) -> Value {
        let top_k = inputs.top_k.unwrap_or(self.default_top_k);
        into_payload(
            self.service.search_similar(&inputs.query, top_k),
            "Failed to search",
        )
    }
}

impl Tool for EmbeddingTool {
    fn name(&self) -> &str {
        "embedding"
    }

    fn description(&self) -> &str {
        "Embed texts, build an in-memory vector index, and search it by similarity"
    }

    fn functions(&self) -> &[&'static str] {
        FUNCTIONS
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "texts": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of texts to vectorize (embed_texts, create_vector_index)"
                },
                "model_name": {
                    "type": "string",
                    "default": self.default_model,
                    "description": "Model name to use"
                },
                "cache_folder": {
                    "type": "string",
                    "default": self.default_cache_folder,
                    "description": "Model cache folder"
                },
                "query": { "type": "string", "description": "Query text (search_similar)" },
                "top_k": {
                    "type": "integer",
                    "default": self.default_top_k,
                    "description": "Number of results (search_similar)"
                }
            }
        })
    }

    fn call(&mut self, function: &str, inputs: Value) -> Result<Value, CallError> {
        let tool = self.name().to_string();
        match function {
            "embed_texts" => Ok(self.embed_texts(decode_inputs(&tool, function, inputs)?)),
            "create_vector_index" => {
                Ok(self.create_vector_index(decode_inputs(&tool, function, inputs)?))
            }
            "search_similar" => Ok(self.search_similar(decode_inputs(&tool, function, inputs)?)),
            other => Err(CallError::UnknownFunction {
                tool,
                function: other.to_string(),
            }),
        }
    }
}
