//! # RAG Harness Core
//!
//! The retrieval pipeline of RAG Harness: sentence chunking, embedding-model
//! lifecycle, exact vector index, and the service that ties them together.
//!
//! ```text
//! raw text ─▶ chunk ─▶ Embedder.encode ─▶ VectorIndex.build
//! query    ─────────▶ Embedder.encode ─▶ VectorIndex.search ─▶ ranked hits
//! ```
//!
//! This crate performs no filesystem or network I/O of its own. Concrete
//! embedding models are plugged in through [`embedding::ModelLoader`];
//! the only model shipped here is the deterministic [`embedding::HashLoader`].

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod service;

pub use error::{ErrorKind, RagError, Result};
