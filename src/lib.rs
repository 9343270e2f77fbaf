//! # RAG Harness
//!
//! A line-delimited JSON backend for retrieval-augmented generation: PDF
//! text extraction and sentence chunking, text embedding, and an in-memory
//! vector index searched by L2 distance.
//!
//! ## Architecture
//!
//! ```text
//! stdin ──▶ Dispatcher ──▶ ToolRegistry ─┬─▶ pdf_parser ──▶ extract + chunk
//!   ▲                                    └─▶ embedding  ──▶ RetrievalService
//!   │                                                         │
//! stdout ◀──────────── {"output": ...} / {"error": ...} ◀─────┘
//! ```
//!
//! The retrieval logic (chunker, embedder, flat index, service state
//! machine) lives in the I/O-free `rag-harness-core` crate. This crate adds
//! the configuration, concrete model loaders, PDF extraction, the tools and
//! the stdio dispatcher.
//!
//! ## Quick Start
//!
//! ```bash
//! rag serve                        # read requests from stdin
//! rag parse paper.pdf              # one-shot parse_pdf
//! rag tools                        # list tools and input schemas
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and validation |
//! | [`logging`] | `tracing` subscriber writing to stderr |
//! | [`embedding`] | Model loaders: local (fastembed/tract), ollama, hash |
//! | [`extract`] | PDF text extraction (`default` / `advanced`) |
//! | [`pdf_tool`] | The `pdf_parser` tool |
//! | [`embedding_tool`] | The `embedding` tool |
//! | [`traits`] | `Tool` trait and `ToolRegistry` |
//! | [`server`] | Request dispatcher and stdio loop |

pub mod config;
pub mod embedding;
pub mod embedding_tool;
pub mod extract;
pub mod logging;
pub mod pdf_tool;
pub mod server;
pub mod traits;
