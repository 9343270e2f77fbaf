//! Error type shared by every retrieval operation.

use thiserror::Error;

/// Convenience alias used across the core crate.
pub type Result<T> = std::result::Result<T, RagError>;

/// Coarse classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed an invalid argument. Nothing was mutated.
    ContractViolation,
    /// A model, file, or folder could not be used. Resident state is untouched.
    ResourceUnavailable,
    /// The operation needs state that does not exist yet.
    StatePrecondition,
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("no extractable content")]
    NoExtractableContent,

    #[error("model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("embedding generation failed: {0}")]
    Encoding(String),

    #[error("{0}")]
    Resource(String),

    #[error("No index or model available. Please create index first.")]
    NoModel,

    #[error("No index available. Please create index first.")]
    NoIndex,
}

impl RagError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        RagError::InvalidArgument(msg.into())
    }

    pub fn model_unavailable(model: &str, reason: impl std::fmt::Display) -> Self {
        RagError::ModelUnavailable {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::InvalidArgument(_) | RagError::NoExtractableContent => {
                ErrorKind::ContractViolation
            }
            RagError::ModelUnavailable { .. } | RagError::Encoding(_) | RagError::Resource(_) => {
                ErrorKind::ResourceUnavailable
            }
            RagError::NoModel | RagError::NoIndex => ErrorKind::StatePrecondition,
        }
    }
}
