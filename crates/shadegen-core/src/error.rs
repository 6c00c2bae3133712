//! Errors raised while loading or querying a document.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Type;

/// Errors that can occur while loading or querying a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("unsupported document format: {} (expected .json or .toml)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Could not find a nodedef for node '{node}'")]
    NodeDefNotFound { node: String },

    #[error("nodedef '{nodedef}' declares no outputs")]
    NoOutputs { nodedef: String },

    #[error("element '{path}' not found in document")]
    ElementNotFound { path: String },

    #[error("unknown type name '{0}'")]
    UnknownType(String),

    #[error("invalid value '{value}' for type {ty}: {reason}")]
    InvalidValue {
        value: String,
        ty: Type,
        reason: String,
    },
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
