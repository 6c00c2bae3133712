//! Shader generation errors.

use shadegen_core::{DocumentError, Type};
use shadegen_syntax::SyntaxError;
use thiserror::Error;

/// Errors that can occur while building a shader graph or emitting code.
///
/// Every error is fatal to the generation call that raised it; no partial
/// shader is returned.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("options parse error: {0}")]
    Options(#[from] toml::de::Error),

    #[error("Could not find a nodedef named '{nodedef}' used by '{node}'")]
    NodeDefNotFound { node: String, nodedef: String },

    #[error("Could not find an implementation of '{nodedef}' for node '{node}' and target '{target}'")]
    ImplementationNotFound {
        node: String,
        nodedef: String,
        target: String,
    },

    #[error("Can't find source file '{file}' used by implementation '{implementation}'")]
    MissingSourceFile { file: String, implementation: String },

    #[error("Can't find include file '{file}' included from '{from}'")]
    IncludeNotFound { file: String, from: String },

    /// A node was reached again while already on the current traversal path.
    #[error("Found a cycle in the graph: {}", path.join(" -> "))]
    FoundCycle { path: Vec<String> },

    #[error("Could not find an element named '{name}'")]
    UnknownElement { name: String },

    #[error("Type mismatch connecting '{from}' ({from_ty}) to '{to}' ({to_ty})")]
    TypeMismatch {
        from: String,
        from_ty: Type,
        to: String,
        to_ty: Type,
    },

    #[error("Node '{node}' is invalid: {reason}")]
    InvalidNode { node: String, reason: String },

    #[error("Malformed source code in implementation '{implementation}' at byte {position}: {reason}")]
    Template {
        implementation: String,
        position: usize,
        reason: String,
    },

    #[error("End scope called with no scope active")]
    ScopeUnderflow,

    #[error("No variable block named '{block}' in stage '{stage}'")]
    BlockNotFound { block: String, stage: String },

    #[error("No variable named '{variable}' in block '{block}'")]
    VariableNotFound { variable: String, block: String },

    #[error("Port '{port}' already exists on '{owner}'")]
    DuplicatePort { port: String, owner: String },

    #[error("Node '{node}' already exists in graph '{graph}'")]
    DuplicateNode { node: String, graph: String },

    #[error("{message}")]
    Generation { message: String },
}

impl GenError {
    pub fn generation(message: impl Into<String>) -> Self {
        GenError::Generation {
            message: message.into(),
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, GenError::FoundCycle { .. })
    }

    pub fn is_missing_source(&self) -> bool {
        matches!(
            self,
            GenError::MissingSourceFile { .. } | GenError::IncludeNotFound { .. }
        )
    }
}

/// Result type for shader generation.
pub type Result<T> = std::result::Result<T, GenError>;
