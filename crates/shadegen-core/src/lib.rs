//! Core data for the shadegen shader compiler.
//!
//! Holds the closed type registry, typed literal values, and the input
//! document model (node definitions, implementations, node graphs) that
//! shader generation reads from.

pub mod document;
pub mod error;
pub mod hash;
pub mod types;
pub mod value;

pub use document::{
    Document, ElementRef, GeomPropDef, Implementation, ImplementationRef, NodeDef, NodeGraph,
    NodeInstance, PortDecl, UnitDef, UnitTypeDef,
};
pub use error::{DocumentError, Result};
pub use hash::{content_hash, hash_hex, ContentHash};
pub use types::{BaseType, Semantic, Type};
pub use value::{format_float, Value};
