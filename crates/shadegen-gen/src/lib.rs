//! Shader generation for the shadegen compiler.
//!
//! Turns an element of a node document into target source code through
//! three steps: graph construction (node instances plus color, unit and
//! geometry helper nodes), finalization (interface publishing, naming,
//! topological order, branch scopes, optimization), and emission by the
//! generator of the context's target into one text buffer per stage.

pub mod context;
pub mod error;
pub mod generator;
pub mod graph;
pub mod nodes;
pub mod options;
pub mod shader;
pub mod stage;

pub use context::{ClosureContext, ClosureKind, GenContext, LightBinding, PortKey, SearchPath};
pub use error::{GenError, Result};
pub use generator::{create_graph, generate};
pub use graph::{Classification, GraphKind, ScopeKind, ShaderGraph, ShaderNode, ShaderPort};
pub use nodes::ShaderNodeImpl;
pub use options::{GenOptions, ShaderInterfaceType, SpecularEnvironmentMethod};
pub use shader::{Shader, UniformInfo};
pub use stage::{ShaderStage, VariableBlock, PIXEL_STAGE, VERTEX_STAGE};
