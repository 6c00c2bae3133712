//! Node implementations: how one node category is turned into code.
//!
//! Every node of a graph holds a shared [`ShaderNodeImpl`]. Implementations
//! are created once per generation context and cached under a name, so two
//! nodes with the same nodedef share one function definition.

pub mod combine;
pub mod compound;
pub mod conditional;
pub mod convert;
pub mod convolution;
pub mod geom;
pub mod inline;
pub mod source;
pub mod surface;
pub mod unit;

use std::sync::Arc;

use shadegen_core::{content_hash, ContentHash, Document, ImplementationRef, NodeDef};

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::graph::{Classification, ShaderGraph, ShaderNode};
use crate::stage::ShaderStage;

use combine::CombineNode;
use compound::CompoundNode;
use conditional::ConditionalNode;
use convert::ConvertNode;
use convolution::BlurNode;
use geom::GeomNode;
use inline::InlineNode;
use source::SourceCodeNode;
use surface::SurfaceNode;
use unit::UnitNode;

/// The implementation of a node.
#[derive(Debug)]
pub enum ShaderNodeImpl {
    /// A function loaded from a library source file.
    Source(SourceCodeNode),
    /// An expression template substituted in place.
    Inline(InlineNode),
    /// A node graph emitted as a function of its own.
    Compound(CompoundNode),
    Convert(ConvertNode),
    Combine(CombineNode),
    /// `ifgreater`, `compare`, `switch` and relatives.
    Conditional(ConditionalNode),
    /// Geometric streams on hardware targets.
    Geom(GeomNode),
    /// The surface shader light loop on hardware targets.
    Surface(SurfaceNode),
    Blur(BlurNode),
    /// Unit conversion helper.
    Unit(UnitNode),
}

impl ShaderNodeImpl {
    pub fn name(&self) -> &str {
        match self {
            ShaderNodeImpl::Source(n) => n.name(),
            ShaderNodeImpl::Inline(n) => n.name(),
            ShaderNodeImpl::Compound(n) => n.name(),
            ShaderNodeImpl::Convert(n) => n.name(),
            ShaderNodeImpl::Combine(n) => n.name(),
            ShaderNodeImpl::Conditional(n) => n.name(),
            ShaderNodeImpl::Geom(n) => n.name(),
            ShaderNodeImpl::Surface(n) => n.name(),
            ShaderNodeImpl::Blur(n) => n.name(),
            ShaderNodeImpl::Unit(n) => n.name(),
        }
    }

    /// Name of the emitted function, for implementations that define one.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            ShaderNodeImpl::Source(n) => Some(n.function()),
            ShaderNodeImpl::Compound(n) => Some(n.function()),
            _ => None,
        }
    }

    /// Identity of the emitted function. Implementations with equal hashes
    /// emit their definition once per stage.
    pub fn hash(&self) -> ContentHash {
        match self {
            ShaderNodeImpl::Source(n) => n.hash(),
            ShaderNodeImpl::Compound(n) => n.hash(),
            ShaderNodeImpl::Blur(n) => n.hash(),
            ShaderNodeImpl::Unit(n) => n.hash(),
            other => content_hash(&other.name()),
        }
    }

    /// Whether calls of this implementation are emitted into `stage`.
    pub fn emits_in(&self, stage: &str) -> bool {
        match self {
            ShaderNodeImpl::Geom(_) | ShaderNodeImpl::Surface(_) => true,
            ShaderNodeImpl::Compound(n) => n.emits_in(stage),
            _ => stage == crate::stage::PIXEL_STAGE,
        }
    }

    /// Register the stage variables (vertex inputs, uniforms, constants)
    /// the node needs. Runs once per node before any emission.
    pub fn create_variables(&self, node: &ShaderNode, ctx: &GenContext, stages: &mut [ShaderStage]) -> Result<()> {
        match self {
            ShaderNodeImpl::Geom(n) => n.create_variables(node, ctx, stages),
            ShaderNodeImpl::Surface(n) => n.create_variables(ctx, stages),
            ShaderNodeImpl::Blur(n) => n.create_variables(ctx, stages),
            ShaderNodeImpl::Compound(n) => n.create_variables(ctx, stages),
            _ => Ok(()),
        }
    }

    pub fn emit_function_definition(&self, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
        match self {
            ShaderNodeImpl::Source(n) => n.emit_function_definition(ctx, stage),
            ShaderNodeImpl::Compound(n) => n.emit_function_definition(ctx, stage),
            ShaderNodeImpl::Blur(n) => n.emit_function_definition(ctx, stage),
            ShaderNodeImpl::Unit(n) => n.emit_function_definition(ctx, stage),
            _ => Ok(()),
        }
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        match self {
            ShaderNodeImpl::Source(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Inline(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Compound(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Convert(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Combine(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Conditional(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Geom(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Surface(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Blur(n) => n.emit_function_call(node, graph, ctx, stage),
            ShaderNodeImpl::Unit(n) => n.emit_function_call(node, graph, ctx, stage),
        }
    }

    /// Whether the node makes its surface partially transparent.
    pub fn is_transparent(&self, node: &ShaderNode) -> bool {
        match self {
            ShaderNodeImpl::Surface(_) => surface::is_transparent(node),
            ShaderNodeImpl::Compound(n) => n.is_transparent(),
            _ => false,
        }
    }

    /// Whether calls return a struct of outputs read through a result
    /// variable, rather than writing one variable per output.
    pub fn returns_struct(&self, output_count: usize, ctx: &GenContext) -> bool {
        match self {
            ShaderNodeImpl::Compound(_) => output_count > 1,
            ShaderNodeImpl::Source(_) => {
                output_count > 1 && ctx.syntax().call_style == shadegen_syntax::CallStyle::ReturnValue
            }
            _ => false,
        }
    }
}

/// Nodes implemented in code rather than by a library implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltIn {
    Convert,
    Combine,
    Conditional,
    Geom,
    Surface,
    Blur,
}

impl BuiltIn {
    fn tag(self) -> &'static str {
        match self {
            BuiltIn::Convert => "convert",
            BuiltIn::Combine => "combine",
            BuiltIn::Conditional => "conditional",
            BuiltIn::Geom => "geom",
            BuiltIn::Surface => "surface",
            BuiltIn::Blur => "blur",
        }
    }

    fn detect(nodedef: &NodeDef, ctx: &GenContext) -> Option<BuiltIn> {
        let class = Classification::from_nodedef(nodedef);
        let hw = ctx.target().is_hw();
        match nodedef.node.as_str() {
            "convert" => Some(BuiltIn::Convert),
            "combine2" | "combine3" | "combine4" => Some(BuiltIn::Combine),
            _ if class.contains(Classification::CONDITIONAL) => Some(BuiltIn::Conditional),
            category if hw && geom::CATEGORIES.contains(&category) => Some(BuiltIn::Geom),
            "surface" if hw => Some(BuiltIn::Surface),
            "blur" if class.contains(Classification::CONVOLUTION2D) => Some(BuiltIn::Blur),
            _ => None,
        }
    }
}

/// Find or create the implementation of `nodedef` for the context's
/// target. `node` names the instance asking, for error messages.
pub fn create_implementation(
    doc: &Document,
    nodedef: &NodeDef,
    node: &str,
    ctx: &mut GenContext,
) -> Result<Arc<ShaderNodeImpl>> {
    let target = ctx.target().target_name();
    let found = doc.implementation_for(nodedef, target);

    if let Some(builtin) = BuiltIn::detect(nodedef, ctx) {
        let key = format!("{}:{}", builtin.tag(), nodedef.name);
        if let Some(cached) = ctx.find_implementation(&key) {
            return Ok(cached);
        }
        let implementation = match builtin {
            BuiltIn::Convert => ShaderNodeImpl::Convert(ConvertNode::new(&key, nodedef)?),
            BuiltIn::Combine => ShaderNodeImpl::Combine(CombineNode::new(&key, nodedef)?),
            BuiltIn::Conditional => ShaderNodeImpl::Conditional(ConditionalNode::new(&key, nodedef)?),
            BuiltIn::Geom => ShaderNodeImpl::Geom(GeomNode::new(&key, nodedef)?),
            BuiltIn::Surface => ShaderNodeImpl::Surface(SurfaceNode::new(&key)),
            BuiltIn::Blur => {
                let support = match found {
                    Some(ImplementationRef::Source(imp)) => Some(imp),
                    _ => None,
                };
                ShaderNodeImpl::Blur(BlurNode::new(&key, support, ctx)?)
            }
        };
        log::debug!("created built-in implementation '{key}' for node '{node}'");
        return Ok(ctx.add_implementation(&key, Arc::new(implementation)));
    }

    let found = found.ok_or_else(|| GenError::ImplementationNotFound {
        node: node.to_string(),
        nodedef: nodedef.name.clone(),
        target: target.to_string(),
    })?;
    let key = found.name().to_string();
    if let Some(cached) = ctx.find_implementation(&key) {
        return Ok(cached);
    }

    let implementation = match found {
        ImplementationRef::Source(imp) => match (&imp.sourcecode, &imp.file) {
            (Some(code), _) => ShaderNodeImpl::Inline(InlineNode::parse(&imp.name, code, nodedef)?),
            (None, Some(_)) => ShaderNodeImpl::Source(SourceCodeNode::load(imp, ctx)?),
            (None, None) => {
                return Err(GenError::InvalidNode {
                    node: node.to_string(),
                    reason: format!("implementation '{}' has neither a file nor source code", imp.name),
                })
            }
        },
        ImplementationRef::Graph(nodegraph) => {
            ShaderNodeImpl::Compound(CompoundNode::create(doc, nodegraph, nodedef, ctx)?)
        }
    };
    log::debug!("created implementation '{key}' for node '{node}'");
    Ok(ctx.add_implementation(&key, Arc::new(implementation)))
}
