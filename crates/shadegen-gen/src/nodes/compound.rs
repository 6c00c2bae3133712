//! Nodes implemented by a node graph, emitted as a function of their own.
//!
//! The body graph is built and finalized once, when the implementation is
//! created. Its input sockets become the function parameters and its
//! output sockets the return value, or the members of a result struct when
//! there are several.
//!
//! On hardware targets a compound producing a closure is emitted once per
//! closure context it takes part in, each variant suffixed and taking the
//! context's extra arguments. Hardware compounds also forward the vertex
//! stage work of their body (geometric streams) to the enclosing shader.

use shadegen_core::{content_hash, ContentHash, Document, NodeDef, NodeGraph, Type};

use crate::context::{ClosureContext, ClosureKind, GenContext};
use crate::error::{GenError, Result};
use crate::generator::{
    emit_function_calls, emit_function_definitions, emit_node_call, emit_output_defaults, input_expression,
    output_declaration, result_members, result_variable, socket_expression,
};
use crate::graph::{build, Classification, ShaderGraph, ShaderNode};
use crate::stage::{Brackets, ShaderStage, PIXEL_STAGE, VERTEX_STAGE};

/// How a compound is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    /// One function, pixel stage only.
    Plain,
    /// Hardware target: forwards vertex work of its body.
    Hw,
    /// Hardware target, closure output: one variant per closure context.
    Closure,
}

#[derive(Debug)]
pub struct CompoundNode {
    name: String,
    function: String,
    graph: ShaderGraph,
    kind: CompoundKind,
    classification: Classification,
    hash: ContentHash,
}

impl CompoundNode {
    /// Build the body of `nodegraph`, the implementation of `nodedef`.
    ///
    /// A graph that instantiates itself, directly or through other
    /// compounds, fails with a cycle.
    pub fn create(doc: &Document, nodegraph: &NodeGraph, nodedef: &NodeDef, ctx: &mut GenContext) -> Result<Self> {
        ctx.begin_implementation(&nodegraph.name)?;
        let built = build::create_compound(doc, nodegraph, nodedef, ctx).and_then(|mut graph| {
            graph.finalize(ctx)?;
            Ok(graph)
        });
        ctx.end_implementation(&nodegraph.name);
        let graph = built?;

        let classification = Classification::from_nodedef(nodedef);
        let kind = if !ctx.target().is_hw() {
            CompoundKind::Plain
        } else if classification.contains(Classification::CLOSURE) {
            CompoundKind::Closure
        } else {
            CompoundKind::Hw
        };
        log::debug!(
            "built compound '{}' ({kind:?}) with {} nodes",
            nodegraph.name,
            graph.node_count()
        );
        Ok(Self {
            name: nodegraph.name.clone(),
            function: ctx.syntax().make_valid_name(&nodegraph.name),
            hash: content_hash(&("compound", &nodegraph.name)),
            graph,
            kind,
            classification,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn kind(&self) -> CompoundKind {
        self.kind
    }

    /// The finalized body graph.
    pub fn graph(&self) -> &ShaderGraph {
        &self.graph
    }

    pub fn emits_in(&self, stage: &str) -> bool {
        if stage == PIXEL_STAGE {
            return true;
        }
        self.kind != CompoundKind::Plain
            && stage == VERTEX_STAGE
            && self.graph.nodes().any(|n| n.implementation.emits_in(VERTEX_STAGE))
    }

    pub fn create_variables(&self, ctx: &GenContext, stages: &mut [ShaderStage]) -> Result<()> {
        for node in self.graph.ordered_nodes() {
            node.implementation.create_variables(node, ctx, stages)?;
        }
        Ok(())
    }

    pub fn is_transparent(&self) -> bool {
        self.graph.nodes().any(|n| n.implementation.is_transparent(n))
    }

    /// Closure kinds this compound has a variant for. Empty when it is
    /// emitted as a single unsuffixed function.
    fn closure_kinds(&self) -> Vec<ClosureKind> {
        if self.kind != CompoundKind::Closure {
            return Vec::new();
        }
        ClosureKind::ALL
            .into_iter()
            .filter(|kind| self.classification.supports_closure(*kind))
            .collect()
    }

    fn result_struct(&self) -> String {
        format!("{}_result", self.function)
    }

    fn return_type(&self, ctx: &GenContext) -> Result<String> {
        match self.graph.output_sockets() {
            [single] => Ok(ctx.syntax().type_name(single.ty)?.to_string()),
            _ => Ok(self.result_struct()),
        }
    }

    pub fn emit_function_definition(&self, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
        if stage.name != PIXEL_STAGE || !stage.claim_function(self.hash) {
            return Ok(());
        }
        emit_function_definitions(&self.graph, ctx, stage)?;

        let syntax = ctx.syntax();
        let outputs = self.graph.output_sockets();
        if outputs.len() > 1 {
            stage.add_line(&format!("struct {}", self.result_struct()), false);
            stage.begin_scope(Brackets::Braces);
            for (output, member) in outputs.iter().zip(result_members(outputs, &syntax)) {
                stage.add_line(&format!("{} {member}", syntax.type_name(output.ty)?), true);
            }
            stage.end_scope(true)?;
            stage.new_line();
        }

        let kinds = self.closure_kinds();
        if kinds.is_empty() {
            return self.emit_variant(None, ctx, stage);
        }
        for kind in kinds {
            ctx.push_closure_context(ClosureContext::new(kind));
            let emitted = self.emit_variant(ctx.closure_context().cloned(), ctx, stage);
            ctx.pop_closure_context();
            emitted?;
        }
        Ok(())
    }

    /// One function: signature, body, and return of the output sockets.
    fn emit_variant(&self, context: Option<ClosureContext>, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
        let syntax = ctx.syntax();
        let mut params = Vec::new();
        let mut function = self.function.clone();
        if let Some(context) = &context {
            function.push_str(&context.suffix);
            for (ty, name) in &context.arguments {
                params.push(format!("{} {name}", syntax.type_name(*ty)?));
            }
        }
        for socket in self.graph.input_sockets() {
            params.push(format!("{} {}", syntax.type_name(socket.ty)?, socket.variable));
        }

        stage.add_line(
            &format!("{} {function}({})", self.return_type(ctx)?, params.join(", ")),
            false,
        );
        stage.begin_scope(Brackets::Braces);
        emit_function_calls(&self.graph, ctx, stage)?;

        let outputs = self.graph.output_sockets();
        if outputs.len() == 1 {
            stage.add_line(&format!("return {}", socket_expression(&self.graph, 0, ctx)?), true);
        } else {
            let result = self.result_struct();
            stage.add_line(&format!("{result} result"), true);
            for (index, member) in result_members(outputs, &syntax).iter().enumerate() {
                let value = socket_expression(&self.graph, index, ctx)?;
                stage.add_line(&format!("result.{member} = {value}"), true);
            }
            stage.add_line("return result", true);
        }
        stage.end_scope(false)?;
        stage.new_line();
        Ok(())
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        if stage.name == VERTEX_STAGE {
            for body in self.graph.ordered_nodes() {
                emit_node_call(&self.graph, body, ctx, stage)?;
            }
            return Ok(());
        }

        let mut function = self.function.clone();
        let mut args = Vec::new();
        if self.kind == CompoundKind::Closure {
            let kinds = self.closure_kinds();
            match ctx.closure_context() {
                Some(context) if kinds.contains(&context.kind) => {
                    function.push_str(&context.suffix);
                    args.extend(context.arguments.iter().map(|(_, name)| name.clone()));
                }
                None if kinds.is_empty() => {}
                _ => return emit_output_defaults(graph, node, ctx, stage),
            }
        }
        for index in 0..node.inputs.len() {
            args.push(input_expression(graph, node, index, ctx)?);
        }
        let call = format!("{function}({})", args.join(", "));

        match result_variable(graph, node, ctx) {
            Some(result) => {
                stage.add_line(&format!("{} {result} = {call}", self.result_struct()), true);
            }
            None if node.outputs.len() == 1 => {
                let decl = output_declaration(graph, node, 0, ctx)?;
                stage.add_line(&format!("{decl} = {call}"), true);
            }
            None => {
                return Err(GenError::InvalidNode {
                    node: node.name.clone(),
                    reason: format!("'{}' has {} outputs but no result variable", self.name, node.outputs.len()),
                })
            }
        }
        Ok(())
    }

    /// Output type of the body when it has a single output.
    pub fn output_type(&self) -> Option<Type> {
        match self.graph.output_sockets() {
            [single] => Some(single.ty),
            _ => None,
        }
    }
}
