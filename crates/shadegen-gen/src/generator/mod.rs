//! Shader generators: the per-target drivers and the emission helpers
//! node implementations share.
//!
//! [`generate`] resolves an element, builds and finalizes its graph, and
//! hands it to the generator of the context's target. The helpers below
//! turn ports into expressions and declarations; every node
//! implementation goes through them, so name suffixes, swizzles and
//! result structs are applied in one place.

pub mod hw;
pub mod mdl;
pub mod osl;

use shadegen_core::Document;
use shadegen_syntax::{Syntax, Target, UniqueNames};

use crate::context::{GenContext, PortKey};
use crate::error::{GenError, Result};
use crate::graph::{build, Classification, ShaderGraph, ShaderNode, ShaderPort, Source};
use crate::shader::Shader;
use crate::stage::ShaderStage;

/// Build and finalize the graph of the element at `element`, without
/// emitting it.
pub fn create_graph(doc: &Document, element: &str, name: &str, ctx: &mut GenContext) -> Result<ShaderGraph> {
    let resolved = doc.resolve(element)?;
    let mut graph = build::create(doc, resolved, name, ctx)?;
    graph.finalize(ctx)?;
    Ok(graph)
}

/// Generate a shader named `name` from the element at `element`.
pub fn generate(doc: &Document, element: &str, name: &str, ctx: &mut GenContext) -> Result<Shader> {
    let graph = create_graph(doc, element, name, ctx)?;
    log::debug!(
        "generating '{name}' for {} from {} nodes",
        ctx.target(),
        graph.node_count()
    );
    match ctx.target() {
        Target::Glsl | Target::Slang => hw::generate(name, graph, ctx),
        Target::Osl => osl::generate(name, graph, ctx),
        Target::Mdl => mdl::generate(name, graph, ctx),
    }
}

/// Expression for a value of type `port.ty` read from `source`, with the
/// port's swizzle applied.
fn source_expression(graph: &ShaderGraph, source: Source, port: &ShaderPort, ctx: &GenContext) -> Result<String> {
    let (variable, ty) = match source {
        Source::Node { node, output } => {
            let upstream = graph.node(node)?;
            let ty = upstream
                .outputs
                .get(output)
                .map(|o| o.ty)
                .ok_or_else(|| GenError::UnknownElement {
                    name: graph.source_name(source),
                })?;
            (output_variable(graph, upstream, output, ctx)?, ty)
        }
        Source::Socket(_) => {
            let socket = graph.source_port(source)?;
            (socket.variable.clone(), socket.ty)
        }
    };
    match &port.channels {
        Some(channels) => Ok(ctx.syntax().swizzled_variable(&variable, ty, channels, port.ty)?),
        None => Ok(variable),
    }
}

/// Literal for an unconnected port: its value, else the type's default.
pub fn literal(port: &ShaderPort, syntax: &Syntax) -> Result<String> {
    match &port.value {
        Some(value) => Ok(syntax.value(port.ty, value, false)?),
        None => Ok(syntax.default_value(port.ty, false)?.to_string()),
    }
}

/// Expression for input `index` of `node`: the upstream variable, or the
/// input's literal when unconnected, followed by any registered suffix.
pub fn input_expression(graph: &ShaderGraph, node: &ShaderNode, index: usize, ctx: &GenContext) -> Result<String> {
    let port = node.inputs.get(index).ok_or_else(|| GenError::UnknownElement {
        name: format!("input {index} of '{}'", node.name),
    })?;
    let expression = match port.connection {
        Some(source) => source_expression(graph, source, port, ctx)?,
        None => literal(port, &ctx.syntax())?,
    };
    let key = PortKey {
        graph: graph.id,
        node: node.id,
        port: index,
    };
    Ok(format!("{expression}{}", ctx.input_suffix(key)))
}

/// Expression for output socket `index` of `graph`.
pub fn socket_expression(graph: &ShaderGraph, index: usize, ctx: &GenContext) -> Result<String> {
    let socket = graph
        .output_sockets()
        .get(index)
        .ok_or_else(|| GenError::UnknownElement {
            name: format!("output {index} of '{}'", graph.name),
        })?;
    match socket.connection {
        Some(source) => source_expression(graph, source, socket, ctx),
        None => literal(socket, &ctx.syntax()),
    }
}

/// The local holding a multi-output result, with the node's active suffix.
pub fn result_variable(graph: &ShaderGraph, node: &ShaderNode, ctx: &GenContext) -> Option<String> {
    let result = node.result_variable.as_ref()?;
    let suffix = (0..node.outputs.len())
        .map(|port| {
            ctx.output_suffix(PortKey {
                graph: graph.id,
                node: node.id,
                port,
            })
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    Some(format!("{result}{suffix}"))
}

/// Variable holding output `index` of `node`.
pub fn output_variable(graph: &ShaderGraph, node: &ShaderNode, index: usize, ctx: &GenContext) -> Result<String> {
    let port = node.outputs.get(index).ok_or_else(|| GenError::UnknownElement {
        name: format!("output {index} of '{}'", node.name),
    })?;
    if let Some(result) = result_variable(graph, node, ctx) {
        return Ok(format!("{result}.{}", port.variable));
    }
    let key = PortKey {
        graph: graph.id,
        node: node.id,
        port: index,
    };
    Ok(format!("{}{}", port.variable, ctx.output_suffix(key)))
}

/// `<type> <variable>` for output `index` of `node`.
pub fn output_declaration(graph: &ShaderGraph, node: &ShaderNode, index: usize, ctx: &GenContext) -> Result<String> {
    let ty = node
        .outputs
        .get(index)
        .map(|o| o.ty)
        .ok_or_else(|| GenError::UnknownElement {
            name: format!("output {index} of '{}'", node.name),
        })?;
    let syntax = ctx.syntax();
    Ok(format!(
        "{} {}",
        syntax.type_name(ty)?,
        output_variable(graph, node, index, ctx)?
    ))
}

/// Declare every output of `node` with its type's default value.
pub fn emit_output_defaults(
    graph: &ShaderGraph,
    node: &ShaderNode,
    ctx: &GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    let syntax = ctx.syntax();
    for (index, output) in node.outputs.iter().enumerate() {
        let decl = output_declaration(graph, node, index, ctx)?;
        stage.add_line(&format!("{decl} = {}", syntax.default_value(output.ty, false)?), true);
    }
    Ok(())
}

/// Member names of the result struct returned for `outputs`.
pub fn result_members(outputs: &[ShaderPort], syntax: &Syntax) -> Vec<String> {
    let mut names = UniqueNames::new();
    outputs.iter().map(|o| syntax.make_unique(&o.name, &mut names)).collect()
}

/// Emit the call of one node, if its implementation emits into `stage`.
pub fn emit_node_call(graph: &ShaderGraph, node: &ShaderNode, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
    let implementation = std::sync::Arc::clone(&node.implementation);
    if !implementation.emits_in(&stage.name) {
        return Ok(());
    }
    log::trace!("emitting '{}' ({}) in {}", node.name, implementation.name(), stage.name);
    implementation.emit_function_call(node, graph, ctx, stage)
}

/// Emit the function definitions every node of `graph` needs in `stage`.
pub fn emit_function_definitions(graph: &ShaderGraph, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
    for node in graph.ordered_nodes() {
        let implementation = std::sync::Arc::clone(&node.implementation);
        if implementation.emits_in(&stage.name) {
            implementation.emit_function_definition(ctx, stage)?;
        }
    }
    Ok(())
}

/// Emit the body of `graph` in dependency order.
///
/// Nodes used only inside one conditional branch are left to the
/// conditional. On hardware targets, closures feeding a shader node are
/// left to that node, which evaluates them per closure context.
pub fn emit_function_calls(graph: &ShaderGraph, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
    let hw = ctx.target().is_hw();
    for node in graph.ordered_nodes() {
        if node.referenced_conditionally() {
            if ctx.options.emit_debug_comments {
                let conditional = node
                    .scope
                    .conditional_node
                    .and_then(|id| graph.node(id).ok())
                    .map_or("?", |n| n.name.as_str());
                stage.add_comment(&format!(
                    "Omitted node '{}'. Only used in conditional node '{conditional}'",
                    node.name
                ));
            }
            continue;
        }
        if hw
            && node.has_classification(Classification::CLOSURE)
            && graph.nodes().any(|shader| shader.used_closures.contains(&node.id))
        {
            continue;
        }
        emit_node_call(graph, node, ctx, stage)?;
    }
    Ok(())
}

/// Emit the nodes used only by branch input `branch` of `conditional`.
pub fn emit_branch(
    graph: &ShaderGraph,
    conditional: &ShaderNode,
    branch: usize,
    ctx: &mut GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    for node in graph.ordered_nodes() {
        if node.scope.used_by_branch(conditional.id, branch) {
            emit_node_call(graph, node, ctx, stage)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests_support::make_node;
    use crate::graph::{GraphKind, Sink};
    use shadegen_core::{Type, Value};

    fn make_graph(ctx: &mut GenContext) -> ShaderGraph {
        let mut graph = ShaderGraph::new(ctx.next_graph_id(), "g", GraphKind::Root);
        let a = graph.add_node(make_node("a", &["in"], Type::Color3)).unwrap();
        let b = graph.add_node(make_node("b", &["in"], Type::Float)).unwrap();
        graph.node_mut(a).unwrap().outputs[0].variable = "a_out".into();
        graph.node_mut(a).unwrap().inputs[0].value = Some(Value::Aggregate(vec![0.1, 0.2, 0.3]));
        graph.node_mut(b).unwrap().inputs[0].channels = Some("g".into());
        graph
            .connect(Source::Node { node: a, output: 0 }, Sink::Node { node: b, input: 0 })
            .unwrap();
        graph
    }

    #[test]
    fn inputs_read_literals_and_swizzles() {
        let mut ctx = GenContext::new(Target::Glsl);
        let graph = make_graph(&mut ctx);
        let a = graph.node_by_name("a").unwrap();
        let b = graph.node_by_name("b").unwrap();
        assert_eq!(input_expression(&graph, a, 0, &ctx).unwrap(), "vec3(0.1, 0.2, 0.3)");
        assert_eq!(input_expression(&graph, b, 0, &ctx).unwrap(), "a_out.y");
    }

    #[test]
    fn suffixes_apply_to_both_ends() {
        let mut ctx = GenContext::new(Target::Glsl);
        let graph = make_graph(&mut ctx);
        let a = graph.node_by_name("a").unwrap();
        let key = PortKey {
            graph: graph.id,
            node: a.id,
            port: 0,
        };
        ctx.add_output_suffix(key, "_s1");
        ctx.add_input_suffix(key, " + 1.0");
        assert_eq!(output_declaration(&graph, a, 0, &ctx).unwrap(), "vec3 a_out_s1");
        assert_eq!(input_expression(&graph, a, 0, &ctx).unwrap(), "vec3(0.1, 0.2, 0.3) + 1.0");
        ctx.remove_output_suffix(key);
        assert_eq!(output_variable(&graph, a, 0, &ctx).unwrap(), "a_out");
    }

    #[test]
    fn result_struct_members_are_unique() {
        let syntax = Target::Glsl.syntax();
        let outputs = vec![
            ShaderPort::new("out", Type::Float),
            ShaderPort::new("color", Type::Color3),
        ];
        assert_eq!(result_members(&outputs, &syntax), vec!["out1", "color"]);
    }
}
