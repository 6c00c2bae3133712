//! OSL: one pixel stage holding a `shader` whose parameters are the
//! graph's input sockets and whose `output` parameters are its outputs.

use super::{emit_function_calls, emit_function_definitions, socket_expression};
use crate::context::GenContext;
use crate::error::Result;
use crate::graph::ShaderGraph;
use crate::shader::Shader;
use crate::stage::{block, variable_declaration, Brackets, ShaderStage, PIXEL_STAGE};

use super::hw::MAX_SAMPLE_COUNT;

pub fn generate(name: &str, graph: ShaderGraph, ctx: &mut GenContext) -> Result<Shader> {
    let syntax = ctx.syntax();
    let mut stage = ShaderStage::new(PIXEL_STAGE);
    let uniforms = stage.create_block(block::PUBLIC_UNIFORMS, "");
    for socket in graph.input_sockets() {
        uniforms.add(socket.clone());
    }
    stage.create_block(block::PRIVATE_UNIFORMS, "");
    for node in graph.ordered_nodes() {
        node.implementation
            .create_variables(node, ctx, std::slice::from_mut(&mut stage))?;
    }

    stage.add_line(&format!("#define MX_MAX_SAMPLE_COUNT {MAX_SAMPLE_COUNT}"), false);
    stage.new_line();
    for definition in syntax.type_definitions() {
        stage.add_line(&definition, false);
    }
    stage.new_line();
    emit_function_definitions(&graph, ctx, &mut stage)?;

    let mut params = Vec::new();
    for name in [block::PRIVATE_UNIFORMS, block::PUBLIC_UNIFORMS] {
        for port in stage.block(name)?.iter() {
            params.push(variable_declaration(port, "", &syntax, true)?);
        }
    }
    for socket in graph.output_sockets() {
        params.push(variable_declaration(socket, &syntax.output_qualifier, &syntax, true)?);
    }

    stage.add_line(&format!("shader {}", syntax.make_valid_name(name)), false);
    stage.begin_scope(Brackets::Parentheses);
    let last = params.len().saturating_sub(1);
    for (index, param) in params.iter().enumerate() {
        let separator = if index == last { "" } else { "," };
        stage.add_line(&format!("{param}{separator}"), false);
    }
    stage.end_scope(false)?;
    stage.begin_scope(Brackets::Braces);
    emit_function_calls(&graph, ctx, &mut stage)?;
    for (index, socket) in graph.output_sockets().iter().enumerate() {
        let value = socket_expression(&graph, index, ctx)?;
        stage.add_line(&format!("{} = {value}", socket.variable), true);
    }
    stage.end_scope(false)?;

    log::debug!("emitted OSL shader '{name}' with {} parameters", params.len());
    Ok(Shader::new(name, ctx.target(), vec![stage], false))
}
