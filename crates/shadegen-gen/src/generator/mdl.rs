//! MDL: one module exporting the graph as a material or a function.

use shadegen_core::Type;

use super::{emit_function_calls, emit_function_definitions, socket_expression};
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::graph::ShaderGraph;
use crate::shader::Shader;
use crate::stage::{block, variable_declaration, Brackets, ShaderStage, PIXEL_STAGE};

const VERSION: &str = "1.6";

const IMPORTS: &[&str] = &["::df::*", "::base::*", "::math::*", "::state::*", "::anno::*", "::tex::*"];

fn is_material(ty: Type) -> bool {
    matches!(ty, Type::SurfaceShader | Type::Material | Type::VolumeShader)
}

pub fn generate(name: &str, graph: ShaderGraph, ctx: &mut GenContext) -> Result<Shader> {
    let [output] = graph.output_sockets() else {
        return Err(GenError::generation(format!(
            "'{name}' has {} outputs; MDL modules export a single output",
            graph.output_sockets().len()
        )));
    };
    let syntax = ctx.syntax();
    let mut stage = ShaderStage::new(PIXEL_STAGE);
    let uniforms = stage.create_block(block::PUBLIC_UNIFORMS, "");
    for socket in graph.input_sockets() {
        uniforms.add(socket.clone());
    }

    stage.add_line(&format!("mdl {VERSION}"), true);
    stage.new_line();
    for import in IMPORTS {
        stage.add_line(&format!("import {import}"), true);
    }
    stage.new_line();
    for definition in syntax.type_definitions() {
        stage.add_line(&definition, false);
    }
    stage.new_line();
    emit_function_definitions(&graph, ctx, &mut stage)?;

    let mut params = Vec::new();
    for port in stage.block(block::PUBLIC_UNIFORMS)?.iter() {
        params.push(variable_declaration(port, "", &syntax, true)?);
    }
    let function = syntax.make_valid_name(name);
    let signature = format!("{function}({})", params.join(", "));
    let result = socket_expression(&graph, 0, ctx)?;

    if is_material(output.ty) {
        if graph.node_count() == 0 {
            stage.add_line(&format!("export material {signature} = {result}"), true);
        } else {
            stage.add_line(&format!("export material {signature}"), false);
            stage.add_line("= let", false);
            stage.begin_scope(Brackets::Braces);
            emit_function_calls(&graph, ctx, &mut stage)?;
            stage.end_scope(false)?;
            stage.add_line(&format!("in {result}"), true);
        }
    } else {
        stage.add_line(
            &format!("export {} {signature}", syntax.type_name(output.ty)?),
            false,
        );
        stage.begin_scope(Brackets::Braces);
        emit_function_calls(&graph, ctx, &mut stage)?;
        stage.add_line(&format!("return {result}"), true);
        stage.end_scope(false)?;
    }

    log::debug!("emitted MDL module '{function}'");
    Ok(Shader::new(name, ctx.target(), vec![stage], false))
}
