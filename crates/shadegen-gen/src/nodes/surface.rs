//! The `surface` node on hardware targets: the light loop.
//!
//! The BSDF and EDF closures feeding the surface are not emitted in the
//! body of the shader. They are emitted here, once per evaluation
//! direction, each time under the matching closure context.

use shadegen_core::{Type, Value};

use crate::context::{ClosureContext, ClosureKind, GenContext};
use crate::error::{GenError, Result};
use crate::generator::hw::Dialect;
use crate::generator::{emit_node_call, input_expression, output_declaration, output_variable};
use crate::graph::{ShaderGraph, ShaderNode, ShaderPort};
use crate::options::SpecularEnvironmentMethod;
use crate::stage::{block, Brackets, ShaderStage, PIXEL_STAGE, VERTEX_STAGE};

/// Whether a surface node lets light through.
pub fn is_transparent(node: &ShaderNode) -> bool {
    node.input("opacity").is_some_and(|opacity| {
        opacity.is_connected() || opacity.value.as_ref().and_then(Value::as_float).is_some_and(|v| v < 1.0)
    })
}

#[derive(Debug)]
pub struct SurfaceNode {
    name: String,
}

impl SurfaceNode {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_variables(&self, ctx: &GenContext, stages: &mut [ShaderStage]) -> Result<()> {
        for stage in stages.iter_mut() {
            if stage.name == VERTEX_STAGE {
                let inputs = stage.block_mut(block::VERTEX_INPUTS)?;
                inputs.add(ShaderPort::new("i_position", Type::Vector3));
                inputs.add(ShaderPort::new("i_normal", Type::Vector3));
                stage
                    .block_mut(block::PRIVATE_UNIFORMS)?
                    .add(ShaderPort::new("u_worldInverseTransposeMatrix", Type::Matrix44));
            } else if stage.name == PIXEL_STAGE {
                let uniforms = stage.block_mut(block::PRIVATE_UNIFORMS)?;
                uniforms.add(ShaderPort::new("u_viewPosition", Type::Vector3));
                uniforms.add(ShaderPort::new("u_numActiveLightSources", Type::Integer).with_value(Value::Integer(0)));
                if ctx.options.hw_specular_environment_method != SpecularEnvironmentMethod::None {
                    uniforms.add(ShaderPort::new("u_envMatrix", Type::Matrix44));
                    uniforms.add(ShaderPort::new("u_envRadiance", Type::Filename));
                    uniforms.add(ShaderPort::new("u_envRadianceMips", Type::Integer).with_value(Value::Integer(1)));
                    uniforms.add(ShaderPort::new("u_envRadianceSamples", Type::Integer).with_value(Value::Integer(16)));
                    uniforms.add(ShaderPort::new("u_envIrradiance", Type::Filename));
                }
            }
            let data = stage.block_mut(block::VERTEX_DATA)?;
            data.add(ShaderPort::new("positionWorld", Type::Vector3));
            data.add(ShaderPort::new("normalWorld", Type::Vector3));
        }
        Ok(())
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let dialect = Dialect::of(ctx.target()).ok_or_else(|| {
            GenError::generation(format!("surface node '{}' needs a hardware target", node.name))
        })?;
        if stage.name == VERTEX_STAGE {
            self.emit_vertex(dialect, stage)
        } else {
            self.emit_pixel(node, graph, ctx, dialect, stage)
        }
    }

    fn emit_vertex(&self, dialect: Dialect, stage: &mut ShaderStage) -> Result<()> {
        let vertex_data = stage.block(block::VERTEX_DATA)?;
        let position = vertex_data.access("positionWorld")?;
        let normal = vertex_data.access("normalWorld")?;
        if stage.mark_assigned(&position) {
            stage.add_line(&format!("{position} = hPositionWorld.xyz"), true);
        }
        if stage.mark_assigned(&normal) {
            let transformed = dialect.transform("u_worldInverseTransposeMatrix", &dialect.vec4("i_normal", "0.0"));
            stage.add_line(&format!("{normal} = normalize({transformed}.xyz)"), true);
        }
        Ok(())
    }

    fn emit_pixel(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        dialect: Dialect,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let syntax = ctx.syntax();
        let vec3 = syntax.type_name(Type::Vector3)?.to_string();
        let float = syntax.type_name(Type::Float)?.to_string();
        let out = output_variable(graph, node, 0, ctx)?;
        let decl = output_declaration(graph, node, 0, ctx)?;
        stage.add_line(&format!("{decl} = {}", syntax.default_value(Type::SurfaceShader, false)?), true);

        let vertex_data = stage.block(block::VERTEX_DATA)?;
        let position = vertex_data.access("positionWorld")?;
        let normal = vertex_data.access("normalWorld")?;
        let bsdf = node.input_index("bsdf");
        let edf = node.input_index("edf");
        let connected = |index: Option<usize>| index.filter(|&i| node.inputs[i].is_connected());

        stage.begin_scope(Brackets::Braces);
        stage.add_line(&format!("{vec3} N = normalize({normal})"), true);
        stage.add_line(&format!("{vec3} V = normalize(u_viewPosition - {position})"), true);
        stage.add_line(&format!("{vec3} P = {position}"), true);
        let opacity = match node.input_index("opacity") {
            Some(index) => input_expression(graph, node, index, ctx)?,
            None => "1.0".to_string(),
        };
        stage.add_line(&format!("{float} surfaceOpacity = {opacity}"), true);
        stage.add_line(&format!("{float} occlusion = 1.0"), true);
        stage.new_line();

        if let Some(bsdf) = connected(bsdf) {
            stage.add_comment("Light loop");
            stage.add_line("int numLights = numActiveLightSources()", true);
            stage.add_line(&format!("{} lightShader", syntax.type_name(Type::LightShader)?), true);
            stage.add_line(
                "for (int activeLightIndex = 0; activeLightIndex < numLights; ++activeLightIndex)",
                false,
            );
            stage.begin_scope(Brackets::Braces);
            stage.add_line(
                &format!("sampleLightSource(u_lightData[activeLightIndex], {position}, lightShader)"),
                true,
            );
            stage.add_line(&format!("{vec3} L = lightShader.direction"), true);
            stage.new_line();
            stage.add_comment("Calculate the BSDF response for this light source");
            self.emit_closures(node, graph, ClosureKind::Reflection, ctx, stage)?;
            stage.new_line();
            let value = input_expression(graph, node, bsdf, ctx)?;
            stage.add_comment("Accumulate the light's contribution");
            stage.add_line(&format!("{out}.color += lightShader.intensity * {value}"), true);
            stage.end_scope(false)?;
            stage.new_line();

            if ctx.options.hw_specular_environment_method != SpecularEnvironmentMethod::None {
                stage.add_comment("Add environment contribution");
                stage.begin_scope(Brackets::Braces);
                self.emit_closures(node, graph, ClosureKind::Indirect, ctx, stage)?;
                stage.new_line();
                let value = input_expression(graph, node, bsdf, ctx)?;
                stage.add_line(&format!("{out}.color += occlusion * {value}"), true);
                stage.end_scope(false)?;
                stage.new_line();
            }
        }

        if let Some(edf) = connected(edf) {
            stage.add_comment("Add surface emission");
            stage.begin_scope(Brackets::Braces);
            self.emit_closures(node, graph, ClosureKind::Emission, ctx, stage)?;
            let value = input_expression(graph, node, edf, ctx)?;
            stage.add_line(&format!("{out}.color += {value}"), true);
            stage.end_scope(false)?;
            stage.new_line();
        }

        if let Some(bsdf) = connected(bsdf) {
            stage.add_comment("Calculate the BSDF transmission for viewing direction");
            stage.begin_scope(Brackets::Braces);
            self.emit_closures(node, graph, ClosureKind::Transmission, ctx, stage)?;
            let value = input_expression(graph, node, bsdf, ctx)?;
            stage.add_line(&format!("{out}.transparency += {value}"), true);
            stage.end_scope(false)?;
            stage.new_line();
        }

        stage.add_line(&format!("{out}.color *= surfaceOpacity"), true);
        stage.add_line(
            &format!(
                "{out}.transparency = {}({vec3}(1.0), {out}.transparency, surfaceOpacity)",
                dialect.mix()
            ),
            true,
        );
        stage.end_scope(false)?;
        Ok(())
    }

    /// Emit the closures used by the surface in `kind`'s context, in
    /// dependency order.
    fn emit_closures(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        kind: ClosureKind,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        ctx.push_closure_context(ClosureContext::new(kind));
        let result = graph
            .ordered_nodes()
            .filter(|n| node.used_closures.contains(&n.id))
            .try_for_each(|closure| emit_node_call(graph, closure, ctx, stage));
        ctx.pop_closure_context();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests_support::make_node;

    #[test]
    fn transparency_follows_opacity() {
        let mut node = make_node("surface", &["opacity"], Type::Float);
        node.inputs[0].value = Some(Value::Float(1.0));
        assert!(!is_transparent(&node));
        node.inputs[0].value = Some(Value::Float(0.5));
        assert!(is_transparent(&node));
    }
}
