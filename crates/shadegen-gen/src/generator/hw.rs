//! The hardware pipeline shared by GLSL and Slang.
//!
//! Both targets emit a vertex and a pixel stage. The vertex stage
//! transforms the position and fills the vertex data block the pixel stage
//! reads; the pixel stage holds the node functions, the light functions
//! when a surface is shaded, and the main function that evaluates the graph
//! and writes one `vec4` per output.

use std::sync::Arc;

use shadegen_core::{NodeDef, Type};
use shadegen_syntax::{Syntax, Target};

use super::{emit_function_calls, emit_function_definitions, emit_node_call, socket_expression};
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::graph::{ShaderGraph, ShaderPort};
use crate::nodes::ShaderNodeImpl;
use crate::shader::Shader;
use crate::stage::{block, Brackets, ShaderStage, PIXEL_STAGE, VERTEX_STAGE};

/// Largest number of samples a convolution node takes.
pub const MAX_SAMPLE_COUNT: usize = 49;

/// Spelling differences between the hardware languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Glsl,
    Slang,
}

impl Dialect {
    pub fn of(target: Target) -> Option<Dialect> {
        match target {
            Target::Glsl => Some(Dialect::Glsl),
            Target::Slang => Some(Dialect::Slang),
            Target::Osl | Target::Mdl => None,
        }
    }

    /// Matrix times vector.
    pub fn transform(self, matrix: &str, vector: &str) -> String {
        match self {
            Dialect::Glsl => format!("({matrix} * {vector})"),
            Dialect::Slang => format!("mul({matrix}, {vector})"),
        }
    }

    pub fn vec4(self, xyz: &str, w: &str) -> String {
        match self {
            Dialect::Glsl => format!("vec4({xyz}, {w})"),
            Dialect::Slang => format!("float4({xyz}, {w})"),
        }
    }

    /// Linear interpolation function.
    pub fn mix(self) -> &'static str {
        match self {
            Dialect::Glsl => "mix",
            Dialect::Slang => "lerp",
        }
    }

    fn saturate(self, value: &str) -> String {
        match self {
            Dialect::Glsl => format!("clamp({value}, 0.0, 1.0)"),
            Dialect::Slang => format!("saturate({value})"),
        }
    }

    /// `value` of type `ty` widened to a four component color.
    fn to_vec4(self, ty: Type, value: &str, transparency: bool) -> String {
        let vec = |args: &str| match self {
            Dialect::Glsl => format!("vec4({args})"),
            Dialect::Slang => format!("float4({args})"),
        };
        match ty {
            Type::Float => vec(&format!("{value}, {value}, {value}, 1.0")),
            Type::Integer | Type::Boolean => {
                let scalar = format!("float({value})");
                vec(&format!("{scalar}, {scalar}, {scalar}, 1.0"))
            }
            Type::Color2 | Type::Vector2 => vec(&format!("{value}, 0.0, 1.0")),
            Type::Color3 | Type::Vector3 | Type::Bsdf | Type::Edf => vec(&format!("{value}, 1.0")),
            Type::Color4 | Type::Vector4 => value.to_string(),
            Type::SurfaceShader | Type::Material if transparency => {
                let third = match self {
                    Dialect::Glsl => "vec3(0.3333)",
                    Dialect::Slang => "float3(0.3333)",
                };
                let alpha = self.saturate(&format!("1.0 - dot({value}.transparency, {third})"));
                vec(&format!("{value}.color, {alpha}"))
            }
            Type::SurfaceShader | Type::Material => vec(&format!("{value}.color, 1.0")),
            _ => vec("0.0, 0.0, 0.0, 1.0"),
        }
    }

    fn stage_function(self, stage: &str) -> &'static str {
        match (self, stage) {
            (Dialect::Glsl, _) => "main",
            (Dialect::Slang, VERTEX_STAGE) => "vertexMain",
            (Dialect::Slang, _) => "fragmentMain",
        }
    }
}

/// Vertex input semantic for Slang entry point parameters:
/// `i_texcoord_0` is `TEXCOORD0`.
fn semantic(input: &str) -> String {
    input.trim_start_matches("i_").replace('_', "").to_uppercase()
}

/// Whether shading of a surface, and so the light functions, is needed.
fn uses_lighting(graph: &ShaderGraph) -> bool {
    graph.nodes().any(|node| match node.implementation.as_ref() {
        ShaderNodeImpl::Surface(_) => true,
        ShaderNodeImpl::Compound(compound) => uses_lighting(compound.graph()),
        _ => false,
    })
}

fn create_stages(graph: &ShaderGraph, dialect: Dialect, lighting: bool, ctx: &GenContext) -> Vec<ShaderStage> {
    let mut vertex = ShaderStage::new(VERTEX_STAGE);
    vertex.function_name = dialect.stage_function(VERTEX_STAGE).to_string();
    vertex
        .create_block(block::VERTEX_INPUTS, "")
        .add(ShaderPort::new("i_position", Type::Vector3));
    let uniforms = vertex.create_block(block::PRIVATE_UNIFORMS, "");
    uniforms.add(ShaderPort::new("u_worldMatrix", Type::Matrix44));
    uniforms.add(ShaderPort::new("u_viewProjectionMatrix", Type::Matrix44));
    vertex.create_block(block::PUBLIC_UNIFORMS, "");
    vertex.create_block(block::VERTEX_DATA, "vd");

    let mut pixel = ShaderStage::new(PIXEL_STAGE);
    pixel.function_name = dialect.stage_function(PIXEL_STAGE).to_string();
    pixel.create_block(block::PRIVATE_UNIFORMS, "");
    let public = pixel.create_block(block::PUBLIC_UNIFORMS, "");
    for socket in graph.input_sockets() {
        public.add(socket.clone());
    }
    pixel.create_block(block::CONSTANTS, "");
    pixel.create_block(block::VERTEX_DATA, "vd");
    let outputs = pixel.create_block(block::PIXEL_OUTPUTS, "");
    for socket in graph.output_sockets() {
        outputs.add(ShaderPort::new(&socket.name, Type::Color4).with_variable(&socket.variable));
    }

    let lights = pixel.create_block(block::LIGHT_DATA, "");
    if lighting {
        lights.add(ShaderPort::new("type", Type::Integer));
        for binding in ctx.light_shaders() {
            for input in &binding.nodedef.inputs {
                lights.add(ShaderPort::new(&input.name, input.ty));
            }
        }
    }
    vec![vertex, pixel]
}

/// Generate the vertex and pixel stages of a finalized graph.
pub fn generate(name: &str, graph: ShaderGraph, ctx: &mut GenContext) -> Result<Shader> {
    let dialect = Dialect::of(ctx.target()).ok_or_else(|| {
        GenError::generation(format!("{} is not a hardware target", ctx.target()))
    })?;
    let lighting = uses_lighting(&graph);
    let mut stages = create_stages(&graph, dialect, lighting, ctx);
    for node in graph.ordered_nodes() {
        node.implementation.create_variables(node, ctx, &mut stages)?;
    }

    let transparency = ctx.options.hw_transparency || graph.nodes().any(|n| n.implementation.is_transparent(n));
    if let [vertex, pixel] = stages.as_mut_slice() {
        emit_vertex_stage(&graph, dialect, ctx, vertex)?;
        emit_pixel_stage(&graph, dialect, lighting, transparency, ctx, pixel)?;
    }
    log::debug!("emitted {} stages for '{name}'", stages.len());
    Ok(Shader::new(name, ctx.target(), stages, transparency))
}

fn emit_version(dialect: Dialect, stage: &mut ShaderStage) {
    if dialect == Dialect::Glsl {
        stage.add_line("#version 400", false);
        stage.new_line();
    }
}

fn emit_uniforms(dialect: Dialect, syntax: &Syntax, stage: &mut ShaderStage) -> Result<()> {
    for name in [block::PRIVATE_UNIFORMS, block::PUBLIC_UNIFORMS] {
        if stage.block(name)?.is_empty() {
            continue;
        }
        stage.add_comment(&format!("Uniform block: {name}"));
        // Slang uniforms are set by the application, not initialized.
        stage.declare_variables(name, &syntax.uniform_qualifier, syntax, dialect == Dialect::Glsl)?;
        stage.new_line();
    }
    Ok(())
}

fn emit_vertex_data(dialect: Dialect, syntax: &Syntax, qualifier: &str, stage: &mut ShaderStage) -> Result<()> {
    match dialect {
        Dialect::Glsl => {
            if stage.block(block::VERTEX_DATA)?.is_empty() {
                return Ok(());
            }
            stage.add_line(&format!("{qualifier} VertexData"), false);
            stage.begin_scope(Brackets::Braces);
            stage.declare_variables(block::VERTEX_DATA, "", syntax, false)?;
            stage.end_scope(false)?;
            stage.add_line("vd", true);
        }
        Dialect::Slang => {
            stage.add_line("struct VertexData", false);
            stage.begin_scope(Brackets::Braces);
            stage.add_line("float4 hPositionClip : SV_Position", true);
            stage.declare_variables(block::VERTEX_DATA, "", syntax, false)?;
            stage.end_scope(true)?;
        }
    }
    stage.new_line();
    Ok(())
}

fn emit_vertex_stage(graph: &ShaderGraph, dialect: Dialect, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
    let syntax = ctx.syntax();
    emit_version(dialect, stage);
    emit_uniforms(dialect, &syntax, stage)?;

    let inputs: Vec<ShaderPort> = stage.block(block::VERTEX_INPUTS)?.iter().cloned().collect();
    match dialect {
        Dialect::Glsl => {
            stage.add_comment(&format!("Inputs block: {}", block::VERTEX_INPUTS));
            stage.declare_variables(block::VERTEX_INPUTS, "in", &syntax, false)?;
            stage.new_line();
            emit_vertex_data(dialect, &syntax, "out", stage)?;
            let main = format!("void {}()", stage.function_name);
            stage.add_line(&main, false);
        }
        Dialect::Slang => {
            emit_vertex_data(dialect, &syntax, "", stage)?;
            let mut params = Vec::with_capacity(inputs.len());
            for input in &inputs {
                params.push(format!(
                    "{} {} : {}",
                    syntax.type_name(input.ty)?,
                    input.variable,
                    semantic(&input.name)
                ));
            }
            stage.add_line("[shader(\"vertex\")]", false);
            let main = format!("VertexData {}({})", stage.function_name, params.join(", "));
            stage.add_line(&main, false);
        }
    }

    stage.begin_scope(Brackets::Braces);
    let vec4 = syntax.type_name(Type::Vector4)?;
    if dialect == Dialect::Slang {
        stage.add_line("VertexData vd", true);
    }
    let world = dialect.transform("u_worldMatrix", &dialect.vec4("i_position", "1.0"));
    stage.add_line(&format!("{vec4} hPositionWorld = {world}"), true);
    let clip = dialect.transform("u_viewProjectionMatrix", "hPositionWorld");
    match dialect {
        Dialect::Glsl => stage.add_line(&format!("gl_Position = {clip}"), true),
        Dialect::Slang => stage.add_line(&format!("vd.hPositionClip = {clip}"), true),
    }
    for node in graph.ordered_nodes() {
        emit_node_call(graph, node, ctx, stage)?;
    }
    if dialect == Dialect::Slang {
        stage.add_line("return vd", true);
    }
    stage.end_scope(false)?;
    Ok(())
}

fn emit_defines(ctx: &GenContext, stage: &mut ShaderStage) {
    stage.add_line(
        &format!("#define MAX_LIGHT_SOURCES {}", ctx.options.hw_max_active_light_sources),
        false,
    );
    stage.add_line(&format!("#define MX_MAX_SAMPLE_COUNT {MAX_SAMPLE_COUNT}"), false);
    stage.add_line(
        &format!(
            "#define {} 1",
            ctx.options.hw_specular_environment_method.define_name()
        ),
        false,
    );
    stage.new_line();
}

fn emit_light_data(syntax: &Syntax, stage: &mut ShaderStage) -> Result<()> {
    stage.add_line("struct LightData", false);
    stage.begin_scope(Brackets::Braces);
    stage.declare_variables(block::LIGHT_DATA, "", syntax, false)?;
    stage.end_scope(true)?;
    stage.new_line();
    let array = syntax.array_variable("LightData", "u_lightData", "MAX_LIGHT_SOURCES");
    stage.add_line(&format!("{} {array}", syntax.uniform_qualifier), true);
    stage.new_line();
    Ok(())
}

/// Bound light shaders: (type id, implementation, nodedef).
fn bound_lights(ctx: &GenContext) -> Vec<(u32, Arc<ShaderNodeImpl>, NodeDef)> {
    ctx.light_shaders()
        .map(|b| (b.type_id, Arc::clone(&b.implementation), b.nodedef.clone()))
        .collect()
}

/// `numActiveLightSources()` and `sampleLightSource()`, dispatching on the
/// light type to the bound light shaders.
fn emit_light_functions(ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
    let syntax = ctx.syntax();
    let lights = bound_lights(ctx);
    for (_, implementation, _) in &lights {
        implementation.emit_function_definition(ctx, stage)?;
    }

    stage.add_line("int numActiveLightSources()", false);
    stage.begin_scope(Brackets::Braces);
    stage.add_line("return min(u_numActiveLightSources, MAX_LIGHT_SOURCES)", true);
    stage.end_scope(false)?;
    stage.new_line();

    let vec3 = syntax.type_name(Type::Vector3)?;
    let zero = syntax.default_value(Type::Vector3, false)?;
    stage.add_line(
        &format!(
            "void sampleLightSource(LightData light, {vec3} position, out {} result)",
            syntax.type_name(Type::LightShader)?
        ),
        false,
    );
    stage.begin_scope(Brackets::Braces);
    stage.add_line(&format!("result.intensity = {zero}"), true);
    stage.add_line(&format!("result.direction = {zero}"), true);
    for (position, (type_id, implementation, nodedef)) in lights.iter().enumerate() {
        let function = implementation.function_name().ok_or_else(|| GenError::InvalidNode {
            node: nodedef.name.clone(),
            reason: "a light shader must be implemented by a function".into(),
        })?;
        let keyword = if position == 0 { "if" } else { "else if" };
        stage.add_line(&format!("{keyword} (light.type == {type_id})"), false);
        stage.begin_scope(Brackets::Braces);
        stage.add_line(&format!("{function}(light, position, result)"), true);
        stage.end_scope(false)?;
    }
    stage.end_scope(false)?;
    stage.new_line();
    Ok(())
}

fn emit_pixel_stage(
    graph: &ShaderGraph,
    dialect: Dialect,
    lighting: bool,
    transparency: bool,
    ctx: &mut GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    let syntax = ctx.syntax();
    emit_version(dialect, stage);
    emit_defines(ctx, stage);
    for definition in syntax.type_definitions() {
        stage.add_line(&definition, false);
    }
    stage.new_line();

    emit_uniforms(dialect, &syntax, stage)?;
    if lighting {
        emit_light_data(&syntax, stage)?;
    }
    emit_vertex_data(dialect, &syntax, "in", stage)?;

    let outputs: Vec<ShaderPort> = stage.block(block::PIXEL_OUTPUTS)?.iter().cloned().collect();
    let single = outputs.len() == 1;
    match dialect {
        Dialect::Glsl => {
            stage.add_comment("Pixel shader outputs");
            stage.declare_variables(block::PIXEL_OUTPUTS, &syntax.output_qualifier, &syntax, false)?;
            stage.new_line();
        }
        Dialect::Slang if !single => {
            stage.add_line("struct PixelOutputs", false);
            stage.begin_scope(Brackets::Braces);
            for (index, output) in outputs.iter().enumerate() {
                stage.add_line(&format!("float4 {} : SV_Target{index}", output.variable), true);
            }
            stage.end_scope(true)?;
            stage.new_line();
        }
        Dialect::Slang => {}
    }

    if !stage.block(block::CONSTANTS)?.is_empty() {
        stage.declare_variables(block::CONSTANTS, &syntax.constant_qualifier, &syntax, true)?;
        stage.new_line();
    }

    emit_function_definitions(graph, ctx, stage)?;
    if lighting {
        emit_light_functions(ctx, stage)?;
    }

    match dialect {
        Dialect::Glsl => {
            let main = format!("void {}()", stage.function_name);
            stage.add_line(&main, false);
        }
        Dialect::Slang => {
            let returned = if single { "float4" } else { "PixelOutputs" };
            let semantic = if single { " : SV_Target" } else { "" };
            let main = format!("{returned} {}(VertexData vd){semantic}", stage.function_name);
            stage.add_line("[shader(\"fragment\")]", false);
            stage.add_line(&main, false);
        }
    }
    stage.begin_scope(Brackets::Braces);
    emit_function_calls(graph, ctx, stage)?;
    stage.new_line();

    if dialect == Dialect::Slang && !single {
        stage.add_line("PixelOutputs result", true);
    }
    for (index, (socket, output)) in graph.output_sockets().iter().zip(&outputs).enumerate() {
        let value = dialect.to_vec4(socket.ty, &socket_expression(graph, index, ctx)?, transparency);
        match dialect {
            Dialect::Glsl => stage.add_line(&format!("{} = {value}", output.variable), true),
            Dialect::Slang if single => stage.add_line(&format!("return {value}"), true),
            Dialect::Slang => stage.add_line(&format!("result.{} = {value}", output.variable), true),
        }
    }
    if dialect == Dialect::Slang && !single {
        stage.add_line("return result", true);
    }
    stage.end_scope(false)?;
    Ok(())
}
