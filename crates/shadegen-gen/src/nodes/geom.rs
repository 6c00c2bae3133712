//! Geometric streams on hardware targets.
//!
//! A geometry node reads a vertex attribute in the vertex stage, passes it
//! to the pixel stage through the vertex data block, and reads it back
//! there. The vertex assignment is emitted once per stream however many
//! nodes read it.

use shadegen_core::{NodeDef, Type, Value};

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::hw::Dialect;
use crate::generator::output_declaration;
use crate::graph::{ShaderGraph, ShaderNode, ShaderPort};
use crate::stage::{block, ShaderStage, PIXEL_STAGE, VERTEX_STAGE};

/// Node categories implemented here on hardware targets.
pub const CATEGORIES: &[&str] = &["position", "normal", "tangent", "texcoord", "geomcolor"];

/// One attribute stream from vertex input to pixel read.
#[derive(Debug, Clone, PartialEq)]
struct Stream {
    /// Member of the vertex data block.
    data: String,
    ty: Type,
    vertex_input: Option<String>,
    /// Value assigned in the vertex stage.
    assignment: String,
    uniforms: Vec<&'static str>,
    normalize: bool,
}

#[derive(Debug)]
pub struct GeomNode {
    name: String,
    category: String,
    ty: Type,
}

impl GeomNode {
    pub fn new(name: &str, nodedef: &NodeDef) -> Result<Self> {
        let ty = nodedef.output_type();
        if !matches!(ty, Type::Vector2 | Type::Vector3 | Type::Vector4 | Type::Color3 | Type::Color4) {
            return Err(GenError::InvalidNode {
                node: nodedef.name.clone(),
                reason: format!("geometric streams of type {ty} are not supported"),
            });
        }
        Ok(Self {
            name: name.to_string(),
            category: nodedef.node.clone(),
            ty,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self, node: &ShaderNode, dialect: Dialect) -> Stream {
        // Read from the port value even when the input is published.
        let world = node.input("space").and_then(ShaderPort::string_value) == Some("world");
        let index = node
            .input("index")
            .and_then(|p| p.value.as_ref())
            .and_then(Value::as_integer)
            .unwrap_or(0);
        let vec3 = Type::Vector3;
        let attribute = |name: &str, data: String, ty: Type| Stream {
            data,
            ty,
            vertex_input: Some(name.to_string()),
            assignment: name.to_string(),
            uniforms: Vec::new(),
            normalize: false,
        };
        match (self.category.as_str(), world) {
            ("position", true) => Stream {
                assignment: "hPositionWorld.xyz".to_string(),
                ..attribute("i_position", "positionWorld".into(), vec3)
            },
            ("position", false) => attribute("i_position", "positionObject".into(), vec3),
            ("normal", true) => Stream {
                assignment: format!(
                    "normalize({}.xyz)",
                    dialect.transform("u_worldInverseTransposeMatrix", &dialect.vec4("i_normal", "0.0"))
                ),
                uniforms: vec!["u_worldInverseTransposeMatrix"],
                normalize: true,
                ..attribute("i_normal", "normalWorld".into(), vec3)
            },
            ("normal", false) => Stream {
                normalize: true,
                ..attribute("i_normal", "normalObject".into(), vec3)
            },
            ("tangent", true) => Stream {
                assignment: format!(
                    "normalize({}.xyz)",
                    dialect.transform("u_worldMatrix", &dialect.vec4("i_tangent", "0.0"))
                ),
                uniforms: vec!["u_worldMatrix"],
                normalize: true,
                ..attribute("i_tangent", "tangentWorld".into(), vec3)
            },
            ("tangent", false) => Stream {
                normalize: true,
                ..attribute("i_tangent", "tangentObject".into(), vec3)
            },
            ("geomcolor", _) => attribute(&format!("i_color_{index}"), format!("color_{index}"), self.ty),
            _ => attribute(&format!("i_texcoord_{index}"), format!("texcoord_{index}"), self.ty),
        }
    }

    pub fn create_variables(&self, node: &ShaderNode, ctx: &GenContext, stages: &mut [ShaderStage]) -> Result<()> {
        let Some(dialect) = Dialect::of(ctx.target()) else {
            return Ok(());
        };
        let stream = self.stream(node, dialect);
        for stage in stages.iter_mut() {
            if stage.name == VERTEX_STAGE {
                if let Some(input) = &stream.vertex_input {
                    stage.block_mut(block::VERTEX_INPUTS)?.add(ShaderPort::new(input, stream.ty));
                }
                for uniform in &stream.uniforms {
                    stage
                        .block_mut(block::PRIVATE_UNIFORMS)?
                        .add(ShaderPort::new(*uniform, Type::Matrix44));
                }
            }
            stage.block_mut(block::VERTEX_DATA)?.add(ShaderPort::new(&stream.data, stream.ty));
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
        let Some(dialect) = Dialect::of(ctx.target()) else {
            return Err(GenError::generation(format!(
                "geometry node '{}' needs a hardware target",
                node.name
            )));
        };
        let stream = self.stream(node, dialect);
        let data = stage.block(block::VERTEX_DATA)?.access(&stream.data)?;
        if stage.name == VERTEX_STAGE {
            if stage.mark_assigned(&data) {
                stage.add_line(&format!("{data} = {}", stream.assignment), true);
            }
        } else if stage.name == PIXEL_STAGE {
            let value = if stream.normalize {
                format!("normalize({data})")
            } else {
                data
            };
            let decl = output_declaration(graph, node, 0, ctx)?;
            stage.add_line(&format!("{decl} = {value}"), true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests_support::make_node;
    use shadegen_core::PortDecl;

    fn make_geom(category: &str, ty: Type, input: PortDecl) -> (GeomNode, ShaderNode) {
        let nd = NodeDef::new(format!("ND_{category}_{ty}"), category)
            .with_input(input)
            .with_output(PortDecl::new("out", ty));
        let geom = GeomNode::new(&format!("geom:{}", nd.name), &nd).unwrap();
        let mut node = make_node(category, &[], ty);
        node.inputs = nd
            .inputs
            .iter()
            .map(|d| crate::graph::node::port_from_decl(d, "").unwrap())
            .collect();
        (geom, node)
    }

    #[test]
    fn world_normals_are_transformed_per_dialect() {
        let (geom, node) = make_geom(
            "normal",
            Type::Vector3,
            PortDecl::new("space", Type::String).with_value("world"),
        );
        let glsl = geom.stream(&node, Dialect::Glsl);
        assert_eq!(glsl.data, "normalWorld");
        assert_eq!(
            glsl.assignment,
            "normalize((u_worldInverseTransposeMatrix * vec4(i_normal, 0.0)).xyz)"
        );
        let slang = geom.stream(&node, Dialect::Slang);
        assert_eq!(
            slang.assignment,
            "normalize(mul(u_worldInverseTransposeMatrix, float4(i_normal, 0.0)).xyz)"
        );
    }

    #[test]
    fn texcoord_index_names_the_stream() {
        let (geom, node) = make_geom(
            "texcoord",
            Type::Vector2,
            PortDecl::new("index", Type::Integer).with_value("1"),
        );
        let stream = geom.stream(&node, Dialect::Glsl);
        assert_eq!(stream.data, "texcoord_1");
        assert_eq!(stream.vertex_input.as_deref(), Some("i_texcoord_1"));
        assert_eq!(stream.ty, Type::Vector2);
    }
}
