//! Unit conversion helpers.
//!
//! A converter scales its input by the ratio of two units of one unit
//! type. Every converter of a unit type calls the same
//! `mx_<unittype>_unit_ratio` function, which looks both units up in a
//! constant table of scales.

use std::sync::Arc;

use shadegen_core::{content_hash, ContentHash, NodeDef, PortDecl, Type, UnitTypeDef, Value};

use super::ShaderNodeImpl;
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::{input_expression, output_declaration};
use crate::graph::{ShaderGraph, ShaderNode};
use crate::stage::{Brackets, ShaderStage};

/// Value types a converter can scale.
pub const TYPES: &[Type] = &[Type::Float, Type::Vector2, Type::Vector3, Type::Vector4];

#[derive(Debug)]
pub struct UnitNode {
    name: String,
    unittype: String,
    scales: Vec<f32>,
    function: String,
    hash: ContentHash,
}

impl UnitNode {
    pub fn new(name: &str, unittype: &UnitTypeDef) -> Self {
        let function = format!("mx_{}_unit_ratio", unittype.name);
        Self {
            name: name.to_string(),
            unittype: unittype.name.clone(),
            scales: unittype.units.iter().map(|u| u.scale).collect(),
            hash: content_hash(&function),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unittype(&self) -> &str {
        &self.unittype
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn emit_function_definition(&self, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
        if !stage.claim_function(self.hash) {
            return Ok(());
        }
        let syntax = ctx.syntax();
        let float = syntax.type_name(Type::Float)?;
        let int = syntax.type_name(Type::Integer)?;
        let table = syntax.array_variable(float, "scales", &self.scales.len().to_string());
        let values = syntax.value(Type::FloatArray, &Value::FloatArray(self.scales.clone()), false)?;
        let qualifier = if syntax.constant_qualifier.is_empty() {
            String::new()
        } else {
            format!("{} ", syntax.constant_qualifier)
        };

        stage.add_line(&format!("{float} {}({int} unit_from, {int} unit_to)", self.function), false);
        stage.begin_scope(Brackets::Braces);
        stage.add_line(&format!("{qualifier}{table} = {values}"), true);
        stage.add_line("return (scales[unit_from] / scales[unit_to])", true);
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
        let index = |input: &str| {
            node.input_index(input).ok_or_else(|| GenError::InvalidNode {
                node: node.name.clone(),
                reason: format!("a unit converter needs an input named '{input}'"),
            })
        };
        let value = input_expression(graph, node, index("in")?, ctx)?;
        let from = input_expression(graph, node, index("unit_from")?, ctx)?;
        let to = input_expression(graph, node, index("unit_to")?, ctx)?;
        let decl = output_declaration(graph, node, 0, ctx)?;
        stage.add_line(&format!("{decl} = {value} * {}({from}, {to})", self.function), true);
        Ok(())
    }
}

/// Nodedef of a converter for values of type `ty`.
pub fn nodedef(unittype: &UnitTypeDef, ty: Type) -> NodeDef {
    NodeDef::new(format!("ND_{}_unit_{ty}", unittype.name), format!("{}_unit", unittype.name))
        .with_input(PortDecl::new("in", ty))
        .with_input(PortDecl::new("unit_from", Type::Integer).with_value("0"))
        .with_input(PortDecl::new("unit_to", Type::Integer).with_value("0"))
        .with_output(PortDecl::new("out", ty))
}

/// The shared converter implementation for a unit type and value type.
pub fn implementation(ctx: &mut GenContext, unittype: &UnitTypeDef, ty: Type) -> Arc<ShaderNodeImpl> {
    let key = format!("unit:{}:{ty}", unittype.name);
    if let Some(cached) = ctx.find_implementation(&key) {
        return cached;
    }
    log::debug!("created unit converter '{key}'");
    ctx.add_implementation(&key, Arc::new(ShaderNodeImpl::Unit(UnitNode::new(&key, unittype))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::UnitDef;
    use shadegen_syntax::Target;

    fn make_distance() -> UnitTypeDef {
        UnitTypeDef {
            name: "distance".into(),
            units: vec![
                UnitDef {
                    name: "meter".into(),
                    scale: 1.0,
                },
                UnitDef {
                    name: "centimeter".into(),
                    scale: 0.01,
                },
            ],
        }
    }

    #[test]
    fn converters_share_one_definition() {
        let mut ctx = GenContext::new(Target::Glsl);
        let distance = make_distance();
        let float = implementation(&mut ctx, &distance, Type::Float);
        let again = implementation(&mut ctx, &distance, Type::Float);
        let vector = implementation(&mut ctx, &distance, Type::Vector3);
        assert!(Arc::ptr_eq(&float, &again));
        assert!(!Arc::ptr_eq(&float, &vector));
        assert_eq!(float.hash(), vector.hash());

        let mut stage = ShaderStage::new(crate::stage::PIXEL_STAGE);
        float.emit_function_definition(&mut ctx, &mut stage).unwrap();
        vector.emit_function_definition(&mut ctx, &mut stage).unwrap();
        assert_eq!(stage.code().matches("float mx_distance_unit_ratio(int unit_from, int unit_to)").count(), 1);
        assert!(stage.code().contains("const float scales[2] = float[2](1.0, 0.01);"));
    }

    #[test]
    fn nodedef_names_the_value_type() {
        let nd = nodedef(&make_distance(), Type::Vector2);
        assert_eq!(nd.name, "ND_distance_unit_vector2");
        assert_eq!(nd.inputs.len(), 3);
        assert_eq!(nd.output_type(), Type::Vector2);
    }
}
