//! Type conversion between scalars, colors and vectors.

use shadegen_core::{NodeDef, Semantic, Type};

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::{input_expression, output_declaration};
use crate::graph::{ShaderGraph, ShaderNode};
use crate::stage::ShaderStage;

/// Swizzle letters of a type's components, in order.
pub(crate) fn channel_letters(ty: Type) -> Option<&'static str> {
    match ty {
        Type::Float => Some("r"),
        Type::Color2 => Some("ra"),
        Type::Color3 => Some("rgb"),
        Type::Color4 => Some("rgba"),
        Type::Vector2 => Some("xy"),
        Type::Vector3 => Some("xyz"),
        Type::Vector4 => Some("xyzw"),
        _ => None,
    }
}

fn convertible(ty: Type) -> bool {
    channel_letters(ty).is_some() || matches!(ty, Type::Integer | Type::Boolean)
}

/// Channel pattern turning a value of `from` into `to`: scalars are
/// repeated, wider sources are truncated and narrower ones padded with 0,
/// or 1 for the alpha of a color4.
fn conversion_pattern(from: Type, to: Type) -> Option<String> {
    let src = channel_letters(from)?;
    let size = to.size();
    if from == Type::Float {
        return Some("r".repeat(size));
    }
    let mut pattern: String = src.chars().take(size).collect();
    for index in src.len()..size {
        let one = to.semantic() == Semantic::Color && index == 3;
        pattern.push(if one { '1' } else { '0' });
    }
    Some(pattern)
}

#[derive(Debug)]
pub struct ConvertNode {
    name: String,
    from: Type,
    to: Type,
}

impl ConvertNode {
    pub fn new(name: &str, nodedef: &NodeDef) -> Result<Self> {
        let from = nodedef.input("in").map(|i| i.ty).ok_or_else(|| GenError::InvalidNode {
            node: nodedef.name.clone(),
            reason: "a convert node needs an input named 'in'".into(),
        })?;
        let to = nodedef.output_type();
        if !convertible(from) || channel_letters(to).is_none() {
            return Err(GenError::InvalidNode {
                node: nodedef.name.clone(),
                reason: format!("cannot convert {from} to {to}"),
            });
        }
        Ok(Self {
            name: name.to_string(),
            from,
            to,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let syntax = ctx.syntax();
        let value = input_expression(graph, node, 0, ctx)?;
        let expression = if self.from == self.to {
            value
        } else if matches!(self.from, Type::Integer | Type::Boolean) {
            let cast = format!("{}({value})", syntax.type_name(Type::Float)?);
            if self.to == Type::Float {
                cast
            } else {
                syntax.aggregate_value(self.to, &vec![cast; self.to.size()], false)?
            }
        } else {
            // Both ends have channel letters, checked when created.
            let pattern = conversion_pattern(self.from, self.to).unwrap_or_default();
            syntax.swizzled_variable(&value, self.from, &pattern, self.to)?
        };
        let decl = output_declaration(graph, node, 0, ctx)?;
        stage.add_line(&format!("{decl} = {expression}"), true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::PortDecl;

    fn make_convert(from: Type, to: Type) -> NodeDef {
        NodeDef::new(format!("ND_convert_{from}_{to}"), "convert")
            .with_input(PortDecl::new("in", from))
            .with_output(PortDecl::new("out", to))
    }

    #[test]
    fn patterns_pad_and_truncate() {
        assert_eq!(conversion_pattern(Type::Float, Type::Color3).as_deref(), Some("rrr"));
        assert_eq!(conversion_pattern(Type::Color3, Type::Color4).as_deref(), Some("rgb1"));
        assert_eq!(conversion_pattern(Type::Vector2, Type::Vector4).as_deref(), Some("xy00"));
        assert_eq!(conversion_pattern(Type::Vector4, Type::Color3).as_deref(), Some("xyz"));
        assert_eq!(conversion_pattern(Type::Color3, Type::Float).as_deref(), Some("r"));
    }

    #[test]
    fn closures_and_strings_cannot_be_converted() {
        assert!(ConvertNode::new("convert:x", &make_convert(Type::Bsdf, Type::Color3)).is_err());
        assert!(ConvertNode::new("convert:x", &make_convert(Type::Color3, Type::String)).is_err());
        assert!(ConvertNode::new("convert:x", &make_convert(Type::Float, Type::Integer)).is_err());
        assert!(ConvertNode::new("convert:x", &make_convert(Type::Integer, Type::Float)).is_ok());
    }
}
