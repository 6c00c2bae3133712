//! `combine2`, `combine3` and `combine4`: build an aggregate from parts.

use shadegen_core::{NodeDef, Type};

use super::convert::channel_letters;
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::{input_expression, output_declaration};
use crate::graph::{ShaderGraph, ShaderNode};
use crate::stage::ShaderStage;

#[derive(Debug)]
pub struct CombineNode {
    name: String,
    /// Type of each input, in nodedef order.
    parts: Vec<Type>,
    out: Type,
}

impl CombineNode {
    pub fn new(name: &str, nodedef: &NodeDef) -> Result<Self> {
        let out = nodedef.output_type();
        let parts: Vec<Type> = nodedef.inputs.iter().map(|i| i.ty).collect();
        let invalid = |reason: String| GenError::InvalidNode {
            node: nodedef.name.clone(),
            reason,
        };
        if channel_letters(out).is_none() || out == Type::Float {
            return Err(invalid(format!("cannot combine into {out}")));
        }
        let mut components = 0;
        for ty in &parts {
            if channel_letters(*ty).is_none() {
                return Err(invalid(format!("cannot take components of {ty}")));
            }
            components += ty.size();
        }
        if components != out.size() {
            return Err(invalid(format!(
                "inputs provide {components} components but {out} has {}",
                out.size()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            parts,
            out,
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
        let mut components = Vec::with_capacity(self.out.size());
        for (index, ty) in self.parts.iter().enumerate() {
            let value = input_expression(graph, node, index, ctx)?;
            if *ty == Type::Float {
                components.push(value);
                continue;
            }
            for letter in channel_letters(*ty).unwrap_or_default().chars() {
                components.push(syntax.swizzled_variable(&value, *ty, &letter.to_string(), Type::Float)?);
            }
        }
        let value = syntax.aggregate_value(self.out, &components, false)?;
        let decl = output_declaration(graph, node, 0, ctx)?;
        stage.add_line(&format!("{decl} = {value}"), true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::PortDecl;

    fn make_combine(category: &str, inputs: &[Type], out: Type) -> NodeDef {
        let mut nd = NodeDef::new(format!("ND_{category}_{out}"), category).with_output(PortDecl::new("out", out));
        for (i, ty) in inputs.iter().enumerate() {
            nd = nd.with_input(PortDecl::new(format!("in{}", i + 1), *ty));
        }
        nd
    }

    #[test]
    fn component_counts_must_match() {
        let ok = make_combine("combine4", &[Type::Color3, Type::Float], Type::Color4);
        assert!(CombineNode::new("combine:ok", &ok).is_ok());

        let short = make_combine("combine3", &[Type::Float, Type::Float], Type::Vector3);
        let err = CombineNode::new("combine:short", &short).unwrap_err();
        assert!(err.to_string().contains("2 components"));
    }
}
