//! Conditional nodes: two-way comparisons and n-way switches.
//!
//! Nodes feeding only one branch of a conditional are emitted inside that
//! branch, so their cost is paid only when the branch is taken. Targets
//! that return values (MDL) evaluate both branches up front and select
//! with a ternary.

use shadegen_core::{format_float, NodeDef, Type, Value};
use shadegen_syntax::CallStyle;

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::{emit_branch, input_expression, output_declaration, output_variable};
use crate::graph::{Classification, ShaderGraph, ShaderNode};
use crate::stage::{Brackets, ShaderStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Greater,
    GreaterEqual,
    Equal,
    LessEqual,
}

impl Comparison {
    fn operator(self) -> &'static str {
        match self {
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::Equal => "==",
            Comparison::LessEqual => "<=",
        }
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Greater => left > right,
            Comparison::GreaterEqual => left >= right,
            Comparison::Equal => left == right,
            Comparison::LessEqual => left <= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    /// `left <op> right` selects `when_true`, otherwise `when_false`.
    IfElse {
        comparison: Comparison,
        left: usize,
        right: usize,
        when_true: usize,
        when_false: usize,
    },
    /// `which` selects one of `branches`, clamped to the valid range.
    Switch { which: usize, which_ty: Type, branches: Vec<usize> },
}

#[derive(Debug)]
pub struct ConditionalNode {
    name: String,
    selection: Selection,
}

/// Input indices of the branches of a conditional node, in branch order.
pub fn branch_inputs(node: &ShaderNode) -> Vec<usize> {
    if node.has_classification(Classification::IFELSE) {
        ["in1", "in2"]
            .iter()
            .filter_map(|name| node.input_index(name))
            .collect()
    } else if node.has_classification(Classification::SWITCH) {
        (0..node.inputs.len())
            .filter(|&i| node.inputs[i].name != "which")
            .collect()
    } else {
        Vec::new()
    }
}

fn scalar(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(f64::from(*f)),
        Value::Integer(i) => Some(f64::from(*i)),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

impl ConditionalNode {
    pub fn new(name: &str, nodedef: &NodeDef) -> Result<Self> {
        let invalid = |reason: &str| GenError::InvalidNode {
            node: nodedef.name.clone(),
            reason: reason.to_string(),
        };
        let index = |input: &str| nodedef.inputs.iter().position(|i| i.name == input);

        let selection = if nodedef.node == "switch" {
            let which = index("which").ok_or_else(|| invalid("a switch needs a 'which' input"))?;
            let branches: Vec<usize> = (0..nodedef.inputs.len()).filter(|&i| i != which).collect();
            if branches.is_empty() {
                return Err(invalid("a switch needs at least one branch"));
            }
            Selection::Switch {
                which,
                which_ty: nodedef.inputs[which].ty,
                branches,
            }
        } else {
            let comparison = match nodedef.node.as_str() {
                "ifgreater" => Comparison::Greater,
                "ifgreatereq" => Comparison::GreaterEqual,
                "ifequal" => Comparison::Equal,
                "compare" => Comparison::LessEqual,
                _ => return Err(invalid("unknown conditional category")),
            };
            let (when_true, when_false) = index("in1")
                .zip(index("in2"))
                .ok_or_else(|| invalid("a conditional needs inputs 'in1' and 'in2'"))?;
            let mut operands = (0..nodedef.inputs.len()).filter(|&i| i != when_true && i != when_false);
            let (left, right) = operands
                .next()
                .zip(operands.next())
                .ok_or_else(|| invalid("a conditional needs two values to compare"))?;
            Selection::IfElse {
                comparison,
                left,
                right,
                when_true,
                when_false,
            }
        };
        Ok(Self {
            name: name.to_string(),
            selection,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The branch input taken when every selector input of `node` is an
    /// unconnected literal.
    pub fn select_literal(&self, node: &ShaderNode) -> Option<usize> {
        let literal = |index: usize| {
            let port = node.inputs.get(index)?;
            if port.is_connected() {
                return None;
            }
            port.value.as_ref().and_then(scalar)
        };
        match &self.selection {
            Selection::IfElse {
                comparison,
                left,
                right,
                when_true,
                when_false,
            } => {
                let holds = comparison.holds(literal(*left)?, literal(*right)?);
                Some(if holds { *when_true } else { *when_false })
            }
            Selection::Switch { which, branches, .. } => {
                let which = literal(*which)?.floor().max(0.0) as usize;
                Some(branches[which.min(branches.len() - 1)])
            }
        }
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        match ctx.syntax().call_style {
            CallStyle::OutParams => self.emit_branches(node, graph, ctx, stage),
            CallStyle::ReturnValue => self.emit_ternary(node, graph, ctx, stage),
        }
    }

    /// Conditions guarding each branch; the last branch is the `else`.
    fn conditions(&self, node: &ShaderNode, graph: &ShaderGraph, ctx: &GenContext) -> Result<Vec<(usize, String)>> {
        match &self.selection {
            Selection::IfElse {
                comparison,
                left,
                right,
                when_true,
                when_false,
            } => {
                let left = input_expression(graph, node, *left, ctx)?;
                let right = input_expression(graph, node, *right, ctx)?;
                Ok(vec![
                    (*when_true, format!("{left} {} {right}", comparison.operator())),
                    (*when_false, String::new()),
                ])
            }
            Selection::Switch { which, which_ty, branches } => {
                let which = input_expression(graph, node, *which, ctx)?;
                let mut conditions = Vec::with_capacity(branches.len());
                for (position, branch) in branches.iter().enumerate() {
                    let bound = position + 1;
                    let bound = if *which_ty == Type::Float {
                        format_float(bound as f32)
                    } else {
                        bound.to_string()
                    };
                    conditions.push((*branch, format!("{which} < {bound}")));
                }
                if let Some(last) = conditions.last_mut() {
                    last.1.clear();
                }
                Ok(conditions)
            }
        }
    }

    fn emit_branches(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let syntax = ctx.syntax();
        let decl = output_declaration(graph, node, 0, ctx)?;
        let default = syntax.default_value(node.outputs[0].ty, false)?;
        stage.add_line(&format!("{decl} = {default}"), true);
        let variable = output_variable(graph, node, 0, ctx)?;

        let conditions = self.conditions(node, graph, ctx)?;
        let last = conditions.len() - 1;
        for (position, (branch, condition)) in conditions.into_iter().enumerate() {
            match (position, position == last) {
                (0, true) => {}
                (0, false) => stage.add_line(&format!("if ({condition})"), false),
                (_, false) => stage.add_line(&format!("else if ({condition})"), false),
                (_, true) => stage.add_line("else", false),
            }
            stage.begin_scope(Brackets::Braces);
            emit_branch(graph, node, branch, ctx, stage)?;
            let value = input_expression(graph, node, branch, ctx)?;
            stage.add_line(&format!("{variable} = {value}"), true);
            stage.end_scope(false)?;
        }
        Ok(())
    }

    fn emit_ternary(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let conditions = self.conditions(node, graph, ctx)?;
        for (branch, _) in &conditions {
            emit_branch(graph, node, *branch, ctx, stage)?;
        }
        let mut expression = String::new();
        for (branch, condition) in conditions.iter().rev() {
            let value = input_expression(graph, node, *branch, ctx)?;
            expression = if condition.is_empty() {
                value
            } else {
                format!("({condition}) ? {value} : {expression}")
            };
        }
        let decl = output_declaration(graph, node, 0, ctx)?;
        stage.add_line(&format!("{decl} = {expression}"), true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests_support::make_node;
    use shadegen_core::PortDecl;

    fn make_ifgreater() -> NodeDef {
        NodeDef::new("ND_ifgreater_float", "ifgreater")
            .with_input(PortDecl::new("value1", Type::Float).with_value("1.0"))
            .with_input(PortDecl::new("value2", Type::Float).with_value("0.0"))
            .with_input(PortDecl::new("in1", Type::Float))
            .with_input(PortDecl::new("in2", Type::Float))
            .with_output(PortDecl::new("out", Type::Float))
    }

    fn make_literal_node(nodedef: &NodeDef, values: &[(&str, Value)]) -> ShaderNode {
        let mut node = make_node("cond", &[], Type::Float);
        node.inputs = nodedef
            .inputs
            .iter()
            .map(|decl| crate::graph::node::port_from_decl(decl, "").unwrap())
            .collect();
        node.classification = Classification::from_nodedef(nodedef);
        for (name, value) in values {
            let index = node.input_index(name).unwrap();
            node.inputs[index].value = Some(value.clone());
        }
        node
    }

    #[test]
    fn ifgreater_selects_by_literal_comparison() {
        let nd = make_ifgreater();
        let cond = ConditionalNode::new("conditional:ND_ifgreater_float", &nd).unwrap();
        let node = make_literal_node(&nd, &[]);
        assert_eq!(branch_inputs(&node), vec![2, 3]);
        assert_eq!(cond.select_literal(&node), Some(2));

        let node = make_literal_node(&nd, &[("value1", Value::Float(-1.0))]);
        assert_eq!(cond.select_literal(&node), Some(3));
    }

    #[test]
    fn switch_clamps_its_selector() {
        let nd = NodeDef::new("ND_switch_float", "switch")
            .with_input(PortDecl::new("in1", Type::Float))
            .with_input(PortDecl::new("in2", Type::Float))
            .with_input(PortDecl::new("in3", Type::Float))
            .with_input(PortDecl::new("which", Type::Float).with_value("0"))
            .with_output(PortDecl::new("out", Type::Float));
        let cond = ConditionalNode::new("conditional:ND_switch_float", &nd).unwrap();

        let node = make_literal_node(&nd, &[("which", Value::Float(1.7))]);
        assert_eq!(cond.select_literal(&node), Some(1));
        let node = make_literal_node(&nd, &[("which", Value::Float(9.0))]);
        assert_eq!(cond.select_literal(&node), Some(2));
        let node = make_literal_node(&nd, &[("which", Value::Float(-3.0))]);
        assert_eq!(cond.select_literal(&node), Some(0));
        assert_eq!(branch_inputs(&node), vec![0, 1, 2]);
    }

    #[test]
    fn missing_branches_are_invalid() {
        let nd = NodeDef::new("ND_ifequal_float", "ifequal")
            .with_input(PortDecl::new("value1", Type::Float))
            .with_input(PortDecl::new("in1", Type::Float))
            .with_output(PortDecl::new("out", Type::Float));
        assert!(ConditionalNode::new("conditional:x", &nd).is_err());
    }
}
