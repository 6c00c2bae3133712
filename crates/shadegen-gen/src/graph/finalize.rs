//! Preparing a built graph for emission.

use shadegen_core::Type;
use shadegen_syntax::UniqueNames;

use super::{Classification, GraphKind, NodeId, ScopeInfo, ScopeKind, ShaderGraph, ShaderPort, Sink, Source};
use crate::context::GenContext;
use crate::error::Result;
use crate::generator::result_members;
use crate::nodes::conditional::branch_inputs;
use crate::options::ShaderInterfaceType;

impl ShaderGraph {
    /// Publish the interface, name every variable, order and scope the
    /// nodes, and optimize. The graph is ready to emit afterwards.
    ///
    /// Fails with a cycle if any output depends on itself.
    pub fn finalize(&mut self, ctx: &GenContext) -> Result<()> {
        if self.kind == GraphKind::Root {
            self.publish_inputs(ctx)?;
        }
        self.assign_variables(ctx)?;
        self.validate_acyclic()?;
        self.topological_sort()?;
        self.calculate_scopes()?;

        if self.optimize()? > 0 {
            self.topological_sort()?;
            self.calculate_scopes()?;
        }
        self.collect_closures()?;
        log::debug!(
            "finalized '{}': {} nodes, {} input sockets",
            self.name,
            self.node_count(),
            self.input_sockets().len()
        );
        Ok(())
    }

    /// Turn unconnected inputs into input sockets of the graph.
    ///
    /// With a complete interface every editable input is published. File
    /// texture filenames are published on hardware targets regardless,
    /// since textures are bound at runtime.
    fn publish_inputs(&mut self, ctx: &GenContext) -> Result<()> {
        let complete = ctx.options.shader_interface_type == ShaderInterfaceType::Complete;
        let hw = ctx.target().is_hw();
        let syntax = ctx.syntax();
        let mut names = UniqueNames::new();
        for socket in self.input_sockets() {
            names.insert(socket.name.clone(), 0);
        }

        for id in self.node_ids() {
            let node = self.node(id)?;
            let filetexture = node.has_classification(Classification::FILETEXTURE);
            let published: Vec<(usize, ShaderPort)> = node
                .inputs
                .iter()
                .enumerate()
                .filter(|(_, port)| !port.is_connected() && port.ty.is_editable())
                .filter(|(_, port)| complete || (hw && filetexture && port.ty == Type::Filename))
                .map(|(index, port)| {
                    let mut socket = ShaderPort::new(
                        syntax.make_unique(&format!("{}_{}", node.name, port.name), &mut names),
                        port.ty,
                    );
                    socket.value = port.value.clone();
                    socket.path = port.path.clone();
                    socket.colorspace = port.colorspace.clone();
                    socket.unit = port.unit.clone();
                    socket.unittype = port.unittype.clone();
                    socket.uniform = port.uniform;
                    (index, socket)
                })
                .collect();
            for (input, socket) in published {
                let index = self.add_input_socket(socket)?;
                self.connect(Source::Socket(index), Sink::Node { node: id, input })?;
            }
        }
        Ok(())
    }

    /// Give every socket and node output a variable name that is unique in
    /// the graph and not a reserved word of the target.
    fn assign_variables(&mut self, ctx: &GenContext) -> Result<()> {
        let syntax = ctx.syntax();
        let mut names = UniqueNames::new();
        if self.kind == GraphKind::Compound {
            // Local of a compound function returning a struct.
            names.insert("result".to_string(), 0);
        }
        for index in 0..self.input_sockets().len() {
            if let Some(socket) = self.input_socket_mut(index) {
                socket.variable = syntax.make_unique(&socket.name, &mut names);
            }
        }
        for index in 0..self.output_sockets().len() {
            if let Some(socket) = self.output_socket_mut(index) {
                socket.variable = syntax.make_unique(&socket.name, &mut names);
            }
        }
        for id in self.node_ids() {
            let node = self.node_mut(id)?;
            if node.implementation.returns_struct(node.outputs.len(), ctx) {
                node.result_variable = Some(syntax.make_unique(&format!("{}_result", node.name), &mut names));
                let members = result_members(&node.outputs, &syntax);
                for (output, member) in node.outputs.iter_mut().zip(members) {
                    output.variable = member;
                }
            } else {
                node.result_variable = None;
                for output in node.outputs.iter_mut() {
                    output.variable = syntax.make_unique(&format!("{}_{}", node.name, output.name), &mut names);
                }
            }
        }
        Ok(())
    }

    /// Work out, for every node, whether it is used unconditionally or only
    /// inside branches of a conditional node.
    pub(crate) fn calculate_scopes(&mut self) -> Result<()> {
        let order = self.order().to_vec();
        for id in &order {
            self.node_mut(*id)?.scope = ScopeInfo::default();
        }
        let roots: Vec<NodeId> = self
            .output_sockets()
            .iter()
            .filter_map(|socket| match socket.connection {
                Some(Source::Node { node, .. }) => Some(node),
                _ => None,
            })
            .collect();
        for id in roots {
            self.node_mut(id)?.scope.merge(&ScopeInfo::global());
        }

        // Downstream nodes come later in the order, so walking it backwards
        // settles a node's scope before it is pushed upstream.
        for id in order.iter().rev() {
            let node = self.node(*id)?;
            let scope = node.scope;
            if scope.kind == ScopeKind::Unknown {
                continue;
            }
            let branches = if node.has_classification(Classification::CONDITIONAL) {
                branch_inputs(node)
            } else {
                Vec::new()
            };
            let full_mask = branches.iter().fold(0u32, |mask, b| mask | 1 << b);
            let upstream: Vec<(usize, NodeId)> = node
                .inputs
                .iter()
                .enumerate()
                .filter_map(|(index, port)| match port.connection {
                    Some(Source::Node { node, .. }) => Some((index, node)),
                    _ => None,
                })
                .collect();
            for (input, up) in upstream {
                let mut used = scope;
                if branches.contains(&input) {
                    used.adjust_at_conditional_input(*id, input, full_mask);
                }
                self.node_mut(up)?.scope.merge(&used);
            }
        }
        Ok(())
    }

    /// Record, on every shader node, the closure nodes upstream of it.
    fn collect_closures(&mut self) -> Result<()> {
        let shaders: Vec<NodeId> = self
            .ordered_nodes()
            .filter(|n| n.has_classification(Classification::SHADER))
            .map(|n| n.id)
            .collect();
        for id in shaders {
            let mut closures = std::collections::BTreeSet::new();
            for input in 0..self.node(id)?.inputs.len() {
                for up in self.upstream_nodes(Sink::Node { node: id, input })? {
                    if self.node(up)?.has_classification(Classification::CLOSURE) {
                        closures.insert(up);
                    }
                }
            }
            self.node_mut(id)?.used_closures = closures;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests_support::make_node;
    use crate::graph::{GraphId, ScopeKind};
    use crate::options::GenOptions;
    use shadegen_core::{NodeDef, PortDecl, Value};
    use shadegen_syntax::Target;
    use std::sync::Arc;

    fn make_ifgreater(name: &str) -> crate::graph::ShaderNode {
        let nodedef = NodeDef::new("ND_ifgreater_float", "ifgreater")
            .with_input(PortDecl::new("value1", Type::Float).with_value("1.0"))
            .with_input(PortDecl::new("value2", Type::Float).with_value("0.0"))
            .with_input(PortDecl::new("in1", Type::Float))
            .with_input(PortDecl::new("in2", Type::Float))
            .with_output(PortDecl::new("out", Type::Float));
        let implementation = crate::nodes::conditional::ConditionalNode::new("conditional:ND_ifgreater_float", &nodedef)
            .map(|c| Arc::new(crate::nodes::ShaderNodeImpl::Conditional(c)))
            .unwrap();
        crate::graph::ShaderNode::from_nodedef(name, &nodedef, implementation, "").unwrap()
    }

    /// `a` feeds only the first branch of `cond`, `b` both branches.
    fn make_branching() -> ShaderGraph {
        let mut graph = ShaderGraph::new(GraphId(0), "g", GraphKind::Root);
        let a = graph.add_node(make_node("a", &["in"], Type::Float)).unwrap();
        let b = graph.add_node(make_node("b", &["in"], Type::Float)).unwrap();
        let c = graph.add_node(make_node("c", &["in"], Type::Float)).unwrap();
        let cond = graph.add_node(make_ifgreater("cond")).unwrap();
        graph.add_output_socket(ShaderPort::new("out", Type::Float)).unwrap();
        let out = |node| Source::Node { node, output: 0 };
        graph.connect(out(b), Sink::Node { node: a, input: 0 }).unwrap();
        graph.connect(out(a), Sink::Node { node: cond, input: 2 }).unwrap();
        graph.connect(out(b), Sink::Node { node: c, input: 0 }).unwrap();
        graph.connect(out(c), Sink::Node { node: cond, input: 3 }).unwrap();
        graph.connect(out(cond), Sink::Socket(0)).unwrap();
        graph
    }

    #[test]
    fn branch_only_nodes_are_scoped_to_the_branch() {
        let mut graph = make_branching();
        let ctx = GenContext::new(Target::Glsl);
        graph.finalize(&ctx).unwrap();

        let cond = graph.node_by_name("cond").unwrap().id;
        let a = graph.node_by_name("a").unwrap();
        assert_eq!(a.scope.kind, ScopeKind::Single);
        assert!(a.scope.used_by_branch(cond, 2));
        assert!(a.referenced_conditionally());
        let b = graph.node_by_name("b").unwrap();
        assert_eq!(b.scope.kind, ScopeKind::Global);
        assert_eq!(graph.order().last(), Some(&cond));
    }

    #[test]
    fn complete_interface_publishes_unconnected_inputs() {
        let mut graph = make_branching();
        let ctx = GenContext::new(Target::Glsl);
        graph.finalize(&ctx).unwrap();
        let names: Vec<&str> = graph.input_sockets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b_in", "cond_value1", "cond_value2"]);
        assert_eq!(graph.input_sockets()[1].value, Some(Value::Float(1.0)));
    }

    #[test]
    fn reduced_interface_folds_literal_conditionals() {
        let mut graph = make_branching();
        let options = GenOptions {
            shader_interface_type: ShaderInterfaceType::Reduced,
            ..GenOptions::default()
        };
        let ctx = GenContext::with_options(Target::Glsl, options);
        graph.finalize(&ctx).unwrap();
        assert!(graph.input_sockets().is_empty());
        assert!(graph.node_by_name("cond").is_none());
        assert!(graph.node_by_name("c").is_none());
        let a = graph.node_by_name("a").unwrap();
        assert_eq!(graph.output_sockets()[0].connection, Some(Source::Node { node: a.id, output: 0 }));
        assert_eq!(a.scope.kind, ScopeKind::Global);
    }

    #[test]
    fn variables_avoid_reserved_words() {
        let mut graph = ShaderGraph::new(GraphId(0), "g", GraphKind::Root);
        let node = graph.add_node(make_node("float", &["in"], Type::Float)).unwrap();
        graph.add_output_socket(ShaderPort::new("out", Type::Float)).unwrap();
        graph.connect(Source::Node { node, output: 0 }, Sink::Socket(0)).unwrap();
        graph.finalize(&GenContext::new(Target::Glsl)).unwrap();
        assert_eq!(graph.output_sockets()[0].variable, "out1");
        assert_eq!(graph.node(node).unwrap().outputs[0].variable, "float_out");
    }
}
