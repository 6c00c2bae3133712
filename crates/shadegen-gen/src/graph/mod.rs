//! The shader graph intermediate representation.
//!
//! A [`ShaderGraph`] is an arena of [`ShaderNode`]s addressed by [`NodeId`].
//! Connections are stored on both ends: an input records its [`Source`],
//! and an output (or input socket) records every [`Sink`] it feeds. Input
//! sockets are the graph's published interface (uniforms on a root graph,
//! function parameters on a compound graph); output sockets are its
//! results.
//!
//! Graphs are built by [`build`], prepared for emission by
//! [`ShaderGraph::finalize`], and immutable afterwards.

pub mod build;
pub mod finalize;
pub mod node;
pub mod optimize;
pub mod port;
pub mod traverse;

use std::collections::{BTreeMap, HashMap};

pub use node::{Classification, ScopeInfo, ScopeKind, ShaderNode};
pub use port::{GraphId, NodeId, ShaderPort, Sink, Source};
pub use traverse::{Edge, UpstreamEdges};

use crate::error::{GenError, Result};

/// Whether a graph is the shader being generated or the body of a
/// compound node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    Root,
    Compound,
}

/// A DAG of shader nodes with input and output sockets.
#[derive(Debug, Clone)]
pub struct ShaderGraph {
    pub id: GraphId,
    pub name: String,
    pub kind: GraphKind,
    /// Nodedef this graph implements, when it has an interface.
    pub nodedef: Option<String>,
    nodes: BTreeMap<NodeId, ShaderNode>,
    names: HashMap<String, NodeId>,
    next_id: u32,
    input_sockets: Vec<ShaderPort>,
    output_sockets: Vec<ShaderPort>,
    order: Vec<NodeId>,
}

impl ShaderGraph {
    pub fn new(id: GraphId, name: impl Into<String>, kind: GraphKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            nodedef: None,
            nodes: BTreeMap::new(),
            names: HashMap::new(),
            next_id: 0,
            input_sockets: Vec::new(),
            output_sockets: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Add a node, assigning its id. Node names are unique per graph.
    pub fn add_node(&mut self, mut node: ShaderNode) -> Result<NodeId> {
        if self.names.contains_key(&node.name) {
            return Err(GenError::DuplicateNode {
                node: node.name,
                graph: self.name.clone(),
            });
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        node.id = id;
        self.names.insert(node.name.clone(), id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&ShaderNode> {
        self.nodes.get(&id).ok_or_else(|| GenError::UnknownElement {
            name: format!("node {id} in '{}'", self.name),
        })
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut ShaderNode> {
        let name = &self.name;
        self.nodes.get_mut(&id).ok_or_else(|| GenError::UnknownElement {
            name: format!("node {id} in '{name}'"),
        })
    }

    pub fn node_by_name(&self, name: &str) -> Option<&ShaderNode> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &ShaderNode> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in topological order, valid after [`ShaderGraph::topological_sort`].
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in topological order.
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &ShaderNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn input_sockets(&self) -> &[ShaderPort] {
        &self.input_sockets
    }

    pub fn output_sockets(&self) -> &[ShaderPort] {
        &self.output_sockets
    }

    pub fn input_socket_index(&self, name: &str) -> Option<usize> {
        self.input_sockets.iter().position(|s| s.name == name)
    }

    pub fn output_socket_index(&self, name: &str) -> Option<usize> {
        self.output_sockets.iter().position(|s| s.name == name)
    }

    pub fn input_socket_mut(&mut self, index: usize) -> Option<&mut ShaderPort> {
        self.input_sockets.get_mut(index)
    }

    pub fn output_socket_mut(&mut self, index: usize) -> Option<&mut ShaderPort> {
        self.output_sockets.get_mut(index)
    }

    pub fn add_input_socket(&mut self, port: ShaderPort) -> Result<usize> {
        if self.input_socket_index(&port.name).is_some() {
            return Err(GenError::DuplicatePort {
                port: port.name,
                owner: self.name.clone(),
            });
        }
        self.input_sockets.push(port);
        Ok(self.input_sockets.len() - 1)
    }

    pub fn add_output_socket(&mut self, port: ShaderPort) -> Result<usize> {
        if self.output_socket_index(&port.name).is_some() {
            return Err(GenError::DuplicatePort {
                port: port.name,
                owner: self.name.clone(),
            });
        }
        self.output_sockets.push(port);
        Ok(self.output_sockets.len() - 1)
    }

    /// The port a source refers to.
    pub fn source_port(&self, source: Source) -> Result<&ShaderPort> {
        let port = match source {
            Source::Node { node, output } => self.node(node)?.outputs.get(output),
            Source::Socket(index) => self.input_sockets.get(index),
        };
        port.ok_or_else(|| self.unknown_port(format!("{source:?}")))
    }

    fn source_port_mut(&mut self, source: Source) -> Result<&mut ShaderPort> {
        let name = format!("{source:?} in '{}'", self.name);
        let port = match source {
            Source::Node { node, output } => self.node_mut(node)?.outputs.get_mut(output),
            Source::Socket(index) => self.input_sockets.get_mut(index),
        };
        port.ok_or(GenError::UnknownElement { name })
    }

    /// The port a sink refers to.
    pub fn sink_port(&self, sink: Sink) -> Result<&ShaderPort> {
        let port = match sink {
            Sink::Node { node, input } => self.node(node)?.inputs.get(input),
            Sink::Socket(index) => self.output_sockets.get(index),
        };
        port.ok_or_else(|| self.unknown_port(format!("{sink:?}")))
    }

    pub fn sink_port_mut(&mut self, sink: Sink) -> Result<&mut ShaderPort> {
        let name = format!("{sink:?} in '{}'", self.name);
        let port = match sink {
            Sink::Node { node, input } => self.node_mut(node)?.inputs.get_mut(input),
            Sink::Socket(index) => self.output_sockets.get_mut(index),
        };
        port.ok_or(GenError::UnknownElement { name })
    }

    fn unknown_port(&self, what: String) -> GenError {
        GenError::UnknownElement {
            name: format!("{what} in '{}'", self.name),
        }
    }

    /// Human-readable name of a port for diagnostics.
    pub fn sink_name(&self, sink: Sink) -> String {
        match sink {
            Sink::Node { node, input } => match self.nodes.get(&node) {
                Some(n) => format!(
                    "{}.{}",
                    n.name,
                    n.inputs.get(input).map_or("?", |p| p.name.as_str())
                ),
                None => format!("{node}"),
            },
            Sink::Socket(index) => self
                .output_sockets
                .get(index)
                .map_or_else(|| format!("output {index}"), |p| p.name.clone()),
        }
    }

    pub fn source_name(&self, source: Source) -> String {
        match source {
            Source::Node { node, output } => match self.nodes.get(&node) {
                Some(n) => format!(
                    "{}.{}",
                    n.name,
                    n.outputs.get(output).map_or("?", |p| p.name.as_str())
                ),
                None => format!("{node}"),
            },
            Source::Socket(index) => self
                .input_sockets
                .get(index)
                .map_or_else(|| format!("input {index}"), |p| p.name.clone()),
        }
    }

    /// Connect `source` to `sink`, replacing any previous connection of the
    /// sink. Types must match unless the sink swizzles its source.
    pub fn connect(&mut self, source: Source, sink: Sink) -> Result<()> {
        let from = self.source_port(source)?;
        let to = self.sink_port(sink)?;
        if from.ty != to.ty && to.channels.is_none() {
            return Err(GenError::TypeMismatch {
                from: self.source_name(source),
                from_ty: from.ty,
                to: self.sink_name(sink),
                to_ty: to.ty,
            });
        }
        if self.sink_port(sink)?.connection.is_some() {
            self.disconnect(sink)?;
        }
        self.sink_port_mut(sink)?.connection = Some(source);
        self.source_port_mut(source)?.connections.push(sink);
        Ok(())
    }

    /// Remove the upstream connection of `sink`, if any.
    pub fn disconnect(&mut self, sink: Sink) -> Result<()> {
        let Some(source) = self.sink_port_mut(sink)?.connection.take() else {
            return Ok(());
        };
        if let Ok(port) = self.source_port_mut(source) {
            port.connections.retain(|s| *s != sink);
        }
        Ok(())
    }

    /// Route the consumers of `node`'s output `output` to the upstream of
    /// its input `input`, then detach the node.
    ///
    /// An unconnected input's value is copied onto the consumers instead.
    /// A swizzle on the bypassed input moves onto consumers that have none.
    pub fn bypass(&mut self, id: NodeId, input: usize, output: usize) -> Result<()> {
        let node = self.node(id)?;
        let in_port = node
            .inputs
            .get(input)
            .ok_or_else(|| self.unknown_port(format!("input {input} of '{}'", node.name)))?;
        let upstream = in_port.connection;
        let value = in_port.value.clone();
        let channels = in_port.channels.clone();
        let downstream = node
            .outputs
            .get(output)
            .ok_or_else(|| self.unknown_port(format!("output {output} of '{}'", node.name)))?
            .connections
            .clone();

        for sink in downstream {
            self.disconnect(sink)?;
            match upstream {
                Some(source) => {
                    let port = self.sink_port_mut(sink)?;
                    if port.channels.is_none() {
                        port.channels = channels.clone();
                    }
                    port.connection = Some(source);
                    self.source_port_mut(source)?.connections.push(sink);
                }
                None => {
                    let port = self.sink_port_mut(sink)?;
                    port.value = value.clone();
                }
            }
        }
        self.disconnect(Sink::Node { node: id, input })?;
        log::trace!("bypassed node '{}'", self.node(id)?.name);
        Ok(())
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let inputs = node.inputs.len();
        let downstream: Vec<Sink> = node
            .outputs
            .iter()
            .flat_map(|o| o.connections.iter().copied())
            .collect();
        for input in 0..inputs {
            self.disconnect(Sink::Node { node: id, input })?;
        }
        for sink in downstream {
            self.disconnect(sink)?;
        }
        if let Some(node) = self.nodes.remove(&id) {
            self.names.remove(&node.name);
        }
        self.order.retain(|n| *n != id);
        Ok(())
    }

    /// Upstream nodes directly feeding `id`.
    fn upstream_node_ids(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|n| n.inputs.iter())
            .filter_map(|i| match i.connection {
                Some(Source::Node { node, .. }) => Some(node),
                _ => None,
            })
    }

    /// Order the nodes so every node comes after the nodes it reads from.
    ///
    /// Kahn's algorithm over node-to-node edges; ties are broken by node id
    /// so the order is stable across runs. A cycle fails with
    /// [`GenError::FoundCycle`] naming the nodes on it.
    pub fn topological_sort(&mut self) -> Result<()> {
        let mut in_degree: BTreeMap<NodeId, usize> = self.nodes.keys().map(|id| (*id, 0)).collect();
        let mut downstream: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for id in self.nodes.keys() {
            for up in self.upstream_node_ids(*id) {
                *in_degree.entry(*id).or_default() += 1;
                downstream.entry(up).or_default().push(*id);
            }
        }

        let mut queue: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| *id)
            .collect();
        queue.sort_by(|a, b| b.cmp(a));

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop() {
            result.push(id);
            for target in downstream.get(&id).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(target) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(*target);
                    }
                }
            }
            queue.sort_by(|a, b| b.cmp(a));
        }

        if result.len() != self.nodes.len() {
            let stuck = in_degree
                .iter()
                .find(|(_, &deg)| deg > 0)
                .map(|(id, _)| *id);
            let path = stuck
                .and_then(|id| self.find_cycle(id))
                .unwrap_or_else(|| vec![self.name.clone()]);
            return Err(GenError::FoundCycle { path });
        }
        self.order = result;
        Ok(())
    }
}
