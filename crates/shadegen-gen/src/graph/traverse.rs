//! Upstream traversal with cycle detection.

use std::collections::HashSet;

use super::port::{NodeId, Sink, Source};
use super::ShaderGraph;
use crate::error::{GenError, Result};

/// One connection visited by an upstream traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub upstream: Source,
    pub downstream: Sink,
}

struct Frame {
    node: NodeId,
    next_input: usize,
}

/// Depth-first iterator over the edges upstream of a sink.
///
/// Every connection reachable upstream of the start is yielded. A node
/// reached again while it is still on the current path is a cycle: the
/// iterator yields [`GenError::FoundCycle`] with the path and stops. Nodes
/// already fully explored through another path are not descended into
/// again.
pub struct UpstreamEdges<'g> {
    graph: &'g ShaderGraph,
    start: Option<Sink>,
    stack: Vec<Frame>,
    on_path: HashSet<NodeId>,
    explored: HashSet<NodeId>,
    failed: bool,
}

impl<'g> UpstreamEdges<'g> {
    pub fn new(graph: &'g ShaderGraph, start: Sink) -> Self {
        Self {
            graph,
            start: Some(start),
            stack: Vec::new(),
            on_path: HashSet::new(),
            explored: HashSet::new(),
            failed: false,
        }
    }

    fn cycle_path(&self, repeated: NodeId) -> Vec<String> {
        let name = |id: NodeId| {
            self.graph
                .node(id)
                .map_or_else(|_| id.to_string(), |n| n.name.clone())
        };
        let first = self
            .stack
            .iter()
            .position(|f| f.node == repeated)
            .unwrap_or(0);
        let mut path: Vec<String> = self.stack[first..].iter().map(|f| name(f.node)).collect();
        path.push(name(repeated));
        path
    }

    /// Record the edge and descend into its upstream node if needed.
    fn visit(&mut self, edge: Edge) -> Result<Edge> {
        if let Source::Node { node, .. } = edge.upstream {
            if self.on_path.contains(&node) {
                self.failed = true;
                return Err(GenError::FoundCycle {
                    path: self.cycle_path(node),
                });
            }
            if !self.explored.contains(&node) {
                self.on_path.insert(node);
                self.stack.push(Frame { node, next_input: 0 });
            }
        }
        Ok(edge)
    }
}

impl Iterator for UpstreamEdges<'_> {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(start) = self.start.take() {
            let source = match self.graph.sink_port(start) {
                Ok(port) => port.connection,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            if let Some(upstream) = source {
                return Some(self.visit(Edge {
                    upstream,
                    downstream: start,
                }));
            }
            return None;
        }

        let graph = self.graph;
        loop {
            let frame = self.stack.last_mut()?;
            let node_id = frame.node;
            let inputs = match graph.node(node_id) {
                Ok(node) => &node.inputs,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            let next = inputs
                .iter()
                .enumerate()
                .skip(frame.next_input)
                .find_map(|(i, port)| port.connection.map(|c| (i, c)));
            match next {
                Some((index, upstream)) => {
                    frame.next_input = index + 1;
                    let edge = Edge {
                        upstream,
                        downstream: Sink::Node {
                            node: node_id,
                            input: index,
                        },
                    };
                    return Some(self.visit(edge));
                }
                None => {
                    self.stack.pop();
                    self.on_path.remove(&node_id);
                    self.explored.insert(node_id);
                }
            }
        }
    }
}

impl ShaderGraph {
    pub fn upstream_edges(&self, start: Sink) -> UpstreamEdges<'_> {
        UpstreamEdges::new(self, start)
    }

    /// Nodes upstream of `start`, failing on a cycle.
    pub fn upstream_nodes(&self, start: Sink) -> Result<Vec<NodeId>> {
        let mut nodes = Vec::new();
        for edge in self.upstream_edges(start) {
            if let Source::Node { node, .. } = edge?.upstream {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    /// Traverse upstream of every output socket, failing on the first cycle.
    pub fn validate_acyclic(&self) -> Result<()> {
        for index in 0..self.output_sockets().len() {
            for edge in self.upstream_edges(Sink::Socket(index)) {
                edge?;
            }
        }
        Ok(())
    }

    /// Path of a cycle running through the inputs of `start`, if any.
    pub(crate) fn find_cycle(&self, start: NodeId) -> Option<Vec<String>> {
        let node = self.node(start).ok()?;
        for input in 0..node.inputs.len() {
            for edge in self.upstream_edges(Sink::Node { node: start, input }) {
                if let Err(GenError::FoundCycle { path }) = edge {
                    return Some(path);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests_support::make_node;
    use crate::graph::{GraphId, GraphKind, ShaderPort};
    use shadegen_core::Type;

    fn make_diamond() -> (ShaderGraph, [NodeId; 4]) {
        let mut graph = ShaderGraph::new(GraphId(0), "diamond", GraphKind::Root);
        let a = graph.add_node(make_node("a", &["in"], Type::Float)).unwrap();
        let b = graph.add_node(make_node("b", &["in"], Type::Float)).unwrap();
        let c = graph.add_node(make_node("c", &["in"], Type::Float)).unwrap();
        let d = graph.add_node(make_node("d", &["in1", "in2"], Type::Float)).unwrap();
        graph.add_output_socket(ShaderPort::new("out", Type::Float)).unwrap();
        let out = |node| Source::Node { node, output: 0 };
        graph.connect(out(a), Sink::Node { node: b, input: 0 }).unwrap();
        graph.connect(out(a), Sink::Node { node: c, input: 0 }).unwrap();
        graph.connect(out(b), Sink::Node { node: d, input: 0 }).unwrap();
        graph.connect(out(c), Sink::Node { node: d, input: 1 }).unwrap();
        graph.connect(out(d), Sink::Socket(0)).unwrap();
        (graph, [a, b, c, d])
    }

    #[test]
    fn diamond_is_acyclic() {
        let (graph, [a, b, c, d]) = make_diamond();
        graph.validate_acyclic().unwrap();
        let upstream = graph.upstream_nodes(Sink::Socket(0)).unwrap();
        assert_eq!(upstream, vec![d, b, a, c]);
    }

    #[test]
    fn edges_are_depth_first() {
        let (graph, [a, b, _, d]) = make_diamond();
        let edges: Vec<Edge> = graph
            .upstream_edges(Sink::Socket(0))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[0].upstream, Source::Node { node: d, output: 0 });
        assert_eq!(edges[1].downstream, Sink::Node { node: d, input: 0 });
        assert_eq!(edges[2].upstream, Source::Node { node: a, output: 0 });
        assert_eq!(edges[2].downstream, Sink::Node { node: b, input: 0 });
    }

    #[test]
    fn back_edge_is_a_cycle() {
        let (mut graph, [a, _, c, _]) = make_diamond();
        let extra = graph.add_node(make_node("e", &["in"], Type::Float)).unwrap();
        graph
            .connect(Source::Node { node: c, output: 0 }, Sink::Node { node: extra, input: 0 })
            .unwrap();
        graph
            .connect(Source::Node { node: extra, output: 0 }, Sink::Node { node: a, input: 0 })
            .unwrap();
        let err = graph.validate_acyclic().unwrap_err();
        match err {
            GenError::FoundCycle { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"e".to_string()));
            }
            other => panic!("expected a cycle, got {other}"),
        }
    }
}
