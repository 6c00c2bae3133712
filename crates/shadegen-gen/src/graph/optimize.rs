//! Graph optimization: bypassing pass-through nodes and dropping nodes
//! nothing reads.

use std::collections::BTreeSet;

use super::{Classification, NodeId, ShaderGraph, Sink};
use crate::error::Result;
use crate::nodes::ShaderNodeImpl;

impl ShaderGraph {
    /// Bypass constant and dot nodes, fold conditionals whose selectors are
    /// literals, then remove every node no output socket depends on.
    /// Returns the number of nodes changed.
    pub fn optimize(&mut self) -> Result<usize> {
        let mut bypassed = 0;
        for id in self.order().to_vec() {
            let Some(input) = self.bypass_input(id)? else {
                continue;
            };
            if !self.can_bypass(id, input)? {
                log::trace!("keeping '{}': swizzles on both sides", self.node(id)?.name);
                continue;
            }
            self.bypass(id, input, 0)?;
            bypassed += 1;
        }

        let mut reachable = BTreeSet::new();
        for index in 0..self.output_sockets().len() {
            reachable.extend(self.upstream_nodes(Sink::Socket(index))?);
        }
        let unused: Vec<NodeId> = self
            .node_ids()
            .into_iter()
            .filter(|id| !reachable.contains(id))
            .collect();
        for id in &unused {
            self.remove_node(*id)?;
        }

        if bypassed + unused.len() > 0 {
            log::debug!(
                "optimized '{}': {bypassed} nodes bypassed, {} removed",
                self.name,
                unused.len()
            );
        }
        Ok(bypassed + unused.len())
    }

    /// The input a node can be replaced by, if any.
    fn bypass_input(&self, id: NodeId) -> Result<Option<usize>> {
        let node = self.node(id)?;
        if node.has_classification(Classification::DO_NOT_OPTIMIZE) || node.outputs.len() != 1 {
            return Ok(None);
        }
        if node.has_classification(Classification::CONSTANT) {
            return Ok(node.input_index("value"));
        }
        if node.has_classification(Classification::DOT) {
            return Ok(node.input_index("in"));
        }
        if let ShaderNodeImpl::Conditional(conditional) = node.implementation.as_ref() {
            return Ok(conditional.select_literal(node));
        }
        Ok(None)
    }

    /// Swizzles do not compose through a bypass: a swizzled input feeding a
    /// swizzling consumer, or a literal moving onto a swizzling consumer,
    /// keeps the node.
    fn can_bypass(&self, id: NodeId, input: usize) -> Result<bool> {
        let node = self.node(id)?;
        let port = &node.inputs[input];
        if port.channels.is_none() && port.is_connected() {
            return Ok(true);
        }
        for sink in &node.outputs[0].connections {
            if self.sink_port(*sink)?.channels.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
