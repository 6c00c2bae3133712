//! Ports and the handles that connect them.

use std::fmt;

use shadegen_core::{Type, Value};

/// Arena index of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a graph within one generation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u32);

/// Where a value comes from: a node output or a graph input socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Node { node: NodeId, output: usize },
    Socket(usize),
}

/// Where a value goes: a node input or a graph output socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sink {
    Node { node: NodeId, input: usize },
    Socket(usize),
}

/// A typed port on a node, a graph socket, or a stage variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPort {
    pub name: String,
    pub ty: Type,
    pub value: Option<Value>,
    /// Document path of the element this port was created from.
    pub path: String,
    /// Identifier this port is emitted as.
    pub variable: String,
    /// Upstream source, for inputs and output sockets.
    pub connection: Option<Source>,
    /// Downstream sinks, for outputs and input sockets.
    pub connections: Vec<Sink>,
    /// Channel swizzle applied to the upstream value.
    pub channels: Option<String>,
    /// Default geometric property used when the port is unconnected.
    pub geomprop: Option<String>,
    pub colorspace: Option<String>,
    pub unit: Option<String>,
    pub unittype: Option<String>,
    /// Name of the graph interface input this port is bound to.
    pub interface_name: Option<String>,
    pub uniform: bool,
}

impl ShaderPort {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        let name = name.into();
        Self {
            variable: name.clone(),
            name,
            ty,
            value: None,
            path: String::new(),
            connection: None,
            connections: Vec::new(),
            channels: None,
            geomprop: None,
            colorspace: None,
            unit: None,
            unittype: None,
            interface_name: None,
            uniform: false,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The value as a string literal, when it is one.
    pub fn string_value(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }
}
