//! Building shader graphs from document elements.
//!
//! Construction runs in two phases: every node instance reachable from the
//! requested outputs is created first, then inputs are wired. Wiring after
//! creation lets a cycle in the document reach the topological sort, which
//! reports it, instead of recursing forever here.
//!
//! After wiring, helper nodes are inserted for inputs that need a derived
//! value: color space transforms, unit conversions and default geometric
//! properties.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use shadegen_core::{Document, ElementRef, NodeDef, NodeGraph, NodeInstance, PortDecl, Type, Value};

use super::node::port_from_decl;
use super::{GraphKind, NodeId, ShaderGraph, ShaderNode, ShaderPort, Sink, Source};
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::nodes::{create_implementation, unit};

const DISTANCE: &str = "distance";

/// Build the root graph for a resolved element.
pub fn create(doc: &Document, element: ElementRef<'_>, name: &str, ctx: &mut GenContext) -> Result<ShaderGraph> {
    let mut graph = ShaderGraph::new(ctx.next_graph_id(), name, GraphKind::Root);
    let builder = match element {
        ElementRef::Output { graph: scope, output } => {
            let builder = Builder::new(doc, scope);
            builder.add_interface(&mut graph)?;
            builder.add_nodes(&mut graph, std::slice::from_ref(output), ctx)?;
            builder.add_output_socket(&mut graph, output)?;
            builder
        }
        ElementRef::NodeGraph(nodegraph) => {
            let builder = Builder::new(doc, Some(nodegraph));
            builder.add_interface(&mut graph)?;
            builder.add_nodes(&mut graph, &nodegraph.outputs, ctx)?;
            for output in &nodegraph.outputs {
                builder.add_output_socket(&mut graph, output)?;
            }
            builder
        }
        ElementRef::Node(instance) => {
            let builder = Builder::new(doc, None);
            let outputs = builder.shader_outputs(instance)?;
            builder.add_nodes(&mut graph, &outputs, ctx)?;
            for output in &outputs {
                builder.add_output_socket(&mut graph, output)?;
            }
            builder
        }
    };
    builder.add_helpers(&mut graph, ctx)?;
    log::debug!(
        "built graph '{name}': {} nodes, {} inputs, {} outputs",
        graph.node_count(),
        graph.input_sockets().len(),
        graph.output_sockets().len()
    );
    Ok(graph)
}

/// Build the body graph of a compound node: sockets from the nodedef,
/// nodes from the node graph.
pub(crate) fn create_compound(
    doc: &Document,
    nodegraph: &NodeGraph,
    nodedef: &NodeDef,
    ctx: &mut GenContext,
) -> Result<ShaderGraph> {
    let mut graph = ShaderGraph::new(ctx.next_graph_id(), &nodegraph.name, GraphKind::Compound);
    graph.nodedef = Some(nodedef.name.clone());
    for input in &nodedef.inputs {
        graph.add_input_socket(port_from_decl(input, &nodegraph.name)?)?;
    }

    // Sockets follow the nodedef so callers and the body agree on the
    // order of results.
    let mut outputs = Vec::with_capacity(nodedef.outputs.len());
    for decl in &nodedef.outputs {
        let output = nodegraph.output(&decl.name).ok_or_else(|| GenError::InvalidNode {
            node: nodegraph.name.clone(),
            reason: format!("no output named '{}' for nodedef '{}'", decl.name, nodedef.name),
        })?;
        outputs.push(output.clone());
    }

    let builder = Builder::new(doc, Some(nodegraph));
    builder.add_nodes(&mut graph, &outputs, ctx)?;
    for output in &outputs {
        builder.add_output_socket(&mut graph, output)?;
    }
    builder.add_helpers(&mut graph, ctx)?;
    Ok(graph)
}

/// Helpers inserted so far while finishing one graph.
#[derive(Default)]
struct Helpers {
    /// Node inputs already fed by a transform.
    converted: HashSet<(NodeId, usize)>,
    /// Node outputs already routed through a transform.
    converted_outputs: HashSet<(NodeId, usize)>,
    /// Shared geometric property nodes by property name.
    geom: HashMap<String, NodeId>,
}

/// `base`, or `base` with the first counter that no node in `graph` uses.
fn unique_node_name(graph: &ShaderGraph, base: &str) -> String {
    if graph.node_id(base).is_none() {
        return base.to_string();
    }
    let mut count = 1;
    loop {
        let candidate = format!("{base}{count}");
        if graph.node_id(&candidate).is_none() {
            return candidate;
        }
        count += 1;
    }
}

struct Builder<'a> {
    doc: &'a Document,
    /// Graph the instances live in; top level when `None`.
    scope: Option<&'a NodeGraph>,
}

impl<'a> Builder<'a> {
    fn new(doc: &'a Document, scope: Option<&'a NodeGraph>) -> Self {
        Self { doc, scope }
    }

    fn instances(&self) -> &'a [NodeInstance] {
        match self.scope {
            Some(nodegraph) => &nodegraph.nodes,
            None => &self.doc.nodes,
        }
    }

    fn instance(&self, name: &str) -> Result<&'a NodeInstance> {
        self.instances()
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| GenError::UnknownElement {
                name: self.path(name),
            })
    }

    fn path(&self, name: &str) -> String {
        match self.scope {
            Some(nodegraph) => format!("{}/{name}", nodegraph.name),
            None => name.to_string(),
        }
    }

    fn nodedef(&self, instance: &NodeInstance) -> Result<&'a NodeDef> {
        self.doc
            .nodedef_for(instance)
            .map_err(|_| GenError::NodeDefNotFound {
                node: self.path(&instance.name),
                nodedef: instance.nodedef.clone().unwrap_or_else(|| match instance.ty {
                    Some(ty) => format!("{} ({ty})", instance.node),
                    None => instance.node.clone(),
                }),
            })
    }

    /// Input sockets for a node graph that publishes a nodedef interface.
    fn add_interface(&self, graph: &mut ShaderGraph) -> Result<()> {
        let Some(nodegraph) = self.scope else {
            return Ok(());
        };
        let Some(nodedef) = nodegraph.nodedef.as_deref().and_then(|nd| self.doc.nodedef(nd)) else {
            return Ok(());
        };
        graph.nodedef = Some(nodedef.name.clone());
        for input in &nodedef.inputs {
            graph.add_input_socket(port_from_decl(input, &nodegraph.name)?)?;
        }
        Ok(())
    }

    /// Outputs of a top-level shader node, as if declared on the document.
    fn shader_outputs(&self, instance: &NodeInstance) -> Result<Vec<PortDecl>> {
        let nodedef = self.nodedef(instance)?;
        Ok(nodedef
            .outputs
            .iter()
            .map(|o| PortDecl::new(&o.name, o.ty).with_node_output(&instance.name, &o.name))
            .collect())
    }

    /// Create every instance reachable from `outputs`, then wire them.
    fn add_nodes(&self, graph: &mut ShaderGraph, outputs: &[PortDecl], ctx: &mut GenContext) -> Result<()> {
        let mut reachable = BTreeSet::new();
        let mut queue: VecDeque<&str> = outputs.iter().filter_map(|o| o.nodename.as_deref()).collect();
        while let Some(name) = queue.pop_front() {
            if !reachable.insert(name.to_string()) {
                continue;
            }
            let instance = self.instance(name)?;
            queue.extend(instance.inputs.iter().filter_map(|i| i.nodename.as_deref()));
        }

        // Document order keeps node ids, and so emission order, stable.
        let instances: Vec<&NodeInstance> = self
            .instances()
            .iter()
            .filter(|n| reachable.contains(&n.name))
            .collect();
        for instance in &instances {
            let nodedef = self.nodedef(instance)?;
            let implementation = create_implementation(self.doc, nodedef, &instance.name, ctx)?;
            let node = ShaderNode::from_nodedef(&instance.name, nodedef, implementation, &self.path(&instance.name))?;
            graph.add_node(node)?;
        }
        for instance in &instances {
            self.wire(graph, instance)?;
        }
        Ok(())
    }

    fn wire(&self, graph: &mut ShaderGraph, instance: &NodeInstance) -> Result<()> {
        let id = graph.node_id(&instance.name).ok_or_else(|| GenError::UnknownElement {
            name: self.path(&instance.name),
        })?;
        for decl in &instance.inputs {
            let input = graph.node(id)?.input_index(&decl.name).ok_or_else(|| GenError::InvalidNode {
                node: instance.name.clone(),
                reason: format!("its nodedef has no input named '{}'", decl.name),
            })?;
            let port = &mut graph.node_mut(id)?.inputs[input];
            if let Some(text) = &decl.value {
                port.value = Some(Value::parse(port.ty, text)?);
            }
            if decl.channels.is_some() {
                port.channels = decl.channels.clone();
            }
            if decl.colorspace.is_some() {
                port.colorspace = decl.colorspace.clone();
            }
            if decl.unit.is_some() {
                port.unit = decl.unit.clone();
            }
            port.interface_name = decl.interfacename.clone();

            let sink = Sink::Node { node: id, input };
            if let Some(source) = self.source(graph, decl)? {
                graph.connect(source, sink)?;
            }
        }
        Ok(())
    }

    /// Where a declared input or output reads from, if connected.
    fn source(&self, graph: &ShaderGraph, decl: &PortDecl) -> Result<Option<Source>> {
        if let Some(nodename) = &decl.nodename {
            let node = graph.node_by_name(nodename).ok_or_else(|| GenError::UnknownElement {
                name: self.path(nodename),
            })?;
            let output = match &decl.output {
                Some(output) => node.output_index(output).ok_or_else(|| GenError::UnknownElement {
                    name: format!("{}.{output}", self.path(nodename)),
                })?,
                None => 0,
            };
            return Ok(Some(Source::Node { node: node.id, output }));
        }
        if let Some(interface) = &decl.interfacename {
            let socket = graph
                .input_socket_index(interface)
                .ok_or_else(|| GenError::UnknownElement {
                    name: self.path(interface),
                })?;
            return Ok(Some(Source::Socket(socket)));
        }
        Ok(None)
    }

    fn add_output_socket(&self, graph: &mut ShaderGraph, output: &PortDecl) -> Result<()> {
        let mut socket = ShaderPort::new(&output.name, output.ty);
        socket.path = self.path(&output.name);
        socket.channels = output.channels.clone();
        if let Some(text) = &output.value {
            socket.value = Some(Value::parse(output.ty, text)?);
        }
        let source = self.source(graph, output)?;
        let index = graph.add_output_socket(socket)?;
        if let Some(source) = source {
            graph.connect(source, Sink::Socket(index))?;
        }
        Ok(())
    }

    fn add_helpers(&self, graph: &mut ShaderGraph, ctx: &mut GenContext) -> Result<()> {
        let mut helpers = Helpers::default();
        for id in graph.node_ids() {
            self.add_color_transforms(graph, id, &mut helpers, ctx)?;
            self.add_unit_transforms(graph, id, &mut helpers, ctx)?;
            self.add_default_geom_nodes(graph, id, &mut helpers, ctx)?;
        }
        if graph.kind == GraphKind::Root {
            self.add_socket_geom_nodes(graph, &mut helpers, ctx)?;
        }
        Ok(())
    }

    fn working_color_space(&self, ctx: &GenContext) -> Option<String> {
        ctx.options
            .target_color_space_override
            .clone()
            .or_else(|| self.doc.colorspace.clone())
    }

    /// Nodedef converting between two color spaces, if the library has one.
    fn color_transform(&self, from: &str, to: &str, ty: Type) -> Option<&'a NodeDef> {
        let name = format!("ND_{from}_to_{to}_{ty}");
        let found = self.doc.nodedef(&name);
        if found.is_none() {
            log::warn!("no color transform '{name}'; leaving '{from}' values unconverted");
        }
        found
    }

    /// Create a helper node named after `name` and return its id. The name
    /// gets a counter when a node already uses it.
    fn add_helper(&self, graph: &mut ShaderGraph, name: &str, nodedef: &NodeDef, ctx: &mut GenContext) -> Result<NodeId> {
        let name = &unique_node_name(graph, name);
        let implementation = create_implementation(self.doc, nodedef, name, ctx)?;
        let node = ShaderNode::from_nodedef(name, nodedef, implementation, &self.path(name))?;
        log::debug!("inserted helper node '{name}' ({})", nodedef.name);
        graph.add_node(node)
    }

    fn add_color_transforms(
        &self,
        graph: &mut ShaderGraph,
        id: NodeId,
        helpers: &mut Helpers,
        ctx: &mut GenContext,
    ) -> Result<()> {
        let Some(target) = self.working_color_space(ctx) else {
            return Ok(());
        };
        let node = graph.node(id)?;
        let node_name = node.name.clone();
        let filetexture = node.has_classification(super::Classification::FILETEXTURE);

        let pending: Vec<(usize, String, Type)> = node
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, port)| matches!(port.ty, Type::Color3 | Type::Color4) && !port.is_connected())
            .filter_map(|(index, port)| Some((index, port.colorspace.clone()?, port.ty)))
            .filter(|(_, from, _)| !from.is_empty() && *from != target)
            .collect();
        for (input, from, ty) in pending {
            if helpers.converted.contains(&(id, input)) {
                continue;
            }
            let Some(nodedef) = self.color_transform(&from, &target, ty) else {
                continue;
            };
            let input_name = graph.node(id)?.inputs[input].name.clone();
            let helper_name = format!("{node_name}_{input_name}_cm");
            let helper = self.add_helper(graph, &helper_name, nodedef, ctx)?;
            let value = graph.node(id)?.inputs[input].value.clone();
            if let Some(port) = graph.node_mut(helper)?.inputs.first_mut() {
                port.value = value;
            }
            graph.connect(Source::Node { node: helper, output: 0 }, Sink::Node { node: id, input })?;
            helpers.converted.insert((id, input));
        }

        if !filetexture || helpers.converted_outputs.contains(&(id, 0)) {
            return Ok(());
        }
        let node = graph.node(id)?;
        let from = node
            .inputs
            .iter()
            .find(|p| p.ty == Type::Filename)
            .and_then(|p| p.colorspace.clone())
            .filter(|from| !from.is_empty() && *from != target);
        let Some(from) = from else {
            return Ok(());
        };
        let Some(output) = node.outputs.first() else {
            return Ok(());
        };
        if !matches!(output.ty, Type::Color3 | Type::Color4) {
            return Ok(());
        }
        let helper_name = format!("{node_name}_{}_cm", output.name);
        let downstream = output.connections.clone();
        let Some(nodedef) = self.color_transform(&from, &target, output.ty) else {
            return Ok(());
        };
        let helper = self.add_helper(graph, &helper_name, nodedef, ctx)?;
        for sink in downstream {
            graph.disconnect(sink)?;
            graph.connect(Source::Node { node: helper, output: 0 }, sink)?;
        }
        graph.connect(Source::Node { node: id, output: 0 }, Sink::Node { node: helper, input: 0 })?;
        helpers.converted_outputs.insert((id, 0));
        Ok(())
    }

    fn add_unit_transforms(
        &self,
        graph: &mut ShaderGraph,
        id: NodeId,
        helpers: &mut Helpers,
        ctx: &mut GenContext,
    ) -> Result<()> {
        let Some(target) = ctx.options.target_distance_unit.clone() else {
            return Ok(());
        };
        let node = graph.node(id)?;
        let node_name = node.name.clone();
        let pending: Vec<(usize, String, String, Type)> = node
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, port)| !port.is_connected() && unit::TYPES.contains(&port.ty))
            .filter_map(|(index, port)| Some((index, port.unit.clone()?, port.unittype.clone()?, port.ty)))
            .filter(|(_, from, unittype, _)| unittype == DISTANCE && *from != target)
            .collect();

        for (input, from, unittype, ty) in pending {
            if helpers.converted.contains(&(id, input)) {
                continue;
            }
            let Some(unittype) = self.doc.unit_type(&unittype) else {
                log::warn!("unknown unit type '{unittype}' on '{node_name}'");
                continue;
            };
            let (Some(from_index), Some(to_index)) = (unittype.unit_index(&from), unittype.unit_index(&target)) else {
                log::warn!("unknown {} unit converting '{from}' to '{target}' on '{node_name}'", unittype.name);
                continue;
            };
            let input_name = graph.node(id)?.inputs[input].name.clone();
            let helper_name = unique_node_name(graph, &format!("{node_name}_{input_name}_unit"));
            let nodedef = unit::nodedef(unittype, ty);
            let implementation = unit::implementation(ctx, unittype, ty);
            let mut helper = ShaderNode::from_nodedef(&helper_name, &nodedef, implementation, &self.path(&helper_name))?;
            let value = graph.node(id)?.inputs[input].value.clone();
            for port in helper.inputs.iter_mut() {
                match port.name.as_str() {
                    "in" => port.value = value.clone(),
                    "unit_from" => port.value = Some(Value::Integer(from_index as i32)),
                    "unit_to" => port.value = Some(Value::Integer(to_index as i32)),
                    _ => {}
                }
            }
            let helper = graph.add_node(helper)?;
            log::debug!("inserted unit conversion '{helper_name}' from '{from}' to '{target}'");
            graph.connect(Source::Node { node: helper, output: 0 }, Sink::Node { node: id, input })?;
            helpers.converted.insert((id, input));
        }
        Ok(())
    }

    /// The shared node producing geometric property `name` as `ty`,
    /// created on first use.
    fn geom_node(
        &self,
        graph: &mut ShaderGraph,
        name: &str,
        ty: Type,
        helpers: &mut Helpers,
        ctx: &mut GenContext,
    ) -> Result<Option<NodeId>> {
        if let Some(&existing) = helpers.geom.get(name) {
            return Ok(Some(existing));
        }
        let helper_name = format!("geomprop_{name}");
        let Some(geomprop) = self.doc.geomprop(name) else {
            log::warn!("unknown default geometric property '{name}'");
            return Ok(None);
        };
        let nodedef_name = format!("ND_{}_{ty}", geomprop.geomprop);
        let Some(nodedef) = self.doc.nodedef(&nodedef_name) else {
            log::warn!("no nodedef '{nodedef_name}' for geometric property '{name}'");
            return Ok(None);
        };
        let helper = self.add_helper(graph, &helper_name, nodedef, ctx)?;
        for port in graph.node_mut(helper)?.inputs.iter_mut() {
            match port.name.as_str() {
                "space" => {
                    if let Some(space) = &geomprop.space {
                        port.value = Some(Value::String(space.clone()));
                    }
                }
                "index" => {
                    if let Some(index) = geomprop.index {
                        port.value = Some(Value::Integer(index));
                    }
                }
                "geomprop" => port.value = Some(Value::String(geomprop.name.clone())),
                _ => {}
            }
        }
        helpers.geom.insert(name.to_string(), helper);
        Ok(Some(helper))
    }

    fn add_default_geom_nodes(
        &self,
        graph: &mut ShaderGraph,
        id: NodeId,
        helpers: &mut Helpers,
        ctx: &mut GenContext,
    ) -> Result<()> {
        let pending: Vec<(usize, String, Type)> = graph
            .node(id)?
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, port)| !port.is_connected() && port.value.is_none())
            .filter_map(|(index, port)| Some((index, port.geomprop.clone()?, port.ty)))
            .collect();
        for (input, name, ty) in pending {
            if let Some(helper) = self.geom_node(graph, &name, ty, helpers, ctx)? {
                graph.connect(Source::Node { node: helper, output: 0 }, Sink::Node { node: id, input })?;
            }
        }
        Ok(())
    }

    /// Published inputs with a default geometric property and no value
    /// read the property instead.
    fn add_socket_geom_nodes(&self, graph: &mut ShaderGraph, helpers: &mut Helpers, ctx: &mut GenContext) -> Result<()> {
        let pending: Vec<(String, Type, Vec<Sink>)> = graph
            .input_sockets()
            .iter()
            .filter(|socket| socket.value.is_none() && !socket.connections.is_empty())
            .filter_map(|socket| Some((socket.geomprop.clone()?, socket.ty, socket.connections.clone())))
            .collect();
        for (name, ty, sinks) in pending {
            let Some(helper) = self.geom_node(graph, &name, ty, helpers, ctx)? else {
                continue;
            };
            for sink in sinks {
                graph.disconnect(sink)?;
                graph.connect(Source::Node { node: helper, output: 0 }, sink)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::{GeomPropDef, Implementation, UnitDef, UnitTypeDef};
    use shadegen_syntax::Target;

    fn make_library() -> Document {
        let mut doc = Document::new();
        doc.nodedefs.push(
            NodeDef::new("ND_multiply_color3", "multiply")
                .with_input(PortDecl::new("in1", Type::Color3).with_value("1, 1, 1"))
                .with_input(PortDecl::new("in2", Type::Color3).with_value("1, 1, 1"))
                .with_output(PortDecl::new("out", Type::Color3)),
        );
        doc.nodedefs.push(
            NodeDef::new("ND_srgb_texture_to_lin_rec709_color3", "srgb_texture_to_lin_rec709")
                .with_nodegroup("colortransform")
                .with_input(PortDecl::new("in", Type::Color3).with_value("0, 0, 0"))
                .with_output(PortDecl::new("out", Type::Color3)),
        );
        doc.nodedefs.push(
            NodeDef::new("ND_scale_vector3", "scale")
                .with_input(
                    PortDecl::new("in", Type::Vector3)
                        .with_value("0, 0, 0")
                        .with_unittype(DISTANCE),
                )
                .with_input(PortDecl::new("position", Type::Vector3).with_default_geomprop("Pobject"))
                .with_output(PortDecl::new("out", Type::Vector3)),
        );
        doc.nodedefs.push(
            NodeDef::new("ND_position_vector3", "position")
                .with_input(PortDecl::new("space", Type::String).with_value("object"))
                .with_output(PortDecl::new("out", Type::Vector3)),
        );
        for (imp, nd, code) in [
            ("IM_multiply_color3", "ND_multiply_color3", "{{in1}} * {{in2}}"),
            ("IM_cm", "ND_srgb_texture_to_lin_rec709_color3", "{{in}}"),
            ("IM_scale_vector3", "ND_scale_vector3", "{{in}} * {{position}}"),
            ("IM_position_vector3", "ND_position_vector3", "vec3(0.0)"),
        ] {
            doc.implementations.push(Implementation::new(imp, nd).with_sourcecode(code));
        }
        doc.geomprops.push(GeomPropDef {
            name: "Pobject".into(),
            geomprop: "position".into(),
            ty: Type::Vector3,
            space: Some("object".into()),
            index: None,
        });
        doc.unittypes.push(UnitTypeDef {
            name: DISTANCE.into(),
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
        });
        doc.colorspace = Some("lin_rec709".into());
        doc
    }

    fn make_output(node: &str, ty: Type) -> PortDecl {
        PortDecl::new("out", ty).with_node(node)
    }

    #[test]
    fn only_reachable_nodes_are_created() {
        let mut doc = make_library();
        doc.nodes.push(NodeInstance::new("used", "multiply", Type::Color3));
        doc.nodes.push(NodeInstance::new("unused", "multiply", Type::Color3));
        doc.outputs.push(make_output("used", Type::Color3));

        let mut ctx = GenContext::new(Target::Glsl);
        let graph = create(&doc, doc.resolve("out").unwrap(), "test", &mut ctx).unwrap();
        assert!(graph.node_by_name("used").is_some());
        assert!(graph.node_by_name("unused").is_none());
        assert!(graph.output_sockets()[0].is_connected());
    }

    #[test]
    fn unknown_category_names_the_instance() {
        let mut doc = make_library();
        doc.nodes.push(NodeInstance::new("odd", "mystery", Type::Float));
        doc.outputs.push(make_output("odd", Type::Float));
        let mut ctx = GenContext::new(Target::Glsl);
        let err = create(&doc, doc.resolve("out").unwrap(), "test", &mut ctx).unwrap_err();
        assert!(matches!(err, GenError::NodeDefNotFound { ref node, .. } if node == "odd"));
    }

    #[test]
    fn color_inputs_get_transforms() {
        let mut doc = make_library();
        doc.nodes.push(
            NodeInstance::new("mul", "multiply", Type::Color3).with_input(
                PortDecl::new("in1", Type::Color3)
                    .with_value("0.5, 0.5, 0.5")
                    .with_colorspace("srgb_texture"),
            ),
        );
        doc.outputs.push(make_output("mul", Type::Color3));
        let mut ctx = GenContext::new(Target::Glsl);
        let graph = create(&doc, doc.resolve("out").unwrap(), "test", &mut ctx).unwrap();

        let cm = graph.node_by_name("mul_in1_cm").unwrap();
        assert_eq!(cm.inputs[0].value, Some(Value::Aggregate(vec![0.5, 0.5, 0.5])));
        let mul = graph.node_by_name("mul").unwrap();
        assert_eq!(mul.inputs[0].connection, Some(Source::Node { node: cm.id, output: 0 }));
        assert!(!mul.inputs[1].is_connected());
    }

    #[test]
    fn transforms_survive_colliding_node_names() {
        let mut doc = make_library();
        doc.nodes.push(NodeInstance::new("mul_in1_cm", "multiply", Type::Color3));
        doc.nodes.push(
            NodeInstance::new("mul", "multiply", Type::Color3)
                .with_input(
                    PortDecl::new("in1", Type::Color3)
                        .with_value("0.5, 0.5, 0.5")
                        .with_colorspace("srgb_texture"),
                )
                .with_input(PortDecl::new("in2", Type::Color3).with_node("mul_in1_cm")),
        );
        doc.outputs.push(make_output("mul", Type::Color3));
        let mut ctx = GenContext::new(Target::Glsl);
        let graph = create(&doc, doc.resolve("out").unwrap(), "test", &mut ctx).unwrap();

        let user = graph.node_by_name("mul_in1_cm").unwrap();
        let cm = graph.node_by_name("mul_in1_cm1").unwrap();
        assert_eq!(cm.category, "srgb_texture_to_lin_rec709");
        let mul = graph.node_by_name("mul").unwrap();
        assert_eq!(mul.inputs[0].connection, Some(Source::Node { node: cm.id, output: 0 }));
        assert_eq!(mul.inputs[1].connection, Some(Source::Node { node: user.id, output: 0 }));
    }

    #[test]
    fn units_and_geomprops_insert_shared_helpers() {
        let mut doc = make_library();
        for name in ["s1", "s2"] {
            doc.nodes.push(
                NodeInstance::new(name, "scale", Type::Vector3).with_input(
                    PortDecl::new("in", Type::Vector3)
                        .with_value("1, 2, 3")
                        .with_unit("centimeter"),
                ),
            );
        }
        doc.nodes.push(
            NodeInstance::new("sum", "scale", Type::Vector3)
                .with_input(PortDecl::new("in", Type::Vector3).with_node("s1"))
                .with_input(PortDecl::new("position", Type::Vector3).with_node("s2")),
        );
        doc.outputs.push(make_output("sum", Type::Vector3));

        let mut ctx = GenContext::new(Target::Osl);
        ctx.options.target_distance_unit = Some("meter".into());
        let graph = create(&doc, doc.resolve("out").unwrap(), "test", &mut ctx).unwrap();

        let s1_unit = graph.node_by_name("s1_in_unit").unwrap();
        let s2_unit = graph.node_by_name("s2_in_unit").unwrap();
        assert!(std::sync::Arc::ptr_eq(&s1_unit.implementation, &s2_unit.implementation));
        assert_eq!(s1_unit.input("unit_from").unwrap().value, Some(Value::Integer(1)));
        assert_eq!(s1_unit.input("unit_to").unwrap().value, Some(Value::Integer(0)));

        let geom = graph.node_by_name("geomprop_Pobject").unwrap();
        assert_eq!(geom.outputs[0].connections.len(), 2);
        assert_eq!(geom.input("space").unwrap().string_value(), Some("object"));
    }
}
