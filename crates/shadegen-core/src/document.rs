//! The typed document tree the compiler reads.
//!
//! A document holds node definitions, their implementations per target,
//! node graphs (compound definitions or free-standing material graphs),
//! geometric property and unit definitions, and top-level nodes/outputs.
//! It is never mutated by shader generation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};
use crate::types::Type;

/// An input or output declaration, on a nodedef, node instance or graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    /// Literal value in document string form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Upstream node this port connects to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodename: Option<String>,
    /// Output of the upstream node, when it has several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Graph interface input this port connects to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfacename: Option<String>,
    /// Channel swizzle applied to the upstream value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaultgeomprop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unittype: Option<String>,
    #[serde(default)]
    pub uniform: bool,
}

impl PortDecl {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            value: None,
            nodename: None,
            output: None,
            interfacename: None,
            channels: None,
            defaultgeomprop: None,
            colorspace: None,
            unit: None,
            unittype: None,
            uniform: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Connect to the default output of the named node.
    pub fn with_node(mut self, nodename: impl Into<String>) -> Self {
        self.nodename = Some(nodename.into());
        self
    }

    /// Connect to a specific output of the named node.
    pub fn with_node_output(mut self, nodename: impl Into<String>, output: impl Into<String>) -> Self {
        self.nodename = Some(nodename.into());
        self.output = Some(output.into());
        self
    }

    pub fn with_interface(mut self, interfacename: impl Into<String>) -> Self {
        self.interfacename = Some(interfacename.into());
        self
    }

    pub fn with_channels(mut self, channels: impl Into<String>) -> Self {
        self.channels = Some(channels.into());
        self
    }

    pub fn with_default_geomprop(mut self, geomprop: impl Into<String>) -> Self {
        self.defaultgeomprop = Some(geomprop.into());
        self
    }

    pub fn with_colorspace(mut self, colorspace: impl Into<String>) -> Self {
        self.colorspace = Some(colorspace.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_unittype(mut self, unittype: impl Into<String>) -> Self {
        self.unittype = Some(unittype.into());
        self
    }

    pub fn as_uniform(mut self) -> Self {
        self.uniform = true;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.nodename.is_some() || self.interfacename.is_some()
    }
}

/// A node definition: the interface of a node category for given types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    /// Node category, e.g. `constant` or `image`.
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodegroup: Option<String>,
    /// Scattering mode of a BSDF definition: `R`, `T` or both when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bsdf: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortDecl>,
    #[serde(default)]
    pub outputs: Vec<PortDecl>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            nodegroup: None,
            bsdf: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_nodegroup(mut self, nodegroup: impl Into<String>) -> Self {
        self.nodegroup = Some(nodegroup.into());
        self
    }

    pub fn with_bsdf(mut self, bsdf: impl Into<String>) -> Self {
        self.bsdf = Some(bsdf.into());
        self
    }

    pub fn with_input(mut self, input: PortDecl) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: PortDecl) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn input(&self, name: &str) -> Option<&PortDecl> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDecl> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// The single output type, or `multioutput` when there are several.
    pub fn output_type(&self) -> Type {
        match self.outputs.as_slice() {
            [single] => single.ty,
            [] => Type::None,
            _ => Type::MultiOutput,
        }
    }
}

/// A source implementation of a nodedef for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub nodedef: String,
    /// Target name such as `genglsl`; absent means any target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Source file, resolved against the search path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Function name inside the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Inline expression template with `{{input}}` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcecode: Option<String>,
}

impl Implementation {
    pub fn new(name: impl Into<String>, nodedef: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodedef: nodedef.into(),
            target: None,
            file: None,
            function: None,
            sourcecode: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>, function: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self.function = Some(function.into());
        self
    }

    pub fn with_sourcecode(mut self, sourcecode: impl Into<String>) -> Self {
        self.sourcecode = Some(sourcecode.into());
        self
    }
}

/// A node instance inside a graph or at document level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
    pub name: String,
    /// Node category.
    pub node: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodedef: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortDecl>,
}

impl NodeInstance {
    pub fn new(name: impl Into<String>, node: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            ty: Some(ty),
            nodedef: None,
            inputs: Vec::new(),
        }
    }

    pub fn with_nodedef(mut self, nodedef: impl Into<String>) -> Self {
        self.nodedef = Some(nodedef.into());
        self
    }

    pub fn with_input(mut self, input: PortDecl) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn input(&self, name: &str) -> Option<&PortDecl> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

/// A graph of nodes with named outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGraph {
    pub name: String,
    /// Nodedef this graph implements, making it a compound implementation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodedef: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeInstance>,
    #[serde(default)]
    pub outputs: Vec<PortDecl>,
}

impl NodeGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodedef: None,
            nodes: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_nodedef(mut self, nodedef: impl Into<String>) -> Self {
        self.nodedef = Some(nodedef.into());
        self
    }

    pub fn with_node(mut self, node: NodeInstance) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_output(mut self, output: PortDecl) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn node(&self, name: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDecl> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// A named geometric property (texture coordinates, normals, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomPropDef {
    pub name: String,
    /// Geometric node category producing the data, e.g. `texcoord`.
    pub geomprop: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
}

/// A unit within a unit type, with its scale relative to the type's base unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDef {
    pub name: String,
    pub scale: f32,
}

/// A family of convertible units such as `distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeDef {
    pub name: String,
    #[serde(default)]
    pub units: Vec<UnitDef>,
}

impl UnitTypeDef {
    pub fn unit_index(&self, name: &str) -> Option<usize> {
        self.units.iter().position(|u| u.name == name)
    }
}

/// An implementation found for a nodedef.
#[derive(Debug, Clone, Copy)]
pub enum ImplementationRef<'a> {
    Source(&'a Implementation),
    Graph(&'a NodeGraph),
}

impl ImplementationRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            ImplementationRef::Source(i) => &i.name,
            ImplementationRef::Graph(g) => &g.name,
        }
    }
}

/// A document element a shader can be generated from.
#[derive(Debug, Clone, Copy)]
pub enum ElementRef<'a> {
    /// A single output, top-level or inside a graph.
    Output {
        graph: Option<&'a NodeGraph>,
        output: &'a PortDecl,
    },
    /// Every output of a graph.
    NodeGraph(&'a NodeGraph),
    /// A top-level node, typically a shader or material node.
    Node(&'a NodeInstance),
}

/// The root of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Working color space of the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<String>,
    pub nodedefs: Vec<NodeDef>,
    pub implementations: Vec<Implementation>,
    pub nodegraphs: Vec<NodeGraph>,
    pub geomprops: Vec<GeomPropDef>,
    pub unittypes: Vec<UnitTypeDef>,
    pub nodes: Vec<NodeInstance>,
    pub outputs: Vec<PortDecl>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document from a `.json` or `.toml` file.
    pub fn load(path: &Path) -> Result<Document> {
        if !path.exists() {
            return Err(DocumentError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let doc = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => {
                return Err(DocumentError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        log::debug!(
            "loaded {}: {} nodedefs, {} implementations, {} nodegraphs",
            path.display(),
            doc.nodedefs.len(),
            doc.implementations.len(),
            doc.nodegraphs.len()
        );
        Ok(doc)
    }

    pub fn from_json_str(json: &str) -> Result<Document> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Document> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Append the definitions of another document (a library) to this one.
    pub fn import_library(&mut self, library: &Document) {
        for nd in &library.nodedefs {
            if self.nodedef(&nd.name).is_some() {
                log::warn!("library redefines nodedef '{}'; the first definition wins", nd.name);
            }
        }
        self.nodedefs.extend(library.nodedefs.iter().cloned());
        self.implementations
            .extend(library.implementations.iter().cloned());
        self.nodegraphs.extend(library.nodegraphs.iter().cloned());
        self.geomprops.extend(library.geomprops.iter().cloned());
        self.unittypes.extend(library.unittypes.iter().cloned());
        if self.colorspace.is_none() {
            self.colorspace = library.colorspace.clone();
        }
    }

    pub fn nodedef(&self, name: &str) -> Option<&NodeDef> {
        self.nodedefs.iter().find(|n| n.name == name)
    }

    pub fn nodegraph(&self, name: &str) -> Option<&NodeGraph> {
        self.nodegraphs.iter().find(|g| g.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDecl> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn geomprop(&self, name: &str) -> Option<&GeomPropDef> {
        self.geomprops.iter().find(|g| g.name == name)
    }

    pub fn unit_type(&self, name: &str) -> Option<&UnitTypeDef> {
        self.unittypes.iter().find(|u| u.name == name)
    }

    /// Find the nodedef for a node instance.
    ///
    /// An explicit `nodedef` reference wins. Otherwise the first nodedef of
    /// the same category whose output type matches and which declares every
    /// input the instance sets, with the same types, is chosen.
    pub fn nodedef_for(&self, node: &NodeInstance) -> Result<&NodeDef> {
        let not_found = || DocumentError::NodeDefNotFound {
            node: node.name.clone(),
        };
        if let Some(name) = &node.nodedef {
            return self.nodedef(name).ok_or_else(not_found);
        }
        self.nodedefs
            .iter()
            .find(|nd| {
                nd.node == node.node
                    && node.ty.map_or(true, |ty| nd.output_type() == ty)
                    && node.inputs.iter().all(|i| {
                        nd.input(&i.name).is_some_and(|decl| decl.ty == i.ty)
                    })
            })
            .ok_or_else(not_found)
    }

    /// Find the implementation of a nodedef for a target.
    ///
    /// Source implementations naming the target win over untargeted ones;
    /// a node graph declaring the nodedef is the fallback.
    pub fn implementation_for(&self, nodedef: &NodeDef, target: &str) -> Option<ImplementationRef<'_>> {
        let candidates = || self.implementations.iter().filter(|i| i.nodedef == nodedef.name);
        candidates()
            .find(|i| i.target.as_deref() == Some(target))
            .or_else(|| candidates().find(|i| i.target.is_none()))
            .map(ImplementationRef::Source)
            .or_else(|| {
                self.nodegraphs
                    .iter()
                    .find(|g| g.nodedef.as_deref() == Some(nodedef.name.as_str()))
                    .map(ImplementationRef::Graph)
            })
    }

    /// Resolve an element path: `graph/output`, a graph name, a top-level
    /// output name, or a top-level node name.
    pub fn resolve(&self, path: &str) -> Result<ElementRef<'_>> {
        let not_found = || DocumentError::ElementNotFound {
            path: path.to_string(),
        };
        if let Some((graph_name, output_name)) = path.split_once('/') {
            let graph = self.nodegraph(graph_name).ok_or_else(not_found)?;
            let output = graph.output(output_name).ok_or_else(not_found)?;
            return Ok(ElementRef::Output {
                graph: Some(graph),
                output,
            });
        }
        if let Some(graph) = self.nodegraph(path) {
            return Ok(ElementRef::NodeGraph(graph));
        }
        if let Some(output) = self.output(path) {
            return Ok(ElementRef::Output {
                graph: None,
                output,
            });
        }
        self.node(path).map(ElementRef::Node).ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_library() -> Document {
        let mut doc = Document::new();
        doc.nodedefs.push(
            NodeDef::new("ND_add_float", "add")
                .with_input(PortDecl::new("in1", Type::Float).with_value("0.0"))
                .with_input(PortDecl::new("in2", Type::Float).with_value("0.0"))
                .with_output(PortDecl::new("out", Type::Float)),
        );
        doc.nodedefs.push(
            NodeDef::new("ND_add_color3", "add")
                .with_input(PortDecl::new("in1", Type::Color3).with_value("0, 0, 0"))
                .with_input(PortDecl::new("in2", Type::Color3).with_value("0, 0, 0"))
                .with_output(PortDecl::new("out", Type::Color3)),
        );
        doc.implementations.push(
            Implementation::new("IM_add_float_genglsl", "ND_add_float")
                .with_target("genglsl")
                .with_sourcecode("{{in1}} + {{in2}}"),
        );
        doc.implementations.push(
            Implementation::new("IM_add_float", "ND_add_float")
                .with_file("mx_add.src", "mx_add_float"),
        );
        doc
    }

    #[test]
    fn nodedef_lookup_by_category_and_type() {
        let doc = make_library();
        let node = NodeInstance::new("add1", "add", Type::Color3)
            .with_input(PortDecl::new("in1", Type::Color3).with_value("1, 0, 0"));
        assert_eq!(doc.nodedef_for(&node).unwrap().name, "ND_add_color3");
    }

    #[test]
    fn nodedef_lookup_fails_for_unknown_category() {
        let doc = make_library();
        let node = NodeInstance::new("n", "mystery", Type::Float);
        assert!(matches!(
            doc.nodedef_for(&node),
            Err(DocumentError::NodeDefNotFound { node }) if node == "n"
        ));
    }

    #[test]
    fn targeted_implementation_wins() {
        let doc = make_library();
        let nd = doc.nodedef("ND_add_float").unwrap();
        let glsl = doc.implementation_for(nd, "genglsl").unwrap();
        assert_eq!(glsl.name(), "IM_add_float_genglsl");
        let osl = doc.implementation_for(nd, "genosl").unwrap();
        assert_eq!(osl.name(), "IM_add_float");
    }

    #[test]
    fn graph_implementation_is_fallback() {
        let mut doc = make_library();
        doc.nodegraphs
            .push(NodeGraph::new("NG_add_color3").with_nodedef("ND_add_color3"));
        let nd = doc.nodedef("ND_add_color3").unwrap();
        assert!(matches!(
            doc.implementation_for(nd, "genglsl"),
            Some(ImplementationRef::Graph(g)) if g.name == "NG_add_color3"
        ));
    }

    #[test]
    fn resolve_element_forms() {
        let mut doc = make_library();
        doc.nodegraphs.push(
            NodeGraph::new("NG_main").with_output(PortDecl::new("out", Type::Float)),
        );
        doc.outputs.push(PortDecl::new("top", Type::Float));
        doc.nodes.push(NodeInstance::new("shader1", "add", Type::Float));

        assert!(matches!(doc.resolve("NG_main/out"), Ok(ElementRef::Output { graph: Some(_), .. })));
        assert!(matches!(doc.resolve("NG_main"), Ok(ElementRef::NodeGraph(_))));
        assert!(matches!(doc.resolve("top"), Ok(ElementRef::Output { graph: None, .. })));
        assert!(matches!(doc.resolve("shader1"), Ok(ElementRef::Node(_))));
        assert!(matches!(
            doc.resolve("NG_main/missing"),
            Err(DocumentError::ElementNotFound { .. })
        ));
    }

    #[test]
    fn json_and_toml_loading() {
        let json = r#"{
            "nodedefs": [{
                "name": "ND_constant_float", "node": "constant",
                "inputs": [{"name": "value", "type": "float", "value": "0.0"}],
                "outputs": [{"name": "out", "type": "float"}]
            }]
        }"#;
        let doc = Document::from_json_str(json).unwrap();
        assert_eq!(doc.nodedefs[0].output_type(), Type::Float);

        let toml_src = r#"
            colorspace = "lin_rec709"
            [[nodedefs]]
            name = "ND_constant_color3"
            node = "constant"
            inputs = [{ name = "value", type = "color3", value = "0, 0, 0" }]
            outputs = [{ name = "out", type = "color3" }]
        "#;
        let doc = Document::from_toml_str(toml_src).unwrap();
        assert_eq!(doc.colorspace.as_deref(), Some("lin_rec709"));
        assert_eq!(doc.nodedefs[0].inputs[0].ty, Type::Color3);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.json");
        std::fs::write(&path, r#"{"colorspace": "srgb_texture"}"#).unwrap();
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.colorspace.as_deref(), Some("srgb_texture"));

        let bad = dir.path().join("lib.xml");
        std::fs::write(&bad, "<materialx/>").unwrap();
        assert!(matches!(
            Document::load(&bad),
            Err(DocumentError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            Document::load(&dir.path().join("missing.json")),
            Err(DocumentError::NotFound { .. })
        ));
    }
}
