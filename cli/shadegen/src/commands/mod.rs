//! CLI command implementations.

pub mod generate;
pub mod targets;
pub mod validate;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use shadegen_core::Document;
use shadegen_gen::{GenContext, GenOptions, ShaderInterfaceType};
use shadegen_syntax::Target;

/// What to generate, shared by `generate` and `validate`.
#[derive(Debug, Clone)]
pub struct Request {
    pub document: PathBuf,
    pub element: String,
    pub target: String,
    pub options: Option<PathBuf>,
    pub search_path: Vec<PathBuf>,
    pub interface: Option<String>,
    /// `<nodedef>=<type id>` light bindings.
    pub lights: Vec<String>,
}

impl Request {
    pub fn new(document: impl Into<PathBuf>, element: &str, target: &str) -> Self {
        Self {
            document: document.into(),
            element: element.to_string(),
            target: target.to_string(),
            options: None,
            search_path: Vec::new(),
            interface: None,
            lights: Vec::new(),
        }
    }

    /// Load the document and set up a context: options, search path
    /// (the given directories, then the document's own directory) and
    /// light bindings.
    pub fn prepare(&self) -> Result<(Document, GenContext)> {
        let target: Target = self.target.parse().context("invalid --target")?;
        let doc = Document::load(&self.document)
            .with_context(|| format!("loading {}", self.document.display()))?;
        log::debug!(
            "loaded {}: {} nodedefs, {} nodegraphs",
            self.document.display(),
            doc.nodedefs.len(),
            doc.nodegraphs.len()
        );

        let mut options = match &self.options {
            Some(path) => GenOptions::load(path).with_context(|| format!("reading {}", path.display()))?,
            None => GenOptions::default(),
        };
        if let Some(interface) = &self.interface {
            options.shader_interface_type = match interface.as_str() {
                "complete" => ShaderInterfaceType::Complete,
                "reduced" => ShaderInterfaceType::Reduced,
                other => bail!("unknown interface '{other}': expected complete or reduced"),
            };
        }

        let mut ctx = GenContext::with_options(target, options);
        for dir in &self.search_path {
            ctx.search_path.push(dir);
        }
        if let Some(parent) = self.document.parent() {
            ctx.search_path.push(parent);
        }
        for binding in &self.lights {
            let (nodedef, id) = binding
                .split_once('=')
                .with_context(|| format!("light binding '{binding}' is not <nodedef>=<id>"))?;
            let id: u32 = id
                .parse()
                .with_context(|| format!("light type id '{id}' is not a number"))?;
            let nodedef = doc
                .nodedef(nodedef)
                .with_context(|| format!("no nodedef named '{nodedef}'"))?
                .clone();
            ctx.bind_light_shader(&doc, &nodedef, id)
                .with_context(|| format!("binding light '{}'", nodedef.name))?;
            log::debug!("bound light '{}' to type id {id}", nodedef.name);
        }
        Ok((doc, ctx))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// A document with one constant color routed to output `out`.
    pub fn write_document(dir: &Path) -> PathBuf {
        let path = dir.join("doc.json");
        let json = r#"{
            "nodedefs": [
                {
                    "name": "ND_constant_color3",
                    "node": "constant",
                    "inputs": [{ "name": "value", "type": "color3", "value": "0, 0, 0" }],
                    "outputs": [{ "name": "out", "type": "color3" }]
                }
            ],
            "implementations": [
                { "name": "IM_constant_color3", "nodedef": "ND_constant_color3", "sourcecode": "{{value}}" }
            ],
            "nodes": [
                {
                    "name": "c",
                    "node": "constant",
                    "type": "color3",
                    "inputs": [{ "name": "value", "type": "color3", "value": "0.1, 0.2, 0.3" }]
                }
            ],
            "outputs": [{ "name": "out", "type": "color3", "nodename": "c" }]
        }"#;
        std::fs::write(&path, json).unwrap();
        path
    }
}
