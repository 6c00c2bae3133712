//! The result of a generation call.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use shadegen_core::{content_hash, hash_hex};
use shadegen_syntax::Target;

use crate::error::Result;
use crate::graph::ShaderPort;
use crate::stage::{block, ShaderStage};

/// A generated shader: one finished stage per stage name of the target.
#[derive(Debug)]
pub struct Shader {
    pub name: String,
    pub target: Target,
    stages: Vec<ShaderStage>,
    has_transparency: bool,
}

/// A uniform an application binds before drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformInfo {
    pub name: String,
    pub variable: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Shader {
    pub fn new(name: &str, target: Target, stages: Vec<ShaderStage>, has_transparency: bool) -> Self {
        Self {
            name: name.to_string(),
            target,
            stages,
            has_transparency,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&ShaderStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn source_code(&self, stage: &str) -> Option<&str> {
        self.stage(stage).map(ShaderStage::code)
    }

    pub fn has_transparency(&self) -> bool {
        self.has_transparency
    }

    /// Public uniforms of all stages, each once, in stage order.
    pub fn uniforms(&self) -> Vec<&ShaderPort> {
        let mut seen = HashSet::new();
        self.stages
            .iter()
            .filter_map(|stage| stage.block(block::PUBLIC_UNIFORMS).ok())
            .flat_map(|b| b.iter())
            .filter(|port| seen.insert(port.variable.as_str()))
            .collect()
    }

    /// The public uniforms as plain records, for printing or JSON.
    pub fn interface(&self) -> Vec<UniformInfo> {
        self.uniforms()
            .into_iter()
            .map(|port| UniformInfo {
                name: port.name.clone(),
                variable: port.variable.clone(),
                ty: port.ty.name().to_string(),
                value: port.value.as_ref().map(|v| v.value_string()),
                path: port.path.clone(),
            })
            .collect()
    }

    /// Digest over every stage's source, in stage order.
    pub fn fingerprint(&self) -> String {
        let sources: Vec<(&str, &str)> = self.stages.iter().map(|s| (s.name.as_str(), s.code())).collect();
        hash_hex(&content_hash(&sources))
    }

    /// Write each stage to `<dir>/<name>.<stage>.<ext>`.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let extension = self.target.syntax().source_extension.clone();
        let mut written = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let path = dir.join(format!("{}.{}.{extension}", self.name, stage.name));
            std::fs::write(&path, stage.code())?;
            log::debug!("wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
