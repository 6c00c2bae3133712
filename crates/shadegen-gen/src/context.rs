//! Per-run generation state.
//!
//! A [`GenContext`] lives for one generation call. It owns every piece of
//! mutable state emission needs (the implementation cache, closure context
//! stack, bound light shaders, name-suffix overrides) so independent
//! contexts can run on separate threads without sharing anything.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shadegen_core::{Document, NodeDef, Type};
use shadegen_syntax::{Syntax, Target};

use crate::error::{GenError, Result};
use crate::graph::{GraphId, NodeId};
use crate::nodes::{self, ShaderNodeImpl};
use crate::options::GenOptions;

/// Ordered list of directories source files are resolved against.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    paths: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn pop(&mut self) -> Option<PathBuf> {
        self.paths.pop()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Resolve `file`: absolute paths as given, then relative to
    /// `relative_to`, then against each search directory, most recently
    /// pushed first.
    pub fn find(&self, file: &str, relative_to: Option<&Path>) -> Option<PathBuf> {
        let path = Path::new(file);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        relative_to
            .map(|dir| dir.join(path))
            .into_iter()
            .chain(self.paths.iter().rev().map(|dir| dir.join(path)))
            .find(|candidate| candidate.is_file())
    }
}

/// Direction a closure is evaluated in on hardware targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureKind {
    Reflection,
    Transmission,
    Indirect,
    Emission,
}

impl ClosureKind {
    pub const ALL: [ClosureKind; 4] = [
        ClosureKind::Reflection,
        ClosureKind::Transmission,
        ClosureKind::Indirect,
        ClosureKind::Emission,
    ];
}

/// Evaluation mode of closure functions: the extra leading arguments and
/// the function name suffix of the matching variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureContext {
    pub kind: ClosureKind,
    pub arguments: Vec<(Type, String)>,
    pub suffix: String,
}

impl ClosureContext {
    pub fn new(kind: ClosureKind) -> Self {
        let (arguments, suffix): (&[(Type, &str)], &str) = match kind {
            ClosureKind::Reflection => (
                &[
                    (Type::Vector3, "L"),
                    (Type::Vector3, "V"),
                    (Type::Vector3, "P"),
                    (Type::Float, "occlusion"),
                ],
                "_reflection",
            ),
            ClosureKind::Transmission => (&[(Type::Vector3, "V")], "_transmission"),
            ClosureKind::Indirect => (&[(Type::Vector3, "V")], "_indirect"),
            ClosureKind::Emission => (&[(Type::Vector3, "N"), (Type::Vector3, "V")], ""),
        };
        Self {
            kind,
            arguments: arguments
                .iter()
                .map(|(ty, name)| (*ty, name.to_string()))
                .collect(),
            suffix: suffix.to_string(),
        }
    }
}

/// A port of a node in a specific graph, for suffix overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortKey {
    pub graph: GraphId,
    pub node: NodeId,
    pub port: usize,
}

/// A light shader made available to surface shading under a type id.
#[derive(Debug, Clone)]
pub struct LightBinding {
    pub type_id: u32,
    pub nodedef: NodeDef,
    pub implementation: Arc<ShaderNodeImpl>,
}

type UserData = Arc<dyn Any + Send + Sync>;

/// State for one generation run.
pub struct GenContext {
    target: Target,
    syntax: Arc<Syntax>,
    pub options: GenOptions,
    pub search_path: SearchPath,
    implementations: HashMap<String, Arc<ShaderNodeImpl>>,
    in_progress: Vec<String>,
    closure_contexts: Vec<ClosureContext>,
    light_shaders: BTreeMap<u32, LightBinding>,
    user_data: HashMap<String, Vec<UserData>>,
    input_suffixes: HashMap<PortKey, String>,
    output_suffixes: HashMap<PortKey, String>,
    next_graph_id: u32,
}

impl GenContext {
    pub fn new(target: Target) -> Self {
        Self::with_options(target, GenOptions::default())
    }

    pub fn with_options(target: Target, options: GenOptions) -> Self {
        Self {
            target,
            syntax: Arc::new(target.syntax()),
            options,
            search_path: SearchPath::new(),
            implementations: HashMap::new(),
            in_progress: Vec::new(),
            closure_contexts: Vec::new(),
            light_shaders: BTreeMap::new(),
            user_data: HashMap::new(),
            input_suffixes: HashMap::new(),
            output_suffixes: HashMap::new(),
            next_graph_id: 0,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Shared handle to the active target's syntax.
    pub fn syntax(&self) -> Arc<Syntax> {
        Arc::clone(&self.syntax)
    }

    pub fn next_graph_id(&mut self) -> GraphId {
        let id = GraphId(self.next_graph_id);
        self.next_graph_id += 1;
        id
    }

    // Implementation cache.

    pub fn find_implementation(&self, name: &str) -> Option<Arc<ShaderNodeImpl>> {
        self.implementations.get(name).cloned()
    }

    /// Register an implementation. The first registration of a name wins.
    pub fn add_implementation(&mut self, name: &str, implementation: Arc<ShaderNodeImpl>) -> Arc<ShaderNodeImpl> {
        Arc::clone(
            self.implementations
                .entry(name.to_string())
                .or_insert(implementation),
        )
    }

    pub fn implementation_count(&self) -> usize {
        self.implementations.len()
    }

    /// Mark an implementation as being built, failing if it already is:
    /// a compound whose graph instantiates itself.
    pub(crate) fn begin_implementation(&mut self, name: &str) -> Result<()> {
        if let Some(first) = self.in_progress.iter().position(|n| n == name) {
            let mut path = self.in_progress[first..].to_vec();
            path.push(name.to_string());
            return Err(GenError::FoundCycle { path });
        }
        self.in_progress.push(name.to_string());
        Ok(())
    }

    pub(crate) fn end_implementation(&mut self, name: &str) {
        if let Some(pos) = self.in_progress.iter().rposition(|n| n == name) {
            self.in_progress.remove(pos);
        }
    }

    // Closure contexts.

    pub fn push_closure_context(&mut self, context: ClosureContext) {
        self.closure_contexts.push(context);
    }

    pub fn pop_closure_context(&mut self) -> Option<ClosureContext> {
        self.closure_contexts.pop()
    }

    pub fn closure_context(&self) -> Option<&ClosureContext> {
        self.closure_contexts.last()
    }

    // Light shaders.

    /// Make a light shader nodedef available under `type_id`.
    pub fn bind_light_shader(&mut self, doc: &Document, nodedef: &NodeDef, type_id: u32) -> Result<()> {
        if nodedef.output_type() != Type::LightShader {
            return Err(GenError::InvalidNode {
                node: nodedef.name.clone(),
                reason: "only lightshader nodedefs can be bound as light shaders".into(),
            });
        }
        if let Some(existing) = self.light_shaders.get(&type_id) {
            return Err(GenError::generation(format!(
                "Error binding light shader '{}': type id {type_id} is already bound to '{}'",
                nodedef.name, existing.nodedef.name
            )));
        }
        let implementation = nodes::create_implementation(doc, nodedef, &nodedef.name, self)?;
        log::debug!("bound light shader '{}' to type id {type_id}", nodedef.name);
        self.light_shaders.insert(
            type_id,
            LightBinding {
                type_id,
                nodedef: nodedef.clone(),
                implementation,
            },
        );
        Ok(())
    }

    pub fn unbind_light_shader(&mut self, type_id: u32) -> Option<LightBinding> {
        self.light_shaders.remove(&type_id)
    }

    pub fn unbind_light_shaders(&mut self) {
        self.light_shaders.clear();
    }

    /// Bound light shaders ordered by type id.
    pub fn light_shaders(&self) -> impl Iterator<Item = &LightBinding> {
        self.light_shaders.values()
    }

    // User data.

    pub fn push_user_data(&mut self, name: &str, data: UserData) {
        self.user_data.entry(name.to_string()).or_default().push(data);
    }

    pub fn pop_user_data(&mut self, name: &str) {
        if let Some(stack) = self.user_data.get_mut(name) {
            stack.pop();
            if stack.is_empty() {
                self.user_data.remove(name);
            }
        }
    }

    /// Most recently pushed data under `name`, if it has type `T`.
    pub fn user_data<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let data = self.user_data.get(name)?.last()?;
        Arc::clone(data).downcast::<T>().ok()
    }

    // Name suffixes.

    pub fn add_input_suffix(&mut self, key: PortKey, suffix: impl Into<String>) {
        self.input_suffixes.insert(key, suffix.into());
    }

    pub fn remove_input_suffix(&mut self, key: PortKey) {
        self.input_suffixes.remove(&key);
    }

    pub fn input_suffix(&self, key: PortKey) -> &str {
        self.input_suffixes.get(&key).map_or("", String::as_str)
    }

    pub fn add_output_suffix(&mut self, key: PortKey, suffix: impl Into<String>) {
        self.output_suffixes.insert(key, suffix.into());
    }

    pub fn remove_output_suffix(&mut self, key: PortKey) {
        self.output_suffixes.remove(&key);
    }

    pub fn output_suffix(&self, key: PortKey) -> &str {
        self.output_suffixes.get(&key).map_or("", String::as_str)
    }
}
