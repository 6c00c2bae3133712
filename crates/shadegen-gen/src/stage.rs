//! Source text emission for one shader stage.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use shadegen_core::ContentHash;
use shadegen_syntax::Syntax;

use crate::context::SearchPath;
use crate::error::{GenError, Result};
use crate::graph::ShaderPort;

pub const VERTEX_STAGE: &str = "vertex";
pub const PIXEL_STAGE: &str = "pixel";

/// Names of the variable blocks stages carry.
pub mod block {
    pub const CONSTANTS: &str = "Constants";
    pub const PRIVATE_UNIFORMS: &str = "PrivateUniforms";
    pub const PUBLIC_UNIFORMS: &str = "PublicUniforms";
    pub const VERTEX_INPUTS: &str = "VertexInputs";
    pub const VERTEX_DATA: &str = "VertexData";
    pub const PIXEL_OUTPUTS: &str = "PixelOutputs";
    pub const LIGHT_DATA: &str = "LightData";
}

const INDENT: &str = "    ";

/// An ordered, name-unique set of variables.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBlock {
    pub name: String,
    /// Instance name the block is accessed through, e.g. `vd`.
    pub instance: String,
    variables: Vec<ShaderPort>,
    index: HashMap<String, usize>,
}

impl VariableBlock {
    pub fn new(name: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: instance.into(),
            variables: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a variable. Adding a name that exists returns the existing entry
    /// unchanged.
    pub fn add(&mut self, port: ShaderPort) -> &mut ShaderPort {
        let index = match self.index.get(&port.name) {
            Some(index) => *index,
            None => {
                self.index.insert(port.name.clone(), self.variables.len());
                self.variables.push(port);
                self.variables.len() - 1
            }
        };
        &mut self.variables[index]
    }

    pub fn get(&self, name: &str) -> Option<&ShaderPort> {
        self.index.get(name).map(|i| &self.variables[*i])
    }

    /// Variable access expression: `vd.normalWorld` or plain `u_time`.
    pub fn access(&self, name: &str) -> Result<String> {
        let port = self.get(name).ok_or_else(|| GenError::VariableNotFound {
            variable: name.to_string(),
            block: self.name.clone(),
        })?;
        Ok(if self.instance.is_empty() {
            port.variable.clone()
        } else {
            format!("{}.{}", self.instance, port.variable)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderPort> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Kind of bracket a scope is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brackets {
    Braces,
    Parentheses,
    Squares,
}

impl Brackets {
    fn open(self) -> &'static str {
        match self {
            Brackets::Braces => "{",
            Brackets::Parentheses => "(",
            Brackets::Squares => "[",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Brackets::Braces => "}",
            Brackets::Parentheses => ")",
            Brackets::Squares => "]",
        }
    }
}

/// One stage of a shader: an append-only text buffer with indentation and
/// scope tracking, its variable blocks, and the set of function
/// definitions and include files already emitted into it.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    pub name: String,
    /// Name of the stage entry point.
    pub function_name: String,
    code: String,
    indent: usize,
    scopes: Vec<Brackets>,
    blocks: Vec<VariableBlock>,
    functions: HashSet<ContentHash>,
    includes: HashSet<PathBuf>,
    assigned: HashSet<String>,
}

impl ShaderStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function_name: "main".to_string(),
            code: String::new(),
            indent: 0,
            scopes: Vec::new(),
            blocks: Vec::new(),
            functions: HashSet::new(),
            includes: HashSet::new(),
            assigned: HashSet::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }

    // Variable blocks.

    /// Create a block, or return the existing block of that name.
    pub fn create_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        let index = match self.blocks.iter().position(|b| b.name == name) {
            Some(index) => index,
            None => {
                self.blocks.push(VariableBlock::new(name, instance));
                self.blocks.len() - 1
            }
        };
        &mut self.blocks[index]
    }

    pub fn block(&self, name: &str) -> Result<&VariableBlock> {
        self.blocks
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| GenError::BlockNotFound {
                block: name.to_string(),
                stage: self.name.clone(),
            })
    }

    pub fn block_mut(&mut self, name: &str) -> Result<&mut VariableBlock> {
        let stage = &self.name;
        self.blocks
            .iter_mut()
            .find(|b| b.name == name)
            .ok_or_else(|| GenError::BlockNotFound {
                block: name.to_string(),
                stage: stage.clone(),
            })
    }

    pub fn blocks(&self) -> &[VariableBlock] {
        &self.blocks
    }

    // Text.

    pub fn add_string(&mut self, text: &str) {
        self.code.push_str(text);
    }

    pub fn begin_line(&mut self) {
        for _ in 0..self.indent {
            self.code.push_str(INDENT);
        }
    }

    pub fn end_line(&mut self, semicolon: bool) {
        if semicolon {
            self.code.push(';');
        }
        self.code.push('\n');
    }

    pub fn new_line(&mut self) {
        self.code.push('\n');
    }

    /// Add an indented line, terminated by a semicolon when asked.
    pub fn add_line(&mut self, line: &str, semicolon: bool) {
        self.begin_line();
        self.code.push_str(line);
        self.end_line(semicolon);
    }

    pub fn add_comment(&mut self, comment: &str) {
        self.begin_line();
        self.code.push_str("// ");
        self.code.push_str(comment);
        self.code.push('\n');
    }

    pub fn begin_scope(&mut self, brackets: Brackets) {
        self.add_line(brackets.open(), false);
        self.indent += 1;
        self.scopes.push(brackets);
    }

    /// Close the innermost scope. Closing with no scope open is an error.
    pub fn end_scope(&mut self, semicolon: bool) -> Result<()> {
        let brackets = self.scopes.pop().ok_or(GenError::ScopeUnderflow)?;
        self.indent = self.indent.saturating_sub(1);
        self.add_line(brackets.close(), semicolon);
        Ok(())
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Add source text line by line at the current indentation. `#include`
    /// directives are resolved against `from` and the search path and
    /// inlined once per stage.
    pub fn add_block(&mut self, text: &str, from: &Path, search_path: &SearchPath) -> Result<()> {
        for line in text.lines() {
            match parse_include(line) {
                Some(file) => {
                    let resolved = search_path.find(file, from.parent()).ok_or_else(|| {
                        GenError::IncludeNotFound {
                            file: file.to_string(),
                            from: from.display().to_string(),
                        }
                    })?;
                    self.add_include(&resolved, search_path)?;
                }
                None if line.is_empty() => self.new_line(),
                None => self.add_line(line, false),
            }
        }
        Ok(())
    }

    /// Add the contents of a file unless it was added to this stage before.
    pub fn add_include(&mut self, path: &Path, search_path: &SearchPath) -> Result<()> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.includes.insert(key) {
            return Ok(());
        }
        let text = std::fs::read_to_string(path)?;
        log::trace!("including {} in stage {}", path.display(), self.name);
        self.add_block(&text, path, search_path)
    }

    /// Claim a function definition. Returns false if a definition with the
    /// same identity was already emitted, in which case nothing is emitted.
    pub fn claim_function(&mut self, hash: ContentHash) -> bool {
        let claimed = self.functions.insert(hash);
        if !claimed {
            log::trace!("function {} already defined in {}", hash.short(), self.name);
        }
        claimed
    }

    /// Mark a variable as assigned. Returns false if it already was.
    pub fn mark_assigned(&mut self, variable: &str) -> bool {
        self.assigned.insert(variable.to_string())
    }

    /// Declare every variable of a block, one per line:
    /// `<qualifier> <type> <name>[ = <value>];`
    pub fn declare_variables(&mut self, block: &str, qualifier: &str, syntax: &Syntax, assign_values: bool) -> Result<()> {
        let lines = {
            let block = self.block(block)?;
            let mut lines = Vec::with_capacity(block.len());
            for port in block.iter() {
                lines.push(variable_declaration(port, qualifier, syntax, assign_values)?);
            }
            lines
        };
        for line in lines {
            self.add_line(&line, true);
        }
        Ok(())
    }
}

/// Declaration of a single variable, without the trailing semicolon.
pub fn variable_declaration(port: &ShaderPort, qualifier: &str, syntax: &Syntax, assign_value: bool) -> Result<String> {
    let ty_name = syntax.type_name(port.ty)?;
    let mut decl = String::new();
    if !qualifier.is_empty() {
        decl.push_str(qualifier);
        decl.push(' ');
    }
    let array_len = port.value.as_ref().and_then(|v| v.array_len());
    match array_len {
        Some(len) if port.ty.is_array() => {
            decl.push_str(&syntax.array_variable(ty_name, &port.variable, &len.to_string()));
        }
        _ => {
            decl.push_str(ty_name);
            decl.push(' ');
            decl.push_str(&port.variable);
        }
    }
    if assign_value {
        let value = match &port.value {
            Some(value) => syntax.value(port.ty, value, true)?,
            None => syntax.default_value(port.ty, true)?.to_string(),
        };
        if !value.is_empty() {
            decl.push_str(" = ");
            decl.push_str(&value);
        }
    }
    Ok(decl)
}

fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')))?;
    Some(inner)
}
