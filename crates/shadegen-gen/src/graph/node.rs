//! Shader nodes, their classification and conditional scope.

use std::collections::BTreeSet;
use std::sync::Arc;

use shadegen_core::{NodeDef, PortDecl, Type, Value};

use super::port::{NodeId, ShaderPort};
use crate::context::ClosureKind;
use crate::error::Result;
use crate::nodes::ShaderNodeImpl;

bitflags::bitflags! {
    /// What a node computes, used to order emission and handle closures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Classification: u32 {
        /// Computes a plain value.
        const TEXTURE = 1 << 0;
        /// Computes a BSDF, EDF or VDF.
        const CLOSURE = 1 << 1;
        /// Computes a shader.
        const SHADER = 1 << 2;
        /// Samples a texture file.
        const FILETEXTURE = 1 << 3;
        /// Selects between inputs at runtime.
        const CONDITIONAL = 1 << 4;
        const CONSTANT = 1 << 5;
        const BSDF = 1 << 6;
        /// BSDF with reflection only.
        const BSDF_R = 1 << 7;
        /// BSDF with transmission only.
        const BSDF_T = 1 << 8;
        const EDF = 1 << 9;
        const VDF = 1 << 10;
        const SURFACE = 1 << 11;
        const VOLUME = 1 << 12;
        const LIGHT = 1 << 13;
        /// Two-way conditional with branches on inputs 2 and 3.
        const IFELSE = 1 << 14;
        /// N-way conditional selected by `which`.
        const SWITCH = 1 << 15;
        const SAMPLE2D = 1 << 16;
        const SAMPLE3D = 1 << 17;
        const CONVOLUTION2D = 1 << 18;
        const COLORSPACE_TRANSFORM = 1 << 19;
        /// Pass-through node.
        const DOT = 1 << 20;
        /// Never bypassed by optimization.
        const DO_NOT_OPTIMIZE = 1 << 21;
    }
}

const IFELSE_CATEGORIES: &[&str] = &["compare", "ifgreater", "ifgreatereq", "ifequal"];

impl Classification {
    /// Classify a node from its definition.
    pub fn from_nodedef(nodedef: &NodeDef) -> Self {
        let mut class = match nodedef.output_type() {
            Type::Bsdf => {
                let mut c = Classification::CLOSURE | Classification::BSDF;
                match nodedef.bsdf.as_deref() {
                    Some("R") => c |= Classification::BSDF_R,
                    Some("T") => c |= Classification::BSDF_T,
                    _ => {}
                }
                c
            }
            Type::Edf => Classification::CLOSURE | Classification::EDF,
            Type::Vdf => Classification::CLOSURE | Classification::VDF,
            Type::SurfaceShader | Type::Material => Classification::SHADER | Classification::SURFACE,
            Type::VolumeShader => Classification::SHADER | Classification::VOLUME,
            Type::LightShader => Classification::SHADER | Classification::LIGHT,
            Type::DisplacementShader => Classification::SHADER,
            _ => Classification::TEXTURE,
        };

        let category = nodedef.node.as_str();
        if category == "constant" {
            class |= Classification::CONSTANT;
        } else if category == "dot" {
            class |= Classification::DOT;
        } else if IFELSE_CATEGORIES.contains(&category) {
            class |= Classification::CONDITIONAL | Classification::IFELSE;
        } else if category == "switch" {
            class |= Classification::CONDITIONAL | Classification::SWITCH;
        }

        match nodedef.nodegroup.as_deref() {
            Some("texture2d") | Some("procedural2d") => class |= Classification::SAMPLE2D,
            Some("texture3d") | Some("procedural3d") => class |= Classification::SAMPLE3D,
            Some("convolution2d") => class |= Classification::CONVOLUTION2D,
            Some("colortransform") => class |= Classification::COLORSPACE_TRANSFORM,
            _ => {}
        }

        let has_filename = nodedef.inputs.iter().any(|i| i.ty == Type::Filename);
        if category == "image" || (has_filename && class.contains(Classification::SAMPLE2D)) {
            class |= Classification::FILETEXTURE | Classification::SAMPLE2D;
        }
        if has_filename && class.intersects(Classification::CONSTANT | Classification::DOT) {
            class |= Classification::DO_NOT_OPTIMIZE;
        }
        class
    }

    /// Whether a closure of this class takes part in evaluation under
    /// `kind`.
    pub fn supports_closure(self, kind: ClosureKind) -> bool {
        if self.contains(Classification::BSDF) {
            let reflection = !self.contains(Classification::BSDF_T);
            let transmission = !self.contains(Classification::BSDF_R);
            match kind {
                ClosureKind::Reflection | ClosureKind::Indirect => reflection,
                ClosureKind::Transmission => transmission,
                ClosureKind::Emission => false,
            }
        } else if self.contains(Classification::EDF) {
            kind == ClosureKind::Emission
        } else {
            false
        }
    }
}

/// Kind of scope a node is emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeKind {
    #[default]
    Unknown,
    /// Used unconditionally.
    Global,
    /// Used only by branches of a single conditional node.
    Single,
    /// Used by branches of several conditionals.
    Multiple,
}

/// Which conditional branches use a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeInfo {
    pub kind: ScopeKind,
    pub conditional_node: Option<NodeId>,
    /// One bit per conditional input index that uses the node.
    pub condition_bitmask: u32,
    /// Bits of every branch input of the conditional node.
    pub full_condition_mask: u32,
}

impl ScopeInfo {
    pub fn global() -> Self {
        Self {
            kind: ScopeKind::Global,
            ..Self::default()
        }
    }

    /// Narrow this scope on its way through branch input `branch` of a
    /// conditional node.
    pub fn adjust_at_conditional_input(&mut self, conditional: NodeId, branch: usize, full_mask: u32) {
        let all_branches =
            self.kind == ScopeKind::Single && self.condition_bitmask == self.full_condition_mask;
        if self.kind == ScopeKind::Global || all_branches {
            self.kind = ScopeKind::Single;
            self.conditional_node = Some(conditional);
            self.condition_bitmask = 1 << branch;
            self.full_condition_mask = full_mask;
        } else if self.kind == ScopeKind::Single {
            self.kind = ScopeKind::Multiple;
            self.conditional_node = None;
        }
    }

    /// Combine the scope of another use of the same node.
    pub fn merge(&mut self, from: &ScopeInfo) {
        if self.kind == ScopeKind::Unknown || from.kind == ScopeKind::Global {
            *self = *from;
        } else if self.kind == ScopeKind::Global {
            // Already needed everywhere.
        } else if self.kind == ScopeKind::Single
            && from.kind == ScopeKind::Single
            && self.conditional_node == from.conditional_node
        {
            self.condition_bitmask |= from.condition_bitmask;
            if self.condition_bitmask == self.full_condition_mask {
                *self = ScopeInfo::global();
            }
        } else {
            self.kind = ScopeKind::Multiple;
            self.conditional_node = None;
        }
    }

    /// Whether the branch input `branch` of `conditional` is this node's
    /// only use.
    pub fn used_by_branch(&self, conditional: NodeId, branch: usize) -> bool {
        self.kind == ScopeKind::Single
            && self.conditional_node == Some(conditional)
            && self.condition_bitmask == 1 << branch
    }
}

/// A node in a shader graph.
#[derive(Debug, Clone)]
pub struct ShaderNode {
    pub id: NodeId,
    pub name: String,
    /// Node category, e.g. `image`.
    pub category: String,
    /// Name of the nodedef this node instantiates.
    pub nodedef: String,
    pub classification: Classification,
    pub inputs: Vec<ShaderPort>,
    pub outputs: Vec<ShaderPort>,
    pub implementation: Arc<ShaderNodeImpl>,
    pub scope: ScopeInfo,
    /// Closure nodes upstream of this shader node.
    pub used_closures: BTreeSet<NodeId>,
    /// Local holding the result struct of a multi-output call.
    pub result_variable: Option<String>,
}

impl ShaderNode {
    /// Create an unattached node with the ports of `nodedef`. `path` is the
    /// document path of the instance the node comes from.
    pub fn from_nodedef(
        name: &str,
        nodedef: &NodeDef,
        implementation: Arc<ShaderNodeImpl>,
        path: &str,
    ) -> Result<Self> {
        let port = |decl: &PortDecl| port_from_decl(decl, path);
        Ok(Self {
            id: NodeId(0),
            name: name.to_string(),
            category: nodedef.node.clone(),
            nodedef: nodedef.name.clone(),
            classification: Classification::from_nodedef(nodedef),
            inputs: nodedef.inputs.iter().map(port).collect::<Result<_>>()?,
            outputs: nodedef.outputs.iter().map(port).collect::<Result<_>>()?,
            implementation,
            scope: ScopeInfo::default(),
            used_closures: BTreeSet::new(),
            result_variable: None,
        })
    }

    pub fn has_classification(&self, class: Classification) -> bool {
        self.classification.contains(class)
    }

    pub fn input(&self, name: &str) -> Option<&ShaderPort> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ShaderPort> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    /// Whether the node is only used inside branches of one conditional and
    /// is emitted there instead of in the enclosing body.
    pub fn referenced_conditionally(&self) -> bool {
        self.scope.kind == ScopeKind::Single && self.scope.condition_bitmask != 0
    }

    /// Closure context participation for BSDF/EDF nodes.
    pub fn supports_closure(&self, kind: ClosureKind) -> bool {
        self.classification.supports_closure(kind)
    }
}

/// A port carrying the declaration's type, default value and metadata.
pub(crate) fn port_from_decl(decl: &PortDecl, path: &str) -> Result<ShaderPort> {
    let mut port = ShaderPort::new(&decl.name, decl.ty);
    if let Some(text) = &decl.value {
        port.value = Some(Value::parse(decl.ty, text)?);
    }
    port.path = if path.is_empty() {
        decl.name.clone()
    } else {
        format!("{path}/{}", decl.name)
    };
    port.geomprop = decl.defaultgeomprop.clone();
    port.colorspace = decl.colorspace.clone();
    port.unit = decl.unit.clone();
    port.unittype = decl.unittype.clone();
    port.uniform = decl.uniform;
    Ok(port)
}


#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::PortDecl;

    fn make_nodedef(node: &str, out: Type) -> NodeDef {
        NodeDef::new(format!("ND_{node}"), node).with_output(PortDecl::new("out", out))
    }

    #[test]
    fn classify_closures() {
        let nd = make_nodedef("diffuse_bsdf", Type::Bsdf).with_bsdf("R");
        let class = Classification::from_nodedef(&nd);
        assert!(class.contains(Classification::CLOSURE | Classification::BSDF | Classification::BSDF_R));
        assert!(!class.contains(Classification::TEXTURE));
    }

    #[test]
    fn classify_textures_and_conditionals() {
        let image = make_nodedef("image", Type::Color3)
            .with_input(PortDecl::new("file", Type::Filename))
            .with_nodegroup("texture2d");
        let class = Classification::from_nodedef(&image);
        assert!(class.contains(Classification::TEXTURE | Classification::FILETEXTURE | Classification::SAMPLE2D));

        let compare = make_nodedef("compare", Type::Float);
        assert!(Classification::from_nodedef(&compare).contains(Classification::IFELSE));

        let dot = make_nodedef("dot", Type::Filename)
            .with_input(PortDecl::new("in", Type::Filename));
        assert!(Classification::from_nodedef(&dot).contains(Classification::DO_NOT_OPTIMIZE));
    }

    #[test]
    fn scope_merge_of_all_branches_becomes_global() {
        let cond = NodeId(7);
        let mut a = ScopeInfo::global();
        a.adjust_at_conditional_input(cond, 2, 0xC);
        let mut b = ScopeInfo::global();
        b.adjust_at_conditional_input(cond, 3, 0xC);
        assert!(a.used_by_branch(cond, 2));

        let mut merged = ScopeInfo::default();
        merged.merge(&a);
        assert_eq!(merged.kind, ScopeKind::Single);
        merged.merge(&b);
        assert_eq!(merged.kind, ScopeKind::Global);
    }

    #[test]
    fn nested_conditionals_become_multiple() {
        let mut scope = ScopeInfo::global();
        scope.adjust_at_conditional_input(NodeId(1), 2, 0xC);
        scope.adjust_at_conditional_input(NodeId(2), 3, 0xC);
        assert_eq!(scope.kind, ScopeKind::Multiple);

        let mut other = ScopeInfo::global();
        other.adjust_at_conditional_input(NodeId(3), 2, 0xC);
        let mut single = ScopeInfo::global();
        single.adjust_at_conditional_input(NodeId(1), 2, 0xC);
        single.merge(&other);
        assert_eq!(single.kind, ScopeKind::Multiple);
    }
}
