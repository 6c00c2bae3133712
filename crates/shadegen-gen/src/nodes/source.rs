//! Nodes implemented by a function in a library source file.

use std::path::PathBuf;

use shadegen_core::{ContentHash, Implementation};
use shadegen_syntax::CallStyle;

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::{emit_output_defaults, input_expression, output_declaration, output_variable, result_variable};
use crate::graph::{Classification, ShaderGraph, ShaderNode};
use crate::stage::ShaderStage;

/// A library function. The source file is read when the implementation is
/// created, so a missing file fails before anything is emitted.
#[derive(Debug)]
pub struct SourceCodeNode {
    name: String,
    function: String,
    path: PathBuf,
    source: String,
    hash: ContentHash,
}

impl SourceCodeNode {
    pub fn load(implementation: &Implementation, ctx: &GenContext) -> Result<Self> {
        let file = implementation.file.as_deref().unwrap_or_default();
        let missing = || GenError::MissingSourceFile {
            file: file.to_string(),
            implementation: implementation.name.clone(),
        };
        let path = ctx.search_path.find(file, None).ok_or_else(missing)?;
        let source = std::fs::read_to_string(&path).map_err(|_| missing())?;
        let function = implementation
            .function
            .clone()
            .unwrap_or_else(|| implementation.name.clone());
        log::trace!("loaded '{}' for {}", path.display(), implementation.name);
        Ok(Self {
            name: implementation.name.clone(),
            // Identical sources are emitted once, whichever nodedef uses them.
            hash: ContentHash::of_text(&source),
            function,
            path,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn emit_function_definition(&self, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
        if !stage.claim_function(self.hash) {
            return Ok(());
        }
        stage.add_block(&self.source, &self.path, &ctx.search_path)?;
        stage.new_line();
        Ok(())
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let syntax = ctx.syntax();
        let mut function = self.function.clone();
        let mut args = Vec::new();

        if ctx.target().is_hw() && node.has_classification(Classification::CLOSURE) {
            if let Some(closure) = ctx.closure_context() {
                if !node.supports_closure(closure.kind) {
                    return emit_output_defaults(graph, node, ctx, stage);
                }
                function.push_str(&closure.suffix);
                args.extend(closure.arguments.iter().map(|(_, name)| name.clone()));
            }
        }

        for index in 0..node.inputs.len() {
            args.push(input_expression(graph, node, index, ctx)?);
        }

        match syntax.call_style {
            CallStyle::OutParams => {
                for index in 0..node.outputs.len() {
                    let default = syntax.default_value(node.outputs[index].ty, false)?;
                    let decl = output_declaration(graph, node, index, ctx)?;
                    stage.add_line(&format!("{decl} = {default}"), true);
                    args.push(output_variable(graph, node, index, ctx)?);
                }
                stage.add_line(&format!("{function}({})", args.join(", ")), true);
            }
            CallStyle::ReturnValue => {
                let call = format!("{function}({})", args.join(", "));
                match result_variable(graph, node, ctx) {
                    Some(result) => {
                        stage.add_line(&format!("auto {result} = {call}"), true);
                    }
                    None => {
                        let decl = output_declaration(graph, node, 0, ctx)?;
                        stage.add_line(&format!("{decl} = {call}"), true);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_syntax::Target;

    #[test]
    fn missing_file_fails_at_load() {
        let ctx = GenContext::new(Target::Glsl);
        let imp = Implementation::new("IM_noise_genglsl", "ND_noise").with_file("mx_noise.glsl", "mx_noise");
        let err = SourceCodeNode::load(&imp, &ctx).unwrap_err();
        assert!(err.is_missing_source());
        assert!(err.to_string().contains("mx_noise.glsl"));
    }

    #[test]
    fn identical_sources_share_a_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.glsl"), "void mx_a(out float r) { r = 1.0; }\n").unwrap();
        std::fs::write(dir.path().join("b.glsl"), "void mx_a(out float r) { r = 1.0; }\n").unwrap();
        let mut ctx = GenContext::new(Target::Glsl);
        ctx.search_path.push(dir.path());

        let a = SourceCodeNode::load(&Implementation::new("IM_a", "ND_a").with_file("a.glsl", "mx_a"), &ctx).unwrap();
        let b = SourceCodeNode::load(&Implementation::new("IM_b", "ND_b").with_file("b.glsl", "mx_a"), &ctx).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.function(), "mx_a");

        let mut stage = ShaderStage::new(crate::stage::PIXEL_STAGE);
        a.emit_function_definition(&mut ctx, &mut stage).unwrap();
        b.emit_function_definition(&mut ctx, &mut stage).unwrap();
        assert_eq!(stage.code().matches("void mx_a").count(), 1);
    }
}
