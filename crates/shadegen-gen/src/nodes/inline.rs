//! Expression templates substituted at the call site.

use shadegen_core::NodeDef;

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::generator::{input_expression, output_declaration};
use crate::graph::{ShaderGraph, ShaderNode};
use crate::stage::ShaderStage;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    /// Index of the nodedef input substituted here.
    Input(usize),
}

/// An inline implementation such as `{{in1}} + {{in2}}`.
#[derive(Debug)]
pub struct InlineNode {
    name: String,
    segments: Vec<Segment>,
}

impl InlineNode {
    /// Scan `source` for `{{input}}` tokens. Every token must name an input
    /// of `nodedef`; malformed templates report the byte position at fault.
    pub fn parse(name: &str, source: &str, nodedef: &NodeDef) -> Result<Self> {
        let error = |position: usize, reason: String| GenError::Template {
            implementation: name.to_string(),
            position,
            reason,
        };
        if nodedef.outputs.len() > 1 {
            return Err(error(0, "inline code can only produce a single output".into()));
        }

        let mut segments = Vec::new();
        let mut rest = 0;
        while let Some(found) = source[rest..].find(OPEN) {
            let start = rest + found;
            let text = &source[rest..start];
            if let Some(stray) = text.find(CLOSE) {
                return Err(error(rest + stray, format!("unmatched '{CLOSE}'")));
            }
            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }
            let body_start = start + OPEN.len();
            let end = source[body_start..]
                .find(CLOSE)
                .map(|e| body_start + e)
                .ok_or_else(|| error(start, format!("unterminated '{OPEN}'")))?;
            let body = &source[body_start..end];
            let input = body.trim();
            if input.is_empty() {
                return Err(error(start, "empty input name".into()));
            }
            if let Some(bad) = input.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
                let leading = body.len() - body.trim_start().len();
                return Err(error(
                    body_start + leading + bad,
                    format!("invalid character in input name '{input}'"),
                ));
            }
            let index = nodedef
                .inputs
                .iter()
                .position(|i| i.name == input)
                .ok_or_else(|| error(start, format!("'{input}' is not an input of '{}'", nodedef.name)))?;
            segments.push(Segment::Input(index));
            rest = end + CLOSE.len();
        }
        let tail = &source[rest..];
        if let Some(stray) = tail.find(CLOSE) {
            return Err(error(rest + stray, format!("unmatched '{CLOSE}'")));
        }
        if !tail.is_empty() {
            segments.push(Segment::Text(tail.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of input substitutions in the template.
    pub fn substitution_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Input(_)))
            .count()
    }

    pub fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let mut expression = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => expression.push_str(text),
                Segment::Input(index) => expression.push_str(&input_expression(graph, node, *index, ctx)?),
            }
        }
        let decl = output_declaration(graph, node, 0, ctx)?;
        stage.add_line(&format!("{decl} = {expression}"), true);
        Ok(())
    }
}
