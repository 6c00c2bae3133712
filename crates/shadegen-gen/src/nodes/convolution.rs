//! The `blur` node: a box or Gaussian convolution of an upstream sample.
//!
//! When the input comes from a 2D texture sampler, the sampler is emitted
//! again for every tap of the kernel, each time with its texture
//! coordinate offset and its output renamed. Otherwise every tap reuses
//! the same value and the blur is a weighted no-op.

use std::path::PathBuf;

use shadegen_core::{content_hash, format_float, ContentHash, Implementation, Type};
use shadegen_syntax::CallStyle;

use crate::context::{GenContext, PortKey};
use crate::error::{GenError, Result};
use crate::generator::{emit_node_call, input_expression, output_declaration, output_variable};
use crate::graph::{Classification, ShaderGraph, ShaderNode, ShaderPort, Source};
use crate::stage::{block, Brackets, ShaderStage, PIXEL_STAGE};

pub const BOX_WEIGHTS: &str = "c_box_filter_weights";
pub const GAUSSIAN_WEIGHTS: &str = "c_gaussian_filter_weights";
/// Upper bound on taps, declared by the stage preamble.
pub const MAX_SAMPLE_COUNT: usize = 49;

const GAUSSIAN_FILTER: &str = "gaussian";
const SAMPLE_SIZE_FUNCTION: &str = "mx_compute_sample_size_uv";

/// 1x1, 3x3, 5x5 and 7x7 Gaussian kernels, concatenated.
#[rustfmt::skip]
const GAUSSIAN_KERNELS: [f32; 84] = [
    1.0,
    0.077847, 0.123317, 0.077847,
    0.123317, 0.195346, 0.123317,
    0.077847, 0.123317, 0.077847,
    0.003765, 0.015019, 0.023792, 0.015019, 0.003765,
    0.015019, 0.059912, 0.094907, 0.059912, 0.015019,
    0.023792, 0.094907, 0.150342, 0.094907, 0.023792,
    0.015019, 0.059912, 0.094907, 0.059912, 0.015019,
    0.003765, 0.015019, 0.023792, 0.015019, 0.003765,
    0.000036, 0.000363, 0.001446, 0.002291, 0.001446, 0.000363, 0.000036,
    0.000363, 0.003676, 0.014662, 0.023226, 0.014662, 0.003676, 0.000363,
    0.001446, 0.014662, 0.058488, 0.092651, 0.058488, 0.014662, 0.001446,
    0.002291, 0.023226, 0.092651, 0.146768, 0.092651, 0.023226, 0.002291,
    0.001446, 0.014662, 0.058488, 0.092651, 0.058488, 0.014662, 0.001446,
    0.000363, 0.003676, 0.014662, 0.023226, 0.014662, 0.003676, 0.000363,
    0.000036, 0.000363, 0.001446, 0.002291, 0.001446, 0.000363, 0.000036,
];

/// Uniform kernels matching the layout of [`GAUSSIAN_KERNELS`].
fn box_kernels() -> Vec<f32> {
    let mut weights = vec![1.0];
    for width in [3usize, 5, 7] {
        let taps = width * width;
        weights.extend(std::iter::repeat(1.0 / taps as f32).take(taps));
    }
    weights
}

/// Kernel width and offset into the weight tables for a `size` value.
fn filter_width(size: f32) -> (usize, usize) {
    if size <= 0.0 {
        (1, 0)
    } else if size <= 0.333 {
        (3, 1)
    } else if size <= 0.666 {
        (5, 10)
    } else {
        (7, 35)
    }
}

#[derive(Debug)]
pub struct BlurNode {
    name: String,
    /// Library source defining the convolution helpers, if the target has
    /// one.
    support: Option<(PathBuf, String)>,
    hash: ContentHash,
}

impl BlurNode {
    pub fn new(name: &str, implementation: Option<&Implementation>, ctx: &GenContext) -> Result<Self> {
        let support = match implementation.and_then(|i| i.file.as_deref().map(|f| (i, f))) {
            Some((implementation, file)) => {
                let missing = || GenError::MissingSourceFile {
                    file: file.to_string(),
                    implementation: implementation.name.clone(),
                };
                let path = ctx.search_path.find(file, None).ok_or_else(missing)?;
                let source = std::fs::read_to_string(&path).map_err(|_| missing())?;
                Some((path, source))
            }
            None => None,
        };
        let hash = content_hash(&(name, support.as_ref().map(|(_, source)| source)));
        Ok(Self {
            name: name.to_string(),
            support,
            hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn create_variables(&self, _ctx: &GenContext, stages: &mut [ShaderStage]) -> Result<()> {
        for stage in stages.iter_mut().filter(|s| s.name == PIXEL_STAGE) {
            let constants = stage.block_mut(block::CONSTANTS)?;
            constants.add(
                ShaderPort::new(BOX_WEIGHTS, Type::FloatArray)
                    .with_value(shadegen_core::Value::FloatArray(box_kernels())),
            );
            constants.add(
                ShaderPort::new(GAUSSIAN_WEIGHTS, Type::FloatArray)
                    .with_value(shadegen_core::Value::FloatArray(GAUSSIAN_KERNELS.to_vec())),
            );
        }
        Ok(())
    }

    pub fn emit_function_definition(&self, ctx: &mut GenContext, stage: &mut ShaderStage) -> Result<()> {
        if let Some((path, source)) = &self.support {
            if stage.claim_function(self.hash) {
                stage.add_block(source, path, &ctx.search_path)?;
                stage.new_line();
            }
        }
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
        let invalid = |reason: &str| GenError::InvalidNode {
            node: node.name.clone(),
            reason: reason.to_string(),
        };
        let input = node.input_index("in").ok_or_else(|| invalid("a blur needs an input named 'in'"))?;
        let filter_type = node
            .input_index("filtertype")
            .ok_or_else(|| invalid("a blur needs a 'filtertype' input"))?;
        let in_ty = node.inputs[input].ty;
        if !matches!(
            in_ty,
            Type::Float | Type::Color2 | Type::Color3 | Type::Color4 | Type::Vector2 | Type::Vector3 | Type::Vector4
        ) {
            return Err(invalid(&format!("cannot blur values of type {in_ty}")));
        }

        let size = node
            .input("size")
            .and_then(|p| p.value.as_ref())
            .and_then(shadegen_core::Value::as_float)
            .unwrap_or(0.0);
        let (width, offset) = filter_width(size);
        let count = width * width;

        let samples = self.emit_samples(node, graph, input, width, ctx, stage)?;
        let out = output_variable(graph, node, 0, ctx)?;
        let decl = output_declaration(graph, node, 0, ctx)?;
        if count == 1 {
            stage.add_line(&format!("{decl} = {}", samples[0]), true);
            return Ok(());
        }

        let ty_name = syntax.type_name(in_ty)?.to_string();
        let samples_var = format!("{out}_samples");
        match syntax.call_style {
            CallStyle::OutParams => {
                let array = syntax.array_variable(&ty_name, &samples_var, "MX_MAX_SAMPLE_COUNT");
                stage.add_line(&array, true);
                for (i, sample) in samples.iter().enumerate() {
                    stage.add_line(&format!("{samples_var}[{i}] = {sample}"), true);
                }
            }
            CallStyle::ReturnValue => {
                let array = syntax.array_variable(&ty_name, &samples_var, &count.to_string());
                stage.add_line(&format!("{array} = {ty_name}[]({})", samples.join(", ")), true);
            }
        }

        let convolve =
            |weights: &str| format!("mx_convolution_{ty_name}({samples_var}, {weights}, {offset}, {count})");
        let filter_port = &node.inputs[filter_type];
        if !filter_port.is_connected() {
            let weights = if filter_port.string_value() == Some(GAUSSIAN_FILTER) {
                GAUSSIAN_WEIGHTS
            } else {
                BOX_WEIGHTS
            };
            stage.add_line(&format!("{decl} = {}", convolve(weights)), true);
            return Ok(());
        }

        let selector = input_expression(graph, node, filter_type, ctx)?;
        let condition = if syntax.supports_strings {
            format!("{selector} == \"{GAUSSIAN_FILTER}\"")
        } else {
            format!("{selector} == 1")
        };
        match syntax.call_style {
            CallStyle::OutParams => {
                stage.add_line(&format!("{decl} = {}", syntax.default_value(in_ty, false)?), true);
                stage.add_line(&format!("if ({condition})"), false);
                stage.begin_scope(Brackets::Braces);
                stage.add_line(&format!("{out} = {}", convolve(GAUSSIAN_WEIGHTS)), true);
                stage.end_scope(false)?;
                stage.add_line("else", false);
                stage.begin_scope(Brackets::Braces);
                stage.add_line(&format!("{out} = {}", convolve(BOX_WEIGHTS)), true);
                stage.end_scope(false)?;
            }
            CallStyle::ReturnValue => {
                stage.add_line(
                    &format!(
                        "{decl} = ({condition}) ? {} : {}",
                        convolve(GAUSSIAN_WEIGHTS),
                        convolve(BOX_WEIGHTS)
                    ),
                    true,
                );
            }
        }
        Ok(())
    }

    /// One expression per kernel tap, each read through the swizzle of
    /// input `in`.
    fn emit_samples(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        input: usize,
        width: usize,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<Vec<String>> {
        let count = width * width;
        let port = &node.inputs[input];
        if let Some(Source::Node { node: upstream_id, output }) = port.connection {
            let upstream = graph.node(upstream_id)?;
            let texcoord = upstream
                .input_index("texcoord")
                .filter(|&i| upstream.inputs[i].ty == Type::Vector2);
            if let (true, Some(texcoord)) = (count > 1 && upstream.has_classification(Classification::SAMPLE2D), texcoord)
            {
                return self.emit_offset_samples(node, graph, input, upstream, texcoord, output, width, ctx, stage);
            }
        } else if port.connection.is_none() && port.value.is_none() {
            return Err(GenError::InvalidNode {
                node: node.name.clone(),
                reason: "no connection or value found on input 'in'".into(),
            });
        }
        Ok(vec![input_expression(graph, node, input, ctx)?; count])
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_offset_samples(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        input: usize,
        upstream: &ShaderNode,
        texcoord: usize,
        output: usize,
        width: usize,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<Vec<String>> {
        let syntax = ctx.syntax();
        let vec2 = syntax.type_name(Type::Vector2)?;
        let out = output_variable(graph, node, 0, ctx)?;
        let sample_size = format!("{out}_sample_size");
        let center = input_expression(graph, upstream, texcoord, ctx)?;
        stage.add_line(
            &format!("{vec2} {sample_size} = {SAMPLE_SIZE_FUNCTION}({center},1.0,0.0)"),
            true,
        );

        let input_key = PortKey {
            graph: graph.id,
            node: upstream.id,
            port: texcoord,
        };
        let output_key = PortKey {
            graph: graph.id,
            node: upstream.id,
            port: output,
        };
        let port = &node.inputs[input];
        let upstream_ty = upstream
            .outputs
            .get(output)
            .map(|o| o.ty)
            .ok_or_else(|| GenError::UnknownElement {
                name: format!("output {output} of '{}'", upstream.name),
            })?;
        let half = (width / 2) as i32;
        let mut samples = Vec::with_capacity(width * width);
        for row in -half..=half {
            for col in -half..=half {
                let tap = samples.len();
                let offset = format!(
                    " + {sample_size} * {vec2}({},{})",
                    format_float(col as f32),
                    format_float(row as f32)
                );
                ctx.add_input_suffix(input_key, offset);
                ctx.add_output_suffix(output_key, format!("_{out}{tap}"));
                let emitted = emit_node_call(graph, upstream, ctx, stage);
                let sample = output_variable(graph, upstream, output, ctx);
                ctx.remove_input_suffix(input_key);
                ctx.remove_output_suffix(output_key);
                emitted?;
                let sample = sample?;
                samples.push(match &port.channels {
                    Some(channels) => syntax.swizzled_variable(&sample, upstream_ty, channels, port.ty)?,
                    None => sample,
                });
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_size_thresholds() {
        assert_eq!(filter_width(0.0), (1, 0));
        assert_eq!(filter_width(0.2), (3, 1));
        assert_eq!(filter_width(0.5), (5, 10));
        assert_eq!(filter_width(1.0), (7, 35));
    }

    #[test]
    fn kernels_share_a_layout_and_sum_to_one() {
        let boxes = box_kernels();
        assert_eq!(boxes.len(), GAUSSIAN_KERNELS.len());
        for (width, offset) in [(3usize, 1usize), (5, 10), (7, 35)] {
            let taps = width * width;
            let box_sum: f32 = boxes[offset..offset + taps].iter().sum();
            let gauss_sum: f32 = GAUSSIAN_KERNELS[offset..offset + taps].iter().sum();
            assert!((box_sum - 1.0).abs() < 1e-4);
            assert!((gauss_sum - 1.0).abs() < 1e-2);
        }
        assert!(MAX_SAMPLE_COUNT >= 49);
    }
}
