//! `shadegen generate`: emit shader source for one element.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use shadegen_gen::{generate, Shader, UniformInfo};

use super::Request;

#[derive(Serialize)]
struct StageOutput<'a> {
    name: &'a str,
    source: &'a str,
}

#[derive(Serialize)]
struct ShaderOutput<'a> {
    name: &'a str,
    target: &'a str,
    transparent: bool,
    stages: Vec<StageOutput<'a>>,
    uniforms: Vec<UniformInfo>,
}

fn to_json(shader: &Shader) -> Result<String> {
    let output = ShaderOutput {
        name: &shader.name,
        target: shader.target.name(),
        transparent: shader.has_transparency(),
        stages: shader
            .stages()
            .iter()
            .map(|s| StageOutput {
                name: &s.name,
                source: s.code(),
            })
            .collect(),
        uniforms: shader.interface(),
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generate `request`, then write stage files, print JSON, or print the
/// sources followed by the uniform interface.
pub fn run(request: &Request, name: Option<&str>, output_dir: Option<&Path>, json: bool) -> Result<()> {
    let (doc, mut ctx) = request.prepare()?;
    let name = name.unwrap_or_else(|| request.element.rsplit('/').next().unwrap_or(&request.element));
    let shader = generate(&doc, &request.element, name, &mut ctx)
        .with_context(|| format!("generating '{}' for {}", request.element, ctx.target()))?;

    if json {
        println!("{}", to_json(&shader)?);
        return Ok(());
    }

    match output_dir {
        Some(dir) => {
            for path in shader.write_to(dir).with_context(|| format!("writing to {}", dir.display()))? {
                println!("wrote {}", path.display());
            }
        }
        None => {
            for stage in shader.stages() {
                println!("// --- {} stage ---", stage.name);
                println!("{}", stage.code());
            }
        }
    }

    let uniforms = shader.interface();
    if uniforms.is_empty() {
        println!("Uniforms: none");
    } else {
        println!("Uniforms:");
        for uniform in uniforms {
            let value = uniform.value.as_deref().unwrap_or("-");
            println!("  {:<24} {:<12} {value}", uniform.variable, uniform.ty);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_document;
    use shadegen_syntax::Target;

    #[test]
    fn writes_one_file_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_document(dir.path());
        let out = dir.path().join("out");
        run(&Request::new(&doc, "out", "glsl"), Some("flat"), Some(&out), false).unwrap();

        let pixel = std::fs::read_to_string(out.join("flat.pixel.glsl")).unwrap();
        assert!(pixel.contains("vec3(0.1, 0.2, 0.3)"));
        assert!(out.join("flat.vertex.glsl").exists());
    }

    #[test]
    fn json_lists_stages_and_uniforms() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_document(dir.path());
        let (doc, mut ctx) = Request::new(&doc, "out", "osl").prepare().unwrap();
        let shader = generate(&doc, "out", "flat", &mut ctx).unwrap();
        let value: serde_json::Value = serde_json::from_str(&to_json(&shader).unwrap()).unwrap();

        assert_eq!(value["target"], Target::Osl.name());
        assert_eq!(value["stages"].as_array().unwrap().len(), 1);
        assert_eq!(value["uniforms"][0]["variable"], "c_value");
        assert_eq!(value["uniforms"][0]["type"], "color3");
    }
}
