//! End-to-end runs of the `shadegen` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const LIBRARY: &str = r#"
    "nodedefs": [
        {
            "name": "ND_constant_color3",
            "node": "constant",
            "inputs": [{ "name": "value", "type": "color3", "value": "0, 0, 0" }],
            "outputs": [{ "name": "out", "type": "color3" }]
        },
        {
            "name": "ND_multiply_color3",
            "node": "multiply",
            "inputs": [
                { "name": "in1", "type": "color3", "value": "1, 1, 1" },
                { "name": "in2", "type": "color3", "value": "1, 1, 1" }
            ],
            "outputs": [{ "name": "out", "type": "color3" }]
        }
    ],
    "implementations": [
        { "name": "IM_constant_color3", "nodedef": "ND_constant_color3", "sourcecode": "{{value}}" },
        { "name": "IM_multiply_color3", "nodedef": "ND_multiply_color3", "sourcecode": "{{in1}} * {{in2}}" }
    ],
"#;

fn write_doc(dir: &Path, file: &str, body: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, format!("{{{LIBRARY}{body}}}")).unwrap();
    path
}

fn constant_doc(dir: &Path) -> PathBuf {
    write_doc(
        dir,
        "constant.json",
        r#"
        "nodes": [
            {
                "name": "c",
                "node": "constant",
                "type": "color3",
                "inputs": [{ "name": "value", "type": "color3", "value": "0.1, 0.2, 0.3" }]
            }
        ],
        "outputs": [{ "name": "out", "type": "color3", "nodename": "c" }]
        "#,
    )
}

fn cycle_doc(dir: &Path) -> PathBuf {
    write_doc(
        dir,
        "cycle.json",
        r#"
        "nodes": [
            {
                "name": "a",
                "node": "multiply",
                "type": "color3",
                "inputs": [{ "name": "in1", "type": "color3", "nodename": "b" }]
            },
            {
                "name": "b",
                "node": "multiply",
                "type": "color3",
                "inputs": [{ "name": "in1", "type": "color3", "nodename": "a" }]
            }
        ],
        "outputs": [{ "name": "out", "type": "color3", "nodename": "a" }]
        "#,
    )
}

fn shadegen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shadegen"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn targets_lists_every_language() {
    let output = shadegen(&["targets"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for target in ["glsl", "osl", "mdl", "slang"] {
        assert!(text.contains(target), "{target} missing from:\n{text}");
    }
}

#[test]
fn generate_prints_stages_and_uniforms() {
    let dir = tempfile::tempdir().unwrap();
    let doc = constant_doc(dir.path());
    let output = shadegen(&[
        "generate",
        "--document",
        doc.to_str().unwrap(),
        "--element",
        "out",
        "--target",
        "glsl",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("vec3(0.1, 0.2, 0.3)"));
    assert!(text.contains("Uniforms:"));
    assert!(text.contains("c_value"));
}

#[test]
fn generate_json_is_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let doc = constant_doc(dir.path());
    let output = shadegen(&[
        "generate",
        "--document",
        doc.to_str().unwrap(),
        "--element",
        "out",
        "--target",
        "slang",
        "--json",
    ]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["target"], "slang");
    assert_eq!(value["stages"].as_array().unwrap().len(), 2);
}

#[test]
fn validate_fails_on_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let doc = cycle_doc(dir.path());
    let output = shadegen(&[
        "validate",
        "--document",
        doc.to_str().unwrap(),
        "--element",
        "out",
        "--target",
        "osl",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error:"), "{stderr}");
}

#[test]
fn unknown_target_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let doc = constant_doc(dir.path());
    let output = shadegen(&[
        "validate",
        "--document",
        doc.to_str().unwrap(),
        "--element",
        "out",
        "--target",
        "hlsl",
    ]);
    assert_eq!(output.status.code(), Some(1));
}

fn library(file: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../libraries").join(file);
    path.to_str().unwrap().to_string()
}

#[test]
fn sample_library_generates_for_every_target() {
    let document = library("stdlib.json");
    let options = library("options.toml");
    for target in ["glsl", "osl", "mdl", "slang"] {
        let output = shadegen(&[
            "generate",
            "--document",
            &document,
            "--element",
            "faded",
            "--target",
            target,
            "--options",
            &options,
            "--json",
        ]);
        assert!(output.status.success(), "{target}: {}", String::from_utf8_lossy(&output.stderr));
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let sources: String = value["stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|stage| stage["source"].as_str().unwrap().to_string())
            .collect();
        assert!(sources.contains("mx_luminance_color3("), "{target}");
        assert!(sources.contains("NG_desaturate_color3("), "{target}");
    }
}
