use std::collections::HashSet;

use shadegen_core::{Document, Implementation, NodeDef, NodeGraph, NodeInstance, PortDecl, Type, UnitDef, UnitTypeDef};
use shadegen_gen::{create_graph, generate, GenContext, GenError, GenOptions, ShaderInterfaceType, PIXEL_STAGE};
use shadegen_syntax::Target;

fn make_library() -> Document {
    let mut doc = Document::new();
    doc.nodedefs.push(
        NodeDef::new("ND_constant_color3", "constant")
            .with_input(PortDecl::new("value", Type::Color3).with_value("0, 0, 0"))
            .with_output(PortDecl::new("out", Type::Color3)),
    );
    doc.nodedefs.push(
        NodeDef::new("ND_multiply_color3", "multiply")
            .with_input(PortDecl::new("in1", Type::Color3).with_value("1, 1, 1"))
            .with_input(PortDecl::new("in2", Type::Color3).with_value("1, 1, 1"))
            .with_output(PortDecl::new("out", Type::Color3)),
    );
    doc.nodedefs.push(
        NodeDef::new("ND_split_color3", "split")
            .with_input(PortDecl::new("in", Type::Color3).with_value("0, 0, 0"))
            .with_output(PortDecl::new("first", Type::Color3))
            .with_output(PortDecl::new("second", Type::Color3)),
    );
    doc.implementations
        .push(Implementation::new("IM_constant_color3", "ND_constant_color3").with_sourcecode("{{value}}"));
    doc.implementations
        .push(Implementation::new("IM_multiply_color3", "ND_multiply_color3").with_sourcecode("{{in1}} * {{in2}}"));
    doc.nodegraphs.push(
        NodeGraph::new("NG_split_color3")
            .with_nodedef("ND_split_color3")
            .with_node(
                NodeInstance::new("keep", "multiply", Type::Color3)
                    .with_input(PortDecl::new("in1", Type::Color3).with_interface("in")),
            )
            .with_node(
                NodeInstance::new("half", "multiply", Type::Color3)
                    .with_input(PortDecl::new("in1", Type::Color3).with_interface("in"))
                    .with_input(PortDecl::new("in2", Type::Color3).with_value("0.5, 0.5, 0.5")),
            )
            .with_output(PortDecl::new("first", Type::Color3).with_node("keep"))
            .with_output(PortDecl::new("second", Type::Color3).with_node("half")),
    );
    doc
}

fn make_constant_doc() -> Document {
    let mut doc = make_library();
    doc.nodes.push(
        NodeInstance::new("c", "constant", Type::Color3)
            .with_input(PortDecl::new("value", Type::Color3).with_value("0.1, 0.2, 0.3")),
    );
    doc.outputs.push(PortDecl::new("out", Type::Color3).with_node("c"));
    doc
}

fn pixel_code(doc: &Document, element: &str, target: Target) -> String {
    let mut ctx = GenContext::new(target);
    let shader = generate(doc, element, "test", &mut ctx).unwrap();
    shader.source_code(PIXEL_STAGE).unwrap().to_string()
}

#[test]
fn constant_becomes_a_uniform_assigned_to_the_output() {
    let code = pixel_code(&make_constant_doc(), "out", Target::Glsl);
    assert!(code.starts_with("#version 400"));
    assert!(code.contains("uniform vec3 c_value = vec3(0.1, 0.2, 0.3);"));
    assert!(code.contains("out vec4 out1;"));
    assert!(code.contains("out1 = vec4(c_value, 1.0);"));
}

#[test]
fn slang_returns_the_output_from_the_entry_point() {
    let code = pixel_code(&make_constant_doc(), "out", Target::Slang);
    assert!(code.contains("float4 fragmentMain(VertexData vd) : SV_Target"));
    assert!(code.contains("return float4(c_value, 1.0);"));
}

#[test]
fn multi_output_compound_returns_a_struct() {
    let mut doc = make_library();
    doc.nodegraphs.push(
        NodeGraph::new("main")
            .with_node(
                NodeInstance::new("sp", "split", Type::MultiOutput)
                    .with_nodedef("ND_split_color3")
                    .with_input(PortDecl::new("in", Type::Color3).with_value("0.2, 0.4, 0.6")),
            )
            .with_node(
                NodeInstance::new("sum", "multiply", Type::Color3)
                    .with_input(PortDecl::new("in1", Type::Color3).with_node_output("sp", "first"))
                    .with_input(PortDecl::new("in2", Type::Color3).with_node_output("sp", "second")),
            )
            .with_output(PortDecl::new("out", Type::Color3).with_node("sum")),
    );
    let code = pixel_code(&doc, "main/out", Target::Glsl);

    assert_eq!(code.matches("struct NG_split_color3_result").count(), 1);
    assert!(code.contains("return result;"));
    assert_eq!(code.matches("NG_split_color3_result sp_result = NG_split_color3(").count(), 1);
    assert!(code.contains("vec3 sum_out = sp_result.first * sp_result.second;"));
}

#[test]
fn shared_unit_helper_is_defined_once() {
    let mut doc = Document::new();
    doc.nodedefs.push(
        NodeDef::new("ND_offset_vector3", "offset")
            .with_input(
                PortDecl::new("in", Type::Vector3)
                    .with_value("0, 0, 0")
                    .with_unittype("distance"),
            )
            .with_output(PortDecl::new("out", Type::Vector3)),
    );
    doc.nodedefs.push(
        NodeDef::new("ND_add_vector3", "add")
            .with_input(PortDecl::new("in1", Type::Vector3).with_value("0, 0, 0"))
            .with_input(PortDecl::new("in2", Type::Vector3).with_value("0, 0, 0"))
            .with_output(PortDecl::new("out", Type::Vector3)),
    );
    doc.implementations
        .push(Implementation::new("IM_offset_vector3", "ND_offset_vector3").with_sourcecode("{{in}}"));
    doc.implementations
        .push(Implementation::new("IM_add_vector3", "ND_add_vector3").with_sourcecode("{{in1}} + {{in2}}"));
    doc.unittypes.push(UnitTypeDef {
        name: "distance".into(),
        units: vec![
            UnitDef {
                name: "meter".into(),
                scale: 1.0,
            },
            UnitDef {
                name: "millimeter".into(),
                scale: 0.001,
            },
        ],
    });
    for name in ["a", "b"] {
        doc.nodes.push(
            NodeInstance::new(name, "offset", Type::Vector3).with_input(
                PortDecl::new("in", Type::Vector3)
                    .with_value("1, 2, 3")
                    .with_unit("millimeter"),
            ),
        );
    }
    doc.nodes.push(
        NodeInstance::new("sum", "add", Type::Vector3)
            .with_input(PortDecl::new("in1", Type::Vector3).with_node("a"))
            .with_input(PortDecl::new("in2", Type::Vector3).with_node("b")),
    );
    doc.outputs.push(PortDecl::new("result", Type::Vector3).with_node("sum"));

    let options = GenOptions {
        shader_interface_type: ShaderInterfaceType::Reduced,
        target_distance_unit: Some("meter".into()),
        ..GenOptions::default()
    };
    let mut ctx = GenContext::with_options(Target::Osl, options);
    let shader = generate(&doc, "result", "units", &mut ctx).unwrap();
    let code = shader.source_code(PIXEL_STAGE).unwrap();

    assert_eq!(code.matches("float mx_distance_unit_ratio(int unit_from, int unit_to)").count(), 1);
    assert_eq!(code.matches("* mx_distance_unit_ratio(").count(), 2);
}

#[test]
fn blur_taps_read_the_input_swizzle() {
    let mut doc = Document::new();
    doc.nodedefs.push(
        NodeDef::new("ND_ramp_color4", "ramp")
            .with_nodegroup("texture2d")
            .with_input(PortDecl::new("texcoord", Type::Vector2).with_value("0, 0"))
            .with_output(PortDecl::new("out", Type::Color4)),
    );
    doc.nodedefs.push(
        NodeDef::new("ND_blur_color3", "blur")
            .with_nodegroup("convolution2d")
            .with_input(PortDecl::new("in", Type::Color3).with_value("0, 0, 0"))
            .with_input(PortDecl::new("size", Type::Float).with_value("0"))
            .with_input(PortDecl::new("filtertype", Type::String).with_value("box"))
            .with_output(PortDecl::new("out", Type::Color3)),
    );
    doc.implementations.push(
        Implementation::new("IM_ramp_color4", "ND_ramp_color4").with_sourcecode("vec4({{texcoord}}, 0.0, 1.0)"),
    );
    doc.nodes.push(NodeInstance::new("ramp", "ramp", Type::Color4));
    doc.nodes.push(
        NodeInstance::new("b", "blur", Type::Color3)
            .with_input(PortDecl::new("in", Type::Color3).with_node("ramp").with_channels("rgb"))
            .with_input(PortDecl::new("size", Type::Float).with_value("0.2")),
    );
    doc.outputs.push(PortDecl::new("out", Type::Color3).with_node("b"));

    let options = GenOptions {
        shader_interface_type: ShaderInterfaceType::Reduced,
        ..GenOptions::default()
    };
    let mut ctx = GenContext::with_options(Target::Glsl, options);
    let shader = generate(&doc, "out", "blurred", &mut ctx).unwrap();
    let code = shader.source_code(PIXEL_STAGE).unwrap();

    assert!(code.contains("vec4 ramp_out_b_out0 = "));
    assert!(code.contains("b_out_samples[0] = vec3(ramp_out_b_out0.x, ramp_out_b_out0.y, ramp_out_b_out0.z);"));
    assert!(code.contains("b_out_samples[8] = vec3(ramp_out_b_out8.x, ramp_out_b_out8.y, ramp_out_b_out8.z);"));
    assert!(!code.contains("b_out_samples[0] = ramp_out_b_out0;"));
}

#[test]
fn source_functions_are_defined_once_per_stage() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("mx_tint.glsl"),
        "void mx_tint(vec3 color, out vec3 result)\n{\n    result = color * 0.5;\n}\n",
    )
    .unwrap();
    let mut doc = make_library();
    doc.nodedefs.push(
        NodeDef::new("ND_tint_color3", "tint")
            .with_input(PortDecl::new("color", Type::Color3).with_value("1, 1, 1"))
            .with_output(PortDecl::new("out", Type::Color3)),
    );
    doc.implementations.push(
        Implementation::new("IM_tint_color3_genglsl", "ND_tint_color3")
            .with_target("genglsl")
            .with_file("mx_tint.glsl", "mx_tint"),
    );
    doc.nodes.push(NodeInstance::new("t1", "tint", Type::Color3));
    doc.nodes.push(
        NodeInstance::new("t2", "tint", Type::Color3)
            .with_input(PortDecl::new("color", Type::Color3).with_node("t1")),
    );
    doc.outputs.push(PortDecl::new("out", Type::Color3).with_node("t2"));

    let mut ctx = GenContext::new(Target::Glsl);
    ctx.search_path.push(dir.path());
    let shader = generate(&doc, "out", "tinted", &mut ctx).unwrap();
    let code = shader.source_code(PIXEL_STAGE).unwrap();
    assert_eq!(code.matches("void mx_tint(vec3 color, out vec3 result)").count(), 1);
    assert!(code.contains("mx_tint(t1_out, t2_out);"));
}

#[test]
fn missing_source_file_fails_generation() {
    let mut doc = make_library();
    doc.nodedefs.push(
        NodeDef::new("ND_noise_float", "noise")
            .with_input(PortDecl::new("amplitude", Type::Float).with_value("1.0"))
            .with_output(PortDecl::new("out", Type::Float)),
    );
    doc.implementations
        .push(Implementation::new("IM_noise_float", "ND_noise_float").with_file("mx_noise.glsl", "mx_noise"));
    doc.nodes.push(NodeInstance::new("n", "noise", Type::Float));
    doc.outputs.push(PortDecl::new("out", Type::Float).with_node("n"));

    let mut ctx = GenContext::new(Target::Glsl);
    let err = generate(&doc, "out", "noise", &mut ctx).unwrap_err();
    assert!(err.is_missing_source());
}

#[test]
fn cycles_are_reported_with_their_path() {
    let mut doc = make_library();
    doc.nodes.push(
        NodeInstance::new("a", "multiply", Type::Color3)
            .with_input(PortDecl::new("in1", Type::Color3).with_node("b")),
    );
    doc.nodes.push(
        NodeInstance::new("b", "multiply", Type::Color3)
            .with_input(PortDecl::new("in1", Type::Color3).with_node("a")),
    );
    doc.outputs.push(PortDecl::new("out", Type::Color3).with_node("a"));

    let mut ctx = GenContext::new(Target::Glsl);
    let err = generate(&doc, "out", "loop", &mut ctx).unwrap_err();
    assert!(err.is_cycle());
    match err {
        GenError::FoundCycle { path } => {
            assert!(path.iter().any(|n| n == "a"));
            assert!(path.iter().any(|n| n == "b"));
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn output_is_deterministic_across_contexts() {
    let doc = make_constant_doc();
    for target in Target::ALL {
        let first = generate(&doc, "out", "det", &mut GenContext::new(target)).unwrap();
        let second = generate(&doc, "out", "det", &mut GenContext::new(target)).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint(), "{target}");
        for stage in first.stages() {
            assert_eq!(Some(stage.code()), second.source_code(&stage.name));
        }
    }
}

/// Fixed-seed xorshift, enough to vary graph shapes between iterations.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

/// Names chosen to collide with generated variable names and with
/// reserved words of the targets.
const NAMES: &[&str] = &[
    "float", "out", "in", "vec3", "color", "main", "n", "n_in1", "n_in1_out", "n_out", "result", "shader", "material",
];

fn make_random_doc(rng: &mut Rng) -> Document {
    let mut doc = make_library();
    let mut names: Vec<&str> = NAMES.to_vec();
    for i in (1..names.len()).rev() {
        names.swap(i, rng.below(i + 1));
    }
    let count = 2 + rng.below(names.len() - 2);
    for (index, name) in names.iter().take(count).enumerate() {
        let mut node = NodeInstance::new(*name, "multiply", Type::Color3);
        if index > 0 {
            let upstream = names[rng.below(index)];
            node = node.with_input(PortDecl::new("in1", Type::Color3).with_node(upstream));
            if rng.below(2) == 0 {
                let other = names[rng.below(index)];
                node = node.with_input(PortDecl::new("in2", Type::Color3).with_node(other));
            }
        }
        doc.nodes.push(node);
    }
    doc.outputs
        .push(PortDecl::new("out", Type::Color3).with_node(names[count - 1]));
    doc
}

#[test]
fn variables_are_unique_and_unreserved() {
    let mut rng = Rng(0x5eed_cafe_f00d_0001);
    for iteration in 0..64 {
        let doc = make_random_doc(&mut rng);
        for target in Target::ALL {
            let mut ctx = GenContext::new(target);
            let graph = create_graph(&doc, "out", "random", &mut ctx).unwrap();
            let syntax = target.syntax();

            let mut seen = HashSet::new();
            let sockets = graph.input_sockets().iter().chain(graph.output_sockets());
            let outputs = graph.nodes().flat_map(|n| n.outputs.iter());
            for port in sockets.chain(outputs) {
                assert!(
                    seen.insert(port.variable.clone()),
                    "iteration {iteration}, {target}: '{}' assigned twice",
                    port.variable
                );
                assert!(
                    !syntax.is_restricted(&port.variable),
                    "iteration {iteration}, {target}: '{}' is reserved",
                    port.variable
                );
            }
        }
    }
}
