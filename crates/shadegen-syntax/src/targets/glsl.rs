//! GLSL syntax (`genglsl`).

use shadegen_core::Type;

use crate::syntax::{Syntax, TypeSyntax, ValueStyle};

const VEC2_MEMBERS: &[&str] = &[".x", ".y"];
const VEC3_MEMBERS: &[&str] = &[".x", ".y", ".z"];
const VEC4_MEMBERS: &[&str] = &[".x", ".y", ".z", ".w"];

const RESTRICTED: &[&str] = &[
    "centroid", "flat", "smooth", "noperspective", "patch", "sample", "break", "continue", "do",
    "for", "while", "switch", "case", "default", "if", "else", "subroutine", "in", "out", "inout",
    "float", "double", "int", "void", "bool", "true", "false", "invariant", "discard", "return",
    "mat2", "mat3", "mat4", "dmat2", "dmat3", "dmat4", "mat2x2", "mat2x3", "mat2x4", "mat3x2",
    "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4", "vec2", "vec3", "vec4", "ivec2", "ivec3",
    "ivec4", "bvec2", "bvec3", "bvec4", "dvec2", "dvec3", "dvec4", "uint", "uvec2", "uvec3",
    "uvec4", "lowp", "mediump", "highp", "precision", "sampler1D", "sampler2D", "sampler3D",
    "samplerCube", "sampler1DShadow", "sampler2DShadow", "samplerCubeShadow", "sampler1DArray",
    "sampler2DArray", "isampler2D", "usampler2D", "samplerBuffer", "sampler2DMS", "common",
    "partition", "active", "asm", "struct", "class", "union", "enum", "typedef", "template",
    "this", "packed", "goto", "inline", "noinline", "volatile", "public", "static", "extern",
    "external", "interface", "long", "short", "half", "fixed", "unsigned", "superp", "input",
    "output", "hvec2", "hvec3", "hvec4", "fvec2", "fvec3", "fvec4", "filter", "image1D",
    "image2D", "image3D", "imageCube", "sizeof", "cast", "namespace", "using", "row_major",
];

pub fn syntax() -> Syntax {
    let mut syntax = Syntax::new("genglsl", "glsl");
    syntax.output_qualifier = "out".to_string();
    syntax.supports_strings = false;
    syntax.register_restricted_names(RESTRICTED.iter().copied());
    syntax.register_invalid_tokens(&[
        ("__", "_"),
        ("gl_", "gll"),
        ("webgl_", "webgll"),
        ("_webgl", "wwebgl"),
    ]);

    syntax.register_type(Type::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register_type(Type::FloatArray, TypeSyntax::new("float", "", "", ValueStyle::Array));
    syntax.register_type(Type::Integer, TypeSyntax::scalar("int", "0"));
    syntax.register_type(Type::IntegerArray, TypeSyntax::new("int", "", "", ValueStyle::Array));
    syntax.register_type(Type::Boolean, TypeSyntax::scalar("bool", "false"));
    syntax.register_type(Type::Color2, TypeSyntax::aggregate("vec2", "vec2(0.0)", VEC2_MEMBERS));
    syntax.register_type(Type::Color3, TypeSyntax::aggregate("vec3", "vec3(0.0)", VEC3_MEMBERS));
    syntax.register_type(Type::Color4, TypeSyntax::aggregate("vec4", "vec4(0.0)", VEC4_MEMBERS));
    syntax.register_type(Type::Vector2, TypeSyntax::aggregate("vec2", "vec2(0.0)", VEC2_MEMBERS));
    syntax.register_type(Type::Vector3, TypeSyntax::aggregate("vec3", "vec3(0.0)", VEC3_MEMBERS));
    syntax.register_type(Type::Vector4, TypeSyntax::aggregate("vec4", "vec4(0.0)", VEC4_MEMBERS));
    syntax.register_type(Type::Matrix33, TypeSyntax::aggregate("mat3", "mat3(1.0)", &[]));
    syntax.register_type(Type::Matrix44, TypeSyntax::aggregate("mat4", "mat4(1.0)", &[]));
    // No runtime strings: carried as an integer placeholder.
    syntax.register_type(Type::String, TypeSyntax::new("int", "0", "0", ValueStyle::Fixed));
    syntax.register_type(Type::Filename, TypeSyntax::scalar("sampler2D", ""));
    syntax.register_type(
        Type::Bsdf,
        TypeSyntax::aggregate("BSDF", "BSDF(0.0)", &[]).with_alias("vec3"),
    );
    syntax.register_type(
        Type::Edf,
        TypeSyntax::aggregate("EDF", "EDF(0.0)", &[]).with_alias("vec3"),
    );
    syntax.register_type(
        Type::Vdf,
        TypeSyntax::new("VDF", "VDF(vec3(0.0),vec3(0.0))", "", ValueStyle::Aggregate)
            .with_definition("struct VDF { vec3 absorption; vec3 scattering; };"),
    );
    syntax.register_type(
        Type::SurfaceShader,
        TypeSyntax::new(
            "surfaceshader",
            "surfaceshader(vec3(0.0),vec3(0.0))",
            "",
            ValueStyle::Aggregate,
        )
        .with_definition("struct surfaceshader { vec3 color; vec3 transparency; };"),
    );
    syntax.register_type(
        Type::VolumeShader,
        TypeSyntax::new(
            "volumeshader",
            "volumeshader(VDF(vec3(0.0),vec3(0.0)),EDF(0.0))",
            "",
            ValueStyle::Aggregate,
        )
        .with_definition("struct volumeshader { VDF vdf; EDF edf; };"),
    );
    syntax.register_type(
        Type::DisplacementShader,
        TypeSyntax::new(
            "displacementshader",
            "displacementshader(vec3(0.0),1.0)",
            "",
            ValueStyle::Aggregate,
        )
        .with_definition("struct displacementshader { vec3 offset; float scale; };"),
    );
    syntax.register_type(
        Type::LightShader,
        TypeSyntax::new(
            "lightshader",
            "lightshader(vec3(0.0),vec3(0.0))",
            "",
            ValueStyle::Aggregate,
        )
        .with_definition("struct lightshader { vec3 intensity; vec3 direction; };"),
    );
    syntax.register_type(
        Type::Material,
        TypeSyntax::new(
            "material",
            "material(vec3(0.0),vec3(0.0))",
            "",
            ValueStyle::Aggregate,
        )
        .with_alias("surfaceshader"),
    );
    syntax
}
