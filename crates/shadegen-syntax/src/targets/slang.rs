//! Slang syntax (`genslang`): HLSL-style type names on the hardware pipeline.

use shadegen_core::Type;

use crate::syntax::{AliasStyle, ArrayStyle, Syntax, TypeSyntax, ValueStyle};

const VEC2_MEMBERS: &[&str] = &[".x", ".y"];
const VEC3_MEMBERS: &[&str] = &[".x", ".y", ".z"];
const VEC4_MEMBERS: &[&str] = &[".x", ".y", ".z", ".w"];

const RESTRICTED: &[&str] = &[
    "break", "case", "cbuffer", "const", "continue", "default", "discard", "do", "else",
    "extern", "false", "for", "if", "in", "inline", "inout", "interface", "let", "matrix",
    "namespace", "nointerpolation", "out", "return", "sampler", "static", "struct", "switch",
    "Texture2D", "SamplerState", "this", "true", "typedef", "uniform", "var", "vector", "void",
    "volatile", "while", "bool", "int", "uint", "half", "float", "double", "float2", "float3",
    "float4", "int2", "int3", "int4", "float2x2", "float3x3", "float4x4", "import", "module",
    "property", "associatedtype", "extension", "public", "internal", "private",
];

pub fn syntax() -> Syntax {
    let mut syntax = Syntax::new("genslang", "slang");
    syntax.output_qualifier = "out".to_string();
    syntax.supports_strings = false;
    syntax.array_style = ArrayStyle::Braces;
    syntax.alias_style = AliasStyle::Typedef;
    syntax.register_restricted_names(RESTRICTED.iter().copied());
    syntax.register_invalid_tokens(&[("__", "_"), ("SV_", "SVV")]);

    syntax.register_type(Type::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register_type(Type::FloatArray, TypeSyntax::new("float", "", "", ValueStyle::Array));
    syntax.register_type(Type::Integer, TypeSyntax::scalar("int", "0"));
    syntax.register_type(Type::IntegerArray, TypeSyntax::new("int", "", "", ValueStyle::Array));
    syntax.register_type(Type::Boolean, TypeSyntax::scalar("bool", "false"));
    syntax.register_type(Type::Color2, TypeSyntax::aggregate("float2", "float2(0.0)", VEC2_MEMBERS));
    syntax.register_type(Type::Color3, TypeSyntax::aggregate("float3", "float3(0.0)", VEC3_MEMBERS));
    syntax.register_type(Type::Color4, TypeSyntax::aggregate("float4", "float4(0.0)", VEC4_MEMBERS));
    syntax.register_type(Type::Vector2, TypeSyntax::aggregate("float2", "float2(0.0)", VEC2_MEMBERS));
    syntax.register_type(Type::Vector3, TypeSyntax::aggregate("float3", "float3(0.0)", VEC3_MEMBERS));
    syntax.register_type(Type::Vector4, TypeSyntax::aggregate("float4", "float4(0.0)", VEC4_MEMBERS));
    syntax.register_type(
        Type::Matrix33,
        TypeSyntax::aggregate("float3x3", "float3x3(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0)", &[]),
    );
    syntax.register_type(
        Type::Matrix44,
        TypeSyntax::aggregate(
            "float4x4",
            "float4x4(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0)",
            &[],
        ),
    );
    syntax.register_type(Type::String, TypeSyntax::new("int", "0", "0", ValueStyle::Fixed));
    syntax.register_type(Type::Filename, TypeSyntax::scalar("SamplerTexture2D", ""));
    syntax.register_type(
        Type::Bsdf,
        TypeSyntax::aggregate("BSDF", "BSDF(0.0)", &[]).with_alias("float3"),
    );
    syntax.register_type(
        Type::Edf,
        TypeSyntax::aggregate("EDF", "EDF(0.0)", &[]).with_alias("float3"),
    );
    syntax.register_type(
        Type::Vdf,
        TypeSyntax::new("VDF", "{float3(0.0), float3(0.0)}", "", ValueStyle::Struct)
            .with_definition("struct VDF { float3 absorption; float3 scattering; };"),
    );
    syntax.register_type(
        Type::SurfaceShader,
        TypeSyntax::new("surfaceshader", "{float3(0.0), float3(0.0)}", "", ValueStyle::Struct)
            .with_definition("struct surfaceshader { float3 color; float3 transparency; };"),
    );
    syntax.register_type(
        Type::VolumeShader,
        TypeSyntax::new("volumeshader", "{{float3(0.0), float3(0.0)}, float3(0.0)}", "", ValueStyle::Struct)
            .with_definition("struct volumeshader { VDF vdf; EDF edf; };"),
    );
    syntax.register_type(
        Type::DisplacementShader,
        TypeSyntax::new("displacementshader", "{float3(0.0), 1.0}", "", ValueStyle::Struct)
            .with_definition("struct displacementshader { float3 offset; float scale; };"),
    );
    syntax.register_type(
        Type::LightShader,
        TypeSyntax::new("lightshader", "{float3(0.0), float3(0.0)}", "", ValueStyle::Struct)
            .with_definition("struct lightshader { float3 intensity; float3 direction; };"),
    );
    syntax.register_type(
        Type::Material,
        TypeSyntax::new("material", "{float3(0.0), float3(0.0)}", "", ValueStyle::Struct)
            .with_alias("surfaceshader"),
    );
    syntax
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::Value;

    #[test]
    fn hlsl_type_names() {
        let syntax = syntax();
        assert_eq!(syntax.type_name(Type::Color3).unwrap(), "float3");
        let v = Value::parse(Type::Color3, "0.1, 0.2, 0.3").unwrap();
        assert_eq!(syntax.value(Type::Color3, &v, true).unwrap(), "float3(0.1, 0.2, 0.3)");
    }

    #[test]
    fn aliases_are_typedefs() {
        let defs = syntax().type_definitions();
        assert!(defs.contains(&"typedef float3 BSDF;".to_string()));
    }

    #[test]
    fn arrays_use_brace_lists() {
        let syntax = syntax();
        let v = Value::FloatArray(vec![0.5, 0.25]);
        assert_eq!(syntax.value(Type::FloatArray, &v, false).unwrap(), "{0.5, 0.25}");
    }
}
