//! Material Definition Language syntax (`genmdl`).
//!
//! MDL functions return their results, so node calls use
//! [`CallStyle::ReturnValue`]; every closure and shader type maps onto
//! `material`.

use shadegen_core::Type;

use crate::syntax::{ArrayDeclaration, Syntax, TypeSyntax, ValueStyle};
use crate::CallStyle;

const RESTRICTED: &[&str] = &[
    "annotation", "bool", "bool2", "bool3", "bool4", "break", "bsdf", "bsdf_measurement",
    "case", "color", "const", "continue", "default", "do", "double", "edf", "else", "enum",
    "export", "false", "float", "float2", "float3", "float4", "float2x2", "float3x3",
    "float4x4", "for", "hair_bsdf", "if", "import", "in", "int", "int2", "int3", "int4",
    "intensity_mode", "intensity_power", "intensity_radiant_exitance", "let", "light_profile",
    "material", "material_emission", "material_geometry", "material_surface",
    "material_volume", "mdl", "module", "package", "return", "string", "struct", "switch",
    "texture_2d", "texture_3d", "texture_cube", "texture_ptex", "true", "typedef", "uniform",
    "using", "varying", "vdf", "while",
];

pub fn syntax() -> Syntax {
    let mut syntax = Syntax::new("genmdl", "mdl");
    syntax.constant_qualifier = String::new();
    syntax.call_style = CallStyle::ReturnValue;
    syntax.array_declaration = ArrayDeclaration::PrefixSize;
    syntax.register_restricted_names(RESTRICTED.iter().copied());
    syntax.register_invalid_tokens(&[("__", "_")]);

    syntax.register_type(Type::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register_type(Type::FloatArray, TypeSyntax::new("float", "", "", ValueStyle::Array));
    syntax.register_type(Type::Integer, TypeSyntax::scalar("int", "0"));
    syntax.register_type(Type::IntegerArray, TypeSyntax::new("int", "", "", ValueStyle::Array));
    syntax.register_type(Type::Boolean, TypeSyntax::scalar("bool", "false"));
    syntax.register_type(
        Type::Color2,
        TypeSyntax::aggregate("float2", "float2(0.0)", &[".x", ".y"]),
    );
    syntax.register_type(
        Type::Color3,
        TypeSyntax::aggregate("color", "color(0.0)", &[".x", ".y", ".z"]),
    );
    syntax.register_type(
        Type::Color4,
        TypeSyntax::new("color4", "mk_color4(0.0)", "mk_color4(0.0)", ValueStyle::Aggregate)
            .with_members(&[".x", ".y", ".z", ".a"])
            .with_definition("struct color4 { color rgb; float a; };"),
    );
    syntax.register_type(
        Type::Vector2,
        TypeSyntax::aggregate("float2", "float2(0.0)", &[".x", ".y"]),
    );
    syntax.register_type(
        Type::Vector3,
        TypeSyntax::aggregate("float3", "float3(0.0)", &[".x", ".y", ".z"]),
    );
    syntax.register_type(
        Type::Vector4,
        TypeSyntax::aggregate("float4", "float4(0.0)", &[".x", ".y", ".z", ".w"]),
    );
    syntax.register_type(Type::Matrix33, TypeSyntax::aggregate("float3x3", "float3x3(1.0)", &[]));
    syntax.register_type(Type::Matrix44, TypeSyntax::aggregate("float4x4", "float4x4(1.0)", &[]));
    syntax.register_type(Type::String, TypeSyntax::new("string", "\"\"", "\"\"", ValueStyle::Quoted));
    syntax.register_type(
        Type::Filename,
        TypeSyntax::new("texture_2d", "texture_2d()", "texture_2d()", ValueStyle::Resource),
    );
    for ty in [
        Type::Bsdf,
        Type::Edf,
        Type::Vdf,
        Type::SurfaceShader,
        Type::VolumeShader,
        Type::DisplacementShader,
        Type::LightShader,
        Type::Material,
    ] {
        syntax.register_type(ty, TypeSyntax::scalar("material", "material()"));
    }
    syntax
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::Value;

    #[test]
    fn closures_are_materials() {
        let syntax = syntax();
        assert_eq!(syntax.type_name(Type::Bsdf).unwrap(), "material");
        assert_eq!(syntax.default_value(Type::SurfaceShader, false).unwrap(), "material()");
    }

    #[test]
    fn vectors_are_float_n() {
        let syntax = syntax();
        let v = Value::parse(Type::Vector3, "1, 2, 3").unwrap();
        assert_eq!(syntax.value(Type::Vector3, &v, false).unwrap(), "float3(1.0, 2.0, 3.0)");
    }

    #[test]
    fn textures_are_constructed_from_paths() {
        let syntax = syntax();
        let v = Value::String("wood.png".into());
        assert_eq!(
            syntax.value(Type::Filename, &v, true).unwrap(),
            "texture_2d(\"wood.png\")"
        );
        let empty = Value::String(String::new());
        assert_eq!(syntax.value(Type::Filename, &empty, true).unwrap(), "texture_2d()");
    }

    #[test]
    fn arrays_declare_size_before_name() {
        assert_eq!(syntax().array_variable("float", "w", "4"), "float[4] w");
        assert_eq!(syntax().call_style, CallStyle::ReturnValue);
    }
}
