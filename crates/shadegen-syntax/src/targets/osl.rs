//! Open Shading Language syntax (`genosl`).

use shadegen_core::Type;

use crate::syntax::{ArrayStyle, Syntax, TypeSyntax, ValueStyle};

const RESTRICTED: &[&str] = &[
    "and", "break", "closure", "color", "continue", "do", "else", "emit", "float", "for", "if",
    "illuminance", "illuminate", "int", "matrix", "normal", "not", "or", "output", "point",
    "public", "return", "string", "struct", "vector", "void", "while", "bool", "case", "catch",
    "char", "class", "const", "delete", "default", "double", "enum", "extern", "false", "friend",
    "goto", "inline", "long", "new", "operator", "private", "protected", "short", "signed",
    "sizeof", "static", "switch", "template", "this", "throw", "true", "try", "typedef",
    "uniform", "union", "unsigned", "varying", "virtual", "volatile", "emission", "background",
    "diffuse", "oren_nayar", "translucent", "phong", "ward", "microfacet", "reflection",
    "transparent", "debug", "holdout", "subsurface",
];

pub fn syntax() -> Syntax {
    let mut syntax = Syntax::new("genosl", "osl");
    syntax.output_qualifier = "output".to_string();
    syntax.constant_qualifier = String::new();
    syntax.array_style = ArrayStyle::Braces;
    syntax.register_restricted_names(RESTRICTED.iter().copied());

    syntax.register_type(Type::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register_type(Type::FloatArray, TypeSyntax::new("float", "", "", ValueStyle::Array));
    syntax.register_type(Type::Integer, TypeSyntax::scalar("int", "0"));
    syntax.register_type(Type::IntegerArray, TypeSyntax::new("int", "", "", ValueStyle::Array));
    syntax.register_type(
        Type::Boolean,
        TypeSyntax::scalar("int", "0").with_definition("#define true 1\n#define false 0"),
    );
    syntax.register_type(
        Type::Color2,
        TypeSyntax::new("color2", "color2(0.0, 0.0)", "{0.0, 0.0}", ValueStyle::Struct)
            .with_members(&[".r", ".a"])
            .with_definition("struct color2 { float r; float a; };"),
    );
    syntax.register_type(
        Type::Color3,
        TypeSyntax::aggregate("color", "color(0.0)", &["[0]", "[1]", "[2]"]),
    );
    syntax.register_type(
        Type::Color4,
        TypeSyntax::new(
            "color4",
            "color4(color(0.0), 0.0)",
            "{color(0.0), 0.0}",
            ValueStyle::ColorAlpha,
        )
        .with_members(&[".rgb[0]", ".rgb[1]", ".rgb[2]", ".a"])
        .with_definition("struct color4 { color rgb; float a; };"),
    );
    syntax.register_type(
        Type::Vector2,
        TypeSyntax::new("vector2", "vector2(0.0, 0.0)", "{0.0, 0.0}", ValueStyle::Struct)
            .with_members(&[".x", ".y"])
            .with_definition("struct vector2 { float x; float y; };"),
    );
    syntax.register_type(
        Type::Vector3,
        TypeSyntax::aggregate("vector", "vector(0.0)", &["[0]", "[1]", "[2]"]),
    );
    syntax.register_type(
        Type::Vector4,
        TypeSyntax::new(
            "vector4",
            "vector4(0.0, 0.0, 0.0, 0.0)",
            "{0.0, 0.0, 0.0, 0.0}",
            ValueStyle::Struct,
        )
        .with_members(&[".x", ".y", ".z", ".w"])
        .with_definition("struct vector4 { float x; float y; float z; float w; };"),
    );
    syntax.register_type(Type::Matrix33, TypeSyntax::aggregate("matrix", "matrix(1.0)", &[]));
    syntax.register_type(Type::Matrix44, TypeSyntax::aggregate("matrix", "matrix(1.0)", &[]));
    syntax.register_type(Type::String, TypeSyntax::new("string", "\"\"", "\"\"", ValueStyle::Quoted));
    syntax.register_type(Type::Filename, TypeSyntax::new("string", "\"\"", "\"\"", ValueStyle::Quoted));
    for (ty, name) in [
        (Type::Bsdf, "BSDF"),
        (Type::Edf, "EDF"),
        (Type::Vdf, "VDF"),
        (Type::SurfaceShader, "surfaceshader"),
        (Type::VolumeShader, "volumeshader"),
        (Type::LightShader, "lightshader"),
        (Type::Material, "MATERIAL"),
    ] {
        syntax.register_type(
            ty,
            TypeSyntax::new(name, "null_closure", "0", ValueStyle::Scalar).with_alias("closure color"),
        );
    }
    syntax.register_type(
        Type::DisplacementShader,
        TypeSyntax::new(
            "displacementshader",
            "{vector(0.0), 0.0}",
            "{vector(0.0), 0.0}",
            ValueStyle::Struct,
        )
        .with_definition("struct displacementshader { vector offset; float scale; };"),
    );
    syntax
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::Value;

    #[test]
    fn struct_types_use_braces_as_uniforms() {
        let syntax = syntax();
        let v = Value::parse(Type::Vector2, "0.5, 1").unwrap();
        assert_eq!(syntax.value(Type::Vector2, &v, true).unwrap(), "{0.5, 1.0}");
        assert_eq!(syntax.value(Type::Vector2, &v, false).unwrap(), "vector2(0.5, 1.0)");
    }

    #[test]
    fn color4_nests_rgb() {
        let syntax = syntax();
        let v = Value::parse(Type::Color4, "1, 0, 0, 0.5").unwrap();
        assert_eq!(
            syntax.value(Type::Color4, &v, false).unwrap(),
            "color4(color(1.0, 0.0, 0.0), 0.5)"
        );
        assert_eq!(
            syntax.value(Type::Color4, &v, true).unwrap(),
            "{color(1.0, 0.0, 0.0), 0.5}"
        );
    }

    #[test]
    fn color3_swizzle_uses_index_members() {
        let syntax = syntax();
        let expr = syntax
            .swizzled_variable("c", Type::Color3, "bgr", Type::Color3)
            .unwrap();
        assert_eq!(expr, "color(c[2], c[1], c[0])");
    }

    #[test]
    fn strings_are_quoted() {
        let syntax = syntax();
        let v = Value::String("box".into());
        assert_eq!(syntax.value(Type::String, &v, true).unwrap(), "\"box\"");
        assert!(syntax.supports_strings);
    }

    #[test]
    fn closures_are_closure_colors() {
        let defs = syntax().type_definitions();
        assert!(defs.contains(&"#define BSDF closure color".to_string()));
        assert_eq!(syntax().output_type_name(Type::Bsdf).unwrap(), "output BSDF");
    }
}
