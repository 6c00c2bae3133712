//! The target syntax abstraction.
//!
//! A [`Syntax`] maps every abstract [`Type`] to a [`TypeSyntax`]: the printed
//! type name, default literals, an optional alias or definition statement,
//! and the member suffixes used for swizzling. It also owns the identifier
//! rules of the target language (restricted words, invalid tokens) and the
//! few structural conventions generators differ on.

use std::collections::{BTreeMap, HashMap, HashSet};

use shadegen_core::{format_float, Type, Value};

use crate::error::{Result, SyntaxError};

/// Counters of names already handed out, keyed by base name.
pub type UniqueNames = HashMap<String, usize>;

/// How literal values of a type are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueStyle {
    /// The value string as is (`1.0`, `3`, `true`).
    Scalar,
    /// A double-quoted string.
    Quoted,
    /// Always the default value, for types the target can only carry as a
    /// placeholder (strings on targets without string support).
    Fixed,
    /// A constructor call: `vec3(0.1, 0.2, 0.3)`.
    Aggregate,
    /// An array literal, formatted per [`ArrayStyle`].
    Array,
    /// A struct built with a constructor call, or a brace list when used as
    /// a uniform initializer.
    Struct,
    /// A color with separate alpha: `color4(color(r, g, b), a)`.
    ColorAlpha,
    /// A resource constructed from a quoted path: `texture_2d("a.png")`.
    Resource,
}

/// How array literals are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayStyle {
    /// `float[3](1.0, 2.0, 3.0)`
    Constructor,
    /// `{1.0, 2.0, 3.0}`
    Braces,
}

/// How array variables are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayDeclaration {
    /// `float name[3]`
    SuffixSize,
    /// `float[3] name`
    PrefixSize,
}

/// How a node's outputs are returned from its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// Outputs are declared by the caller and passed as out parameters.
    OutParams,
    /// The function returns its output, or a struct of outputs.
    ReturnValue,
}

/// How a type alias statement is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasStyle {
    /// `#define BSDF vec3`
    Define,
    /// `typedef float3 BSDF;`
    Typedef,
}

/// Syntax of one type in one target language.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSyntax {
    /// Printed type name.
    pub name: String,
    /// Default literal for a local variable.
    pub default_value: String,
    /// Default literal in a uniform initializer.
    pub uniform_default_value: String,
    /// Built-in type this type is an alias of.
    pub type_alias: Option<String>,
    /// Statement defining the type when the target has no built-in for it.
    pub type_definition: Option<String>,
    /// Member suffixes for swizzling, one per component.
    pub members: Vec<String>,
    pub style: ValueStyle,
}

impl TypeSyntax {
    pub fn scalar(name: &str, default_value: &str) -> Self {
        Self::new(name, default_value, default_value, ValueStyle::Scalar)
    }

    pub fn aggregate(name: &str, default_value: &str, members: &[&str]) -> Self {
        Self::new(name, default_value, default_value, ValueStyle::Aggregate)
            .with_members(members)
    }

    pub fn new(name: &str, default_value: &str, uniform_default_value: &str, style: ValueStyle) -> Self {
        Self {
            name: name.to_string(),
            default_value: default_value.to_string(),
            uniform_default_value: uniform_default_value.to_string(),
            type_alias: None,
            type_definition: None,
            members: Vec::new(),
            style,
        }
    }

    pub fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.type_alias = Some(alias.to_string());
        self
    }

    pub fn with_definition(mut self, definition: &str) -> Self {
        self.type_definition = Some(definition.to_string());
        self
    }
}

/// The complete syntax of a target language.
#[derive(Debug, Clone)]
pub struct Syntax {
    target: String,
    types: BTreeMap<Type, TypeSyntax>,
    restricted: HashSet<String>,
    invalid_tokens: Vec<(String, String)>,
    /// Qualifier for output parameters (`out`, `output`), possibly empty.
    pub output_qualifier: String,
    pub uniform_qualifier: String,
    pub constant_qualifier: String,
    pub call_style: CallStyle,
    pub array_style: ArrayStyle,
    pub array_declaration: ArrayDeclaration,
    pub alias_style: AliasStyle,
    /// Whether string values exist at runtime in the target.
    pub supports_strings: bool,
    /// Extension of implementation source files, without the dot.
    pub source_extension: String,
}

impl Syntax {
    /// An empty syntax for the named target. Target constructors fill it in.
    pub fn new(target: &str, source_extension: &str) -> Self {
        Self {
            target: target.to_string(),
            types: BTreeMap::new(),
            restricted: HashSet::new(),
            invalid_tokens: Vec::new(),
            output_qualifier: String::new(),
            uniform_qualifier: "uniform".to_string(),
            constant_qualifier: "const".to_string(),
            call_style: CallStyle::OutParams,
            array_style: ArrayStyle::Constructor,
            array_declaration: ArrayDeclaration::SuffixSize,
            alias_style: AliasStyle::Define,
            supports_strings: true,
            source_extension: source_extension.to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Register the syntax of a type. Its name becomes a restricted word.
    pub fn register_type(&mut self, ty: Type, syntax: TypeSyntax) {
        self.restricted.insert(syntax.name.clone());
        self.types.insert(ty, syntax);
    }

    pub fn register_restricted_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted.extend(names.into_iter().map(Into::into));
    }

    /// Register substrings that must not appear in identifiers, with their
    /// replacements. Replacements run in registration order.
    pub fn register_invalid_tokens(&mut self, tokens: &[(&str, &str)]) {
        self.invalid_tokens
            .extend(tokens.iter().map(|(from, to)| (from.to_string(), to.to_string())));
    }

    pub fn is_restricted(&self, name: &str) -> bool {
        self.restricted.contains(name)
    }

    pub fn type_syntax(&self, ty: Type) -> Result<&TypeSyntax> {
        self.types.get(&ty).ok_or_else(|| SyntaxError::UnsupportedType {
            ty,
            target: self.target.clone(),
        })
    }

    pub fn supports_type(&self, ty: Type) -> bool {
        self.types.contains_key(&ty)
    }

    pub fn type_name(&self, ty: Type) -> Result<&str> {
        Ok(&self.type_syntax(ty)?.name)
    }

    /// Type name as written for an output parameter.
    pub fn output_type_name(&self, ty: Type) -> Result<String> {
        let name = self.type_name(ty)?;
        Ok(if self.output_qualifier.is_empty() {
            name.to_string()
        } else {
            format!("{} {name}", self.output_qualifier)
        })
    }

    pub fn default_value(&self, ty: Type, uniform: bool) -> Result<&str> {
        let syntax = self.type_syntax(ty)?;
        Ok(if uniform {
            &syntax.uniform_default_value
        } else {
            &syntax.default_value
        })
    }

    /// Print a literal value of the given type.
    pub fn value(&self, ty: Type, value: &Value, uniform: bool) -> Result<String> {
        let syntax = self.type_syntax(ty)?;
        let text = value.value_string();
        Ok(match syntax.style {
            ValueStyle::Scalar => text,
            ValueStyle::Quoted => format!("\"{text}\""),
            ValueStyle::Fixed => self.default_value(ty, uniform)?.to_string(),
            ValueStyle::Aggregate => format!("{}({text})", syntax.name),
            ValueStyle::Struct if uniform => format!("{{{text}}}"),
            ValueStyle::Struct => format!("{}({text})", syntax.name),
            ValueStyle::Array => match value.array_len() {
                Some(0) | None => String::new(),
                Some(len) => match self.array_style {
                    ArrayStyle::Constructor => format!("{}[{len}]({text})", syntax.name),
                    ArrayStyle::Braces => format!("{{{text}}}"),
                },
            },
            ValueStyle::Resource if text.is_empty() => syntax.default_value.clone(),
            ValueStyle::Resource => format!("{}(\"{text}\")", syntax.name),
            ValueStyle::ColorAlpha => {
                let components = match value {
                    Value::Aggregate(c) => c.iter().map(|f| format_float(*f)).collect(),
                    _ => vec![text],
                };
                self.aggregate_value(ty, &components, uniform)?
            }
        })
    }

    /// Build a value of the given type from component expressions.
    pub fn aggregate_value(&self, ty: Type, values: &[String], uniform: bool) -> Result<String> {
        let syntax = self.type_syntax(ty)?;
        let first = values.first().ok_or(SyntaxError::EmptyValues { ty })?;
        let joined = values.join(", ");
        Ok(match syntax.style {
            ValueStyle::Scalar | ValueStyle::Quoted | ValueStyle::Fixed | ValueStyle::Resource => {
                first.clone()
            }
            ValueStyle::Aggregate => format!("{}({joined})", syntax.name),
            ValueStyle::Struct if uniform => format!("{{{joined}}}"),
            ValueStyle::Struct => format!("{}({joined})", syntax.name),
            ValueStyle::Array => match self.array_style {
                ArrayStyle::Constructor => format!("{}[{}]({joined})", syntax.name, values.len()),
                ArrayStyle::Braces => format!("{{{joined}}}"),
            },
            ValueStyle::ColorAlpha => {
                if values.len() < 4 {
                    return Err(SyntaxError::TooFewValues {
                        ty,
                        expected: 4,
                        found: values.len(),
                    });
                }
                let rgb = format!("color({}, {}, {})", values[0], values[1], values[2]);
                if uniform {
                    format!("{{{rgb}, {}}}", values[3])
                } else {
                    format!("{}({rgb}, {})", syntax.name, values[3])
                }
            }
        })
    }

    /// Expression reading `channels` of `src` (of type `src_ty`) as a value
    /// of `dst_ty`. `0` and `1` in the pattern are literal components.
    pub fn swizzled_variable(&self, src: &str, src_ty: Type, channels: &str, dst_ty: Type) -> Result<String> {
        let members = &self.type_syntax(src_ty)?.members;
        let mut swizzled = Vec::with_capacity(channels.len());
        for ch in channels.chars() {
            if ch == '0' || ch == '1' {
                swizzled.push(ch.to_string());
                continue;
            }
            if !"rgbaxyzw".contains(ch) {
                return Err(SyntaxError::InvalidChannelPattern {
                    pattern: channels.to_string(),
                });
            }
            if members.is_empty() {
                swizzled.push(src.to_string());
                continue;
            }
            let member = src_ty
                .channel_index(ch)
                .and_then(|index| members.get(index))
                .ok_or_else(|| SyntaxError::ChannelOutOfRange {
                    channel: ch,
                    pattern: channels.to_string(),
                    ty: src_ty,
                })?;
            swizzled.push(format!("{src}{member}"));
        }
        self.aggregate_value(dst_ty, &swizzled, false)
    }

    /// Replace characters that cannot appear in an identifier, then the
    /// target's invalid tokens.
    pub fn make_valid_name(&self, name: &str) -> String {
        let mut valid: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if valid.is_empty() || valid.starts_with(|c: char| c.is_ascii_digit()) {
            valid.insert(0, '_');
        }
        for (from, to) in &self.invalid_tokens {
            valid = valid.replace(from.as_str(), to);
        }
        valid
    }

    /// Make `name` unique against the names handed out so far and the
    /// target's restricted words, by appending a counter.
    pub fn make_unique(&self, name: &str, names: &mut UniqueNames) -> String {
        let base = self.make_valid_name(name);
        let restricted = self.restricted.contains(&base);
        let mut count = match names.get(&base) {
            Some(&count) => count,
            None if restricted => 0,
            None => {
                names.insert(base.clone(), 0);
                return base;
            }
        };
        loop {
            count += 1;
            let candidate = format!("{base}{count}");
            if !self.restricted.contains(&candidate) && !names.contains_key(&candidate) {
                if restricted {
                    log::trace!("'{base}' is restricted in {}, using '{candidate}'", self.target);
                }
                names.insert(base, count);
                names.insert(candidate.clone(), 0);
                return candidate;
            }
        }
    }

    /// Alias and definition statements for every type that needs one, in
    /// registry order.
    pub fn type_definitions(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for syntax in self.types.values() {
            if let Some(alias) = &syntax.type_alias {
                let line = match self.alias_style {
                    AliasStyle::Define => format!("#define {} {alias}", syntax.name),
                    AliasStyle::Typedef => format!("typedef {alias} {};", syntax.name),
                };
                if !lines.contains(&line) {
                    lines.push(line);
                }
            }
            if let Some(definition) = &syntax.type_definition {
                if !lines.contains(definition) {
                    lines.push(definition.clone());
                }
            }
        }
        lines
    }

    /// Declaration of an array variable of `size` elements.
    pub fn array_variable(&self, ty_name: &str, variable: &str, size: &str) -> String {
        match self.array_declaration {
            ArrayDeclaration::SuffixSize => format!("{ty_name} {variable}[{size}]"),
            ArrayDeclaration::PrefixSize => format!("{ty_name}[{size}] {variable}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_syntax() -> Syntax {
        let mut syntax = Syntax::new("test", "src");
        syntax.register_type(Type::Float, TypeSyntax::scalar("float", "0.0"));
        syntax.register_type(
            Type::Vector3,
            TypeSyntax::aggregate("vec3", "vec3(0.0)", &[".x", ".y", ".z"]),
        );
        syntax.register_type(
            Type::Color4,
            TypeSyntax::aggregate("vec4", "vec4(0.0)", &[".x", ".y", ".z", ".w"]),
        );
        syntax.register_type(Type::FloatArray, TypeSyntax::new("float", "", "", ValueStyle::Array));
        syntax.register_restricted_names(["out", "in"]);
        syntax.register_invalid_tokens(&[("__", "_"), ("gl_", "gll")]);
        syntax
    }

    #[test]
    fn aggregate_literal() {
        let syntax = make_syntax();
        let v = Value::Aggregate(vec![0.1, 0.2, 0.3]);
        assert_eq!(syntax.value(Type::Vector3, &v, true).unwrap(), "vec3(0.1, 0.2, 0.3)");
    }

    #[test]
    fn array_literal_and_empty_array() {
        let syntax = make_syntax();
        let v = Value::FloatArray(vec![1.0, 2.0]);
        assert_eq!(syntax.value(Type::FloatArray, &v, false).unwrap(), "float[2](1.0, 2.0)");
        let empty = Value::FloatArray(vec![]);
        assert_eq!(syntax.value(Type::FloatArray, &empty, false).unwrap(), "");
    }

    #[test]
    fn swizzle_reorders_members() {
        let syntax = make_syntax();
        let expr = syntax
            .swizzled_variable("c", Type::Color4, "bgra", Type::Color4)
            .unwrap();
        assert_eq!(expr, "vec4(c.z, c.y, c.x, c.w)");
        let expr = syntax
            .swizzled_variable("v", Type::Vector3, "x", Type::Float)
            .unwrap();
        assert_eq!(expr, "v.x");
    }

    #[test]
    fn swizzle_literal_components() {
        let syntax = make_syntax();
        let expr = syntax
            .swizzled_variable("v", Type::Vector3, "xy1", Type::Vector3)
            .unwrap();
        assert_eq!(expr, "vec3(v.x, v.y, 1)");
    }

    #[test]
    fn swizzle_scalar_source_repeats() {
        let syntax = make_syntax();
        let expr = syntax
            .swizzled_variable("f", Type::Float, "rrr", Type::Vector3)
            .unwrap();
        assert_eq!(expr, "vec3(f, f, f)");
    }

    #[test]
    fn swizzle_out_of_range_fails() {
        let syntax = make_syntax();
        let err = syntax
            .swizzled_variable("v", Type::Vector3, "w", Type::Float)
            .unwrap_err();
        assert!(matches!(err, SyntaxError::ChannelOutOfRange { channel: 'w', .. }));
    }

    #[test]
    fn swizzle_invalid_character_fails() {
        let syntax = make_syntax();
        let err = syntax
            .swizzled_variable("v", Type::Vector3, "xq", Type::Vector3)
            .unwrap_err();
        assert!(matches!(err, SyntaxError::InvalidChannelPattern { .. }));
    }

    #[test]
    fn make_unique_appends_counters() {
        let syntax = make_syntax();
        let mut names = UniqueNames::new();
        assert_eq!(syntax.make_unique("color", &mut names), "color");
        assert_eq!(syntax.make_unique("color", &mut names), "color1");
        assert_eq!(syntax.make_unique("color", &mut names), "color2");
    }

    #[test]
    fn make_unique_avoids_restricted_words() {
        let syntax = make_syntax();
        let mut names = UniqueNames::new();
        assert_eq!(syntax.make_unique("out", &mut names), "out1");
        assert_eq!(syntax.make_unique("out", &mut names), "out2");
        // Type names are restricted once registered.
        assert_eq!(syntax.make_unique("vec3", &mut names), "vec31");
    }

    #[test]
    fn make_unique_skips_names_already_taken() {
        let syntax = make_syntax();
        let mut names = UniqueNames::new();
        assert_eq!(syntax.make_unique("a1", &mut names), "a1");
        assert_eq!(syntax.make_unique("a", &mut names), "a");
        assert_eq!(syntax.make_unique("a", &mut names), "a2");
    }

    #[test]
    fn restricted_words_skip_taken_counters() {
        let syntax = make_syntax();
        let mut names = UniqueNames::new();
        assert_eq!(syntax.make_unique("in1", &mut names), "in1");
        assert_eq!(syntax.make_unique("in", &mut names), "in2");
        assert_eq!(syntax.make_unique("in", &mut names), "in3");
        assert_eq!(names.get("in"), Some(&3));
    }

    #[test]
    fn invalid_tokens_are_replaced() {
        let syntax = make_syntax();
        assert_eq!(syntax.make_valid_name("gl_Position"), "gllPosition");
        assert_eq!(syntax.make_valid_name("a__b"), "a_b");
        assert_eq!(syntax.make_valid_name("node.out"), "node_out");
        assert_eq!(syntax.make_valid_name("1st"), "_1st");
    }

    #[test]
    fn unsupported_type_reports_target() {
        let syntax = make_syntax();
        let err = syntax.type_name(Type::Bsdf).unwrap_err();
        assert!(err.to_string().contains("'test'"));
    }

    #[test]
    fn empty_value_list_fails() {
        let syntax = make_syntax();
        assert!(matches!(
            syntax.aggregate_value(Type::Vector3, &[], false),
            Err(SyntaxError::EmptyValues { ty: Type::Vector3 })
        ));
    }
}
