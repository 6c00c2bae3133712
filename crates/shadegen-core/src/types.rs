//! The closed registry of value types carried by shader ports.
//!
//! Every port in a shader graph has exactly one of these types. The set is
//! fixed: scalars, aggregates (vectors, colors, matrices), arrays, strings,
//! and the shader-semantic types (closures, shaders, materials) that only
//! exist as connections between nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Storage class of a type's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    None,
    Boolean,
    Integer,
    Float,
    String,
}

/// What a type means, beyond its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semantic {
    None,
    Color,
    Vector,
    Matrix,
    Filename,
    Closure,
    Shader,
    Material,
}

/// A value type from the closed type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Type {
    None,
    MultiOutput,
    Boolean,
    Integer,
    IntegerArray,
    Float,
    FloatArray,
    Color2,
    Color3,
    Color4,
    Vector2,
    Vector3,
    Vector4,
    Matrix33,
    Matrix44,
    String,
    Filename,
    Bsdf,
    Edf,
    Vdf,
    SurfaceShader,
    VolumeShader,
    DisplacementShader,
    LightShader,
    Material,
}

struct TypeInfo {
    name: &'static str,
    base: BaseType,
    semantic: Semantic,
    size: usize,
    editable: bool,
}

const fn info(
    name: &'static str,
    base: BaseType,
    semantic: Semantic,
    size: usize,
    editable: bool,
) -> TypeInfo {
    TypeInfo {
        name,
        base,
        semantic,
        size,
        editable,
    }
}

impl Type {
    /// Every registered type, in registry order.
    pub const ALL: [Type; 25] = [
        Type::None,
        Type::MultiOutput,
        Type::Boolean,
        Type::Integer,
        Type::IntegerArray,
        Type::Float,
        Type::FloatArray,
        Type::Color2,
        Type::Color3,
        Type::Color4,
        Type::Vector2,
        Type::Vector3,
        Type::Vector4,
        Type::Matrix33,
        Type::Matrix44,
        Type::String,
        Type::Filename,
        Type::Bsdf,
        Type::Edf,
        Type::Vdf,
        Type::SurfaceShader,
        Type::VolumeShader,
        Type::DisplacementShader,
        Type::LightShader,
        Type::Material,
    ];

    fn info(self) -> TypeInfo {
        use BaseType as B;
        use Semantic as S;
        match self {
            Type::None => info("none", B::None, S::None, 0, false),
            Type::MultiOutput => info("multioutput", B::None, S::None, 0, false),
            Type::Boolean => info("boolean", B::Boolean, S::None, 1, true),
            Type::Integer => info("integer", B::Integer, S::None, 1, true),
            Type::IntegerArray => info("integerarray", B::Integer, S::None, 0, true),
            Type::Float => info("float", B::Float, S::None, 1, true),
            Type::FloatArray => info("floatarray", B::Float, S::None, 0, true),
            Type::Color2 => info("color2", B::Float, S::Color, 2, true),
            Type::Color3 => info("color3", B::Float, S::Color, 3, true),
            Type::Color4 => info("color4", B::Float, S::Color, 4, true),
            Type::Vector2 => info("vector2", B::Float, S::Vector, 2, true),
            Type::Vector3 => info("vector3", B::Float, S::Vector, 3, true),
            Type::Vector4 => info("vector4", B::Float, S::Vector, 4, true),
            Type::Matrix33 => info("matrix33", B::Float, S::Matrix, 9, true),
            Type::Matrix44 => info("matrix44", B::Float, S::Matrix, 16, true),
            Type::String => info("string", B::String, S::None, 1, true),
            Type::Filename => info("filename", B::String, S::Filename, 1, true),
            Type::Bsdf => info("BSDF", B::None, S::Closure, 1, false),
            Type::Edf => info("EDF", B::None, S::Closure, 1, false),
            Type::Vdf => info("VDF", B::None, S::Closure, 1, false),
            Type::SurfaceShader => info("surfaceshader", B::None, S::Shader, 1, false),
            Type::VolumeShader => info("volumeshader", B::None, S::Shader, 1, false),
            Type::DisplacementShader => {
                info("displacementshader", B::None, S::Shader, 1, false)
            }
            Type::LightShader => info("lightshader", B::None, S::Shader, 1, false),
            Type::Material => info("material", B::None, S::Material, 1, false),
        }
    }

    /// The registry name, as written in documents.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn base_type(self) -> BaseType {
        self.info().base
    }

    pub fn semantic(self) -> Semantic {
        self.info().semantic
    }

    /// Number of components. Arrays report 0 (their length is value-dependent).
    pub fn size(self) -> usize {
        self.info().size
    }

    /// Whether a port of this type can be published as a user-facing uniform.
    pub fn is_editable(self) -> bool {
        self.info().editable
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Type::Boolean | Type::Integer | Type::Float)
    }

    /// Vectors, colors and matrices: fixed-size float aggregates.
    pub fn is_aggregate(self) -> bool {
        self.base_type() == BaseType::Float && self.size() > 1
    }

    pub fn is_array(self) -> bool {
        matches!(self, Type::IntegerArray | Type::FloatArray)
    }

    pub fn is_closure(self) -> bool {
        self.semantic() == Semantic::Closure
    }

    /// Closures, shaders and materials: types only ever produced by nodes.
    pub fn is_shader_semantic(self) -> bool {
        matches!(
            self.semantic(),
            Semantic::Closure | Semantic::Shader | Semantic::Material
        )
    }

    /// Channel index of a swizzle character for this type, if the type has it.
    ///
    /// Colors use `rgba` (color2 is `ra`), vectors use `xyzw`, scalars accept
    /// `r` and `x` for their single component.
    pub fn channel_index(self, channel: char) -> Option<usize> {
        match self.semantic() {
            Semantic::Color if self == Type::Color2 => match channel {
                'r' => Some(0),
                'a' => Some(1),
                _ => None,
            },
            Semantic::Color => "rgba".find(channel),
            Semantic::Vector => "xyzw".find(channel),
            _ if self.is_scalar() => matches!(channel, 'r' | 'x').then_some(0),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Type {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Type::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| DocumentError::UnknownType(s.to_string()))
    }
}

impl TryFrom<String> for Type {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Type> for String {
    fn from(ty: Type) -> Self {
        ty.name().to_string()
    }
}
