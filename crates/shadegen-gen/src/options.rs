//! Generation options.
//!
//! Options are read from TOML. Every field has a default, unknown keys are
//! ignored, and an unrecognized enum value falls back to its default with a
//! warning: no option makes generation fail on its own.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which node inputs become part of the shader's public interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShaderInterfaceType {
    /// Every unconnected editable input is published as a uniform.
    #[default]
    Complete,
    /// Only graph interface inputs are published.
    Reduced,
}

/// Specular environment lighting strategy on hardware targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpecularEnvironmentMethod {
    /// No environment lighting.
    None,
    /// Sample a prefiltered environment map.
    Prefilter,
    /// Filtered importance sampling.
    #[default]
    Fis,
}

impl SpecularEnvironmentMethod {
    /// Name of the preprocessor constant selecting this method.
    pub fn define_name(self) -> &'static str {
        match self {
            SpecularEnvironmentMethod::None => "SPECULAR_ENVIRONMENT_NONE",
            SpecularEnvironmentMethod::Prefilter => "SPECULAR_ENVIRONMENT_PREFILTER",
            SpecularEnvironmentMethod::Fis => "SPECULAR_ENVIRONMENT_FIS",
        }
    }
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                match value.to_ascii_lowercase().as_str() {
                    $($text => $ty::$variant,)+
                    _ => {
                        let fallback = $ty::default();
                        log::warn!(
                            "unknown {} '{}', using '{}'",
                            stringify!($ty),
                            value,
                            fallback.as_str()
                        );
                        fallback
                    }
                }
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(ShaderInterfaceType {
    Complete => "complete",
    Reduced => "reduced",
});

string_enum!(SpecularEnvironmentMethod {
    None => "none",
    Prefilter => "prefilter",
    Fis => "fis",
});

/// Options for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenOptions {
    pub shader_interface_type: ShaderInterfaceType,
    /// Working color space that color transforms convert into. Falls back
    /// to the document color space when unset.
    pub target_color_space_override: Option<String>,
    /// Distance unit that unit conversions convert into.
    pub target_distance_unit: Option<String>,
    /// Flip the V texture coordinate when sampling file textures.
    pub file_texture_vertical_flip: bool,
    /// Emit transparency code paths on hardware targets.
    pub hw_transparency: bool,
    pub hw_specular_environment_method: SpecularEnvironmentMethod,
    pub hw_max_active_light_sources: u32,
    /// Emit comments for nodes omitted from the main body.
    pub emit_debug_comments: bool,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            shader_interface_type: ShaderInterfaceType::Complete,
            target_color_space_override: None,
            target_distance_unit: None,
            file_texture_vertical_flip: false,
            hw_transparency: false,
            hw_specular_environment_method: SpecularEnvironmentMethod::Fis,
            hw_max_active_light_sources: 3,
            emit_debug_comments: true,
        }
    }
}

impl GenOptions {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options = Self::from_toml_str(&content)?;
        log::debug!("loaded options from {}", path.display());
        Ok(options)
    }
}
