//! The supported target languages.

pub mod glsl;
pub mod mdl;
pub mod osl;
pub mod slang;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyntaxError;
use crate::syntax::Syntax;

/// Stage names of hardware targets, in emission order.
pub const HW_STAGES: &[&str] = &["vertex", "pixel"];
/// Stage names of targets with a single stage.
pub const PIXEL_STAGE: &[&str] = &["pixel"];

/// A target shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Glsl,
    Osl,
    Mdl,
    Slang,
}

impl Target {
    pub const ALL: [Target; 4] = [Target::Glsl, Target::Osl, Target::Mdl, Target::Slang];

    /// Short name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Target::Glsl => "glsl",
            Target::Osl => "osl",
            Target::Mdl => "mdl",
            Target::Slang => "slang",
        }
    }

    /// Name implementations use to select this target, e.g. `genglsl`.
    pub fn target_name(self) -> &'static str {
        match self {
            Target::Glsl => "genglsl",
            Target::Osl => "genosl",
            Target::Mdl => "genmdl",
            Target::Slang => "genslang",
        }
    }

    /// Hardware (rasterization) targets run a vertex and a pixel stage and
    /// evaluate closures through closure contexts.
    pub fn is_hw(self) -> bool {
        matches!(self, Target::Glsl | Target::Slang)
    }

    pub fn stage_names(self) -> &'static [&'static str] {
        if self.is_hw() {
            HW_STAGES
        } else {
            PIXEL_STAGE
        }
    }

    /// Build the syntax tables for this target.
    pub fn syntax(self) -> Syntax {
        match self {
            Target::Glsl => glsl::syntax(),
            Target::Osl => osl::syntax(),
            Target::Mdl => mdl::syntax(),
            Target::Slang => slang::syntax(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Target::ALL
            .iter()
            .copied()
            .find(|t| t.name() == lower || t.target_name() == lower)
            .ok_or_else(|| SyntaxError::UnknownTarget(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadegen_core::Type;

    #[test]
    fn parse_short_and_generator_names() {
        assert_eq!("glsl".parse::<Target>().unwrap(), Target::Glsl);
        assert_eq!("genosl".parse::<Target>().unwrap(), Target::Osl);
        assert_eq!("Slang".parse::<Target>().unwrap(), Target::Slang);
        assert!(matches!(
            "hlsl".parse::<Target>(),
            Err(SyntaxError::UnknownTarget(_))
        ));
    }

    #[test]
    fn stages_per_target() {
        assert_eq!(Target::Glsl.stage_names(), &["vertex", "pixel"]);
        assert_eq!(Target::Osl.stage_names(), &["pixel"]);
        assert!(!Target::Mdl.is_hw());
    }

    #[test]
    fn every_target_covers_the_editable_types() {
        for target in Target::ALL {
            let syntax = target.syntax();
            assert_eq!(syntax.target(), target.target_name());
            for ty in Type::ALL {
                if ty.is_editable() || ty.is_shader_semantic() {
                    assert!(syntax.supports_type(ty), "{target} lacks {ty}");
                }
            }
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Target::Mdl).unwrap();
        assert_eq!(json, "\"mdl\"");
    }
}
