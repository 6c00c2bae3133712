//! Error types for target syntax operations.

use shadegen_core::Type;

/// Errors that can occur while formatting types and values for a target.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    /// The target has no syntax registered for a type.
    #[error("No syntax is defined for the given type '{ty}' in target '{target}'")]
    UnsupportedType {
        /// The type that has no syntax.
        ty: Type,
        /// Short name of the target.
        target: String,
    },

    /// A channel pattern contains a character that is not a channel letter.
    #[error("Invalid channel pattern '{pattern}'")]
    InvalidChannelPattern {
        /// The full pattern as given.
        pattern: String,
    },

    /// A channel letter addresses a component the source type does not have.
    #[error("Given channel index: '{channel}' in channels pattern '{pattern}' is incorrect for type '{ty}'")]
    ChannelOutOfRange {
        channel: char,
        pattern: String,
        ty: Type,
    },

    /// An aggregate value was requested from an empty component list.
    #[error("No values given to construct a value of type '{ty}'")]
    EmptyValues { ty: Type },

    /// An aggregate value was requested with too few components.
    #[error("Too few values given to construct a value of type '{ty}': expected {expected}, found {found}")]
    TooFewValues {
        ty: Type,
        expected: usize,
        found: usize,
    },

    /// A target name that does not match any known target.
    #[error("unknown target '{0}' (expected glsl, osl, mdl or slang)")]
    UnknownTarget(String),
}

/// Result type for syntax operations.
pub type Result<T> = std::result::Result<T, SyntaxError>;
