//! Target-language syntax for the shadegen shader compiler.
//!
//! Each target maps the abstract type registry onto its own type names and
//! literal forms, and defines which identifiers it reserves:
//! - **GLSL** and **Slang:** hardware targets with vertex and pixel stages
//! - **OSL:** closure-based offline shading, a single shader body
//! - **MDL:** material definitions, functions returning values

pub mod error;
pub mod syntax;
pub mod targets;

pub use error::{Result, SyntaxError};
pub use syntax::{
    AliasStyle, ArrayDeclaration, ArrayStyle, CallStyle, Syntax, TypeSyntax, UniqueNames,
    ValueStyle,
};
pub use targets::Target;
