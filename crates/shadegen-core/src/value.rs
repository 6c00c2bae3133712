//! Typed literal values parsed from document strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};
use crate::types::{BaseType, Type};

/// A literal value attached to a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Float(f32),
    /// Components of a vector, color or matrix, in declaration order.
    Aggregate(Vec<f32>),
    IntegerArray(Vec<i32>),
    FloatArray(Vec<f32>),
    String(String),
}

impl Value {
    /// Parse a document value string as the given type.
    pub fn parse(ty: Type, text: &str) -> Result<Value> {
        let invalid = |reason: String| DocumentError::InvalidValue {
            value: text.to_string(),
            ty,
            reason,
        };
        let text_trimmed = text.trim();

        match ty {
            Type::Boolean => match text_trimmed {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid("expected true or false".into())),
            },
            Type::Integer => text_trimmed
                .parse()
                .map(Value::Integer)
                .map_err(|e| invalid(format!("{e}"))),
            Type::Float => text_trimmed
                .parse()
                .map(Value::Float)
                .map_err(|e| invalid(format!("{e}"))),
            Type::IntegerArray => split_components(text_trimmed)
                .map(|c| c.parse::<i32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::IntegerArray)
                .map_err(|e| invalid(format!("{e}"))),
            Type::FloatArray => parse_floats(text_trimmed)
                .map(Value::FloatArray)
                .map_err(invalid),
            Type::String | Type::Filename => Ok(Value::String(text.to_string())),
            _ if ty.is_aggregate() => {
                let components = parse_floats(text_trimmed).map_err(invalid)?;
                if components.len() != ty.size() {
                    return Err(DocumentError::InvalidValue {
                        value: text.to_string(),
                        ty,
                        reason: format!(
                            "expected {} components, found {}",
                            ty.size(),
                            components.len()
                        ),
                    });
                }
                Ok(Value::Aggregate(components))
            }
            _ => Err(invalid("type has no literal form".into())),
        }
    }

    /// The value printed the way documents write it: components joined by `", "`.
    pub fn value_string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Aggregate(c) | Value::FloatArray(c) => {
                c.iter().map(|f| format_float(*f)).collect::<Vec<_>>().join(", ")
            }
            Value::IntegerArray(c) => {
                c.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
            }
            Value::String(s) => s.clone(),
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements in an array value.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::FloatArray(v) => Some(v.len()),
            Value::IntegerArray(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Whether this value can be stored in a port of the given type.
    pub fn fits(&self, ty: Type) -> bool {
        match (self, ty.base_type()) {
            (Value::Boolean(_), BaseType::Boolean) => true,
            (Value::Integer(_), BaseType::Integer) => !ty.is_array(),
            (Value::Float(_), BaseType::Float) => ty == Type::Float,
            (Value::Aggregate(c), BaseType::Float) => ty.is_aggregate() && c.len() == ty.size(),
            (Value::IntegerArray(_), _) => ty == Type::IntegerArray,
            (Value::FloatArray(_), _) => ty == Type::FloatArray,
            (Value::String(_), BaseType::String) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value_string())
    }
}

/// Print a float so that whole numbers keep a decimal point.
pub fn format_float(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e9 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn split_components(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|c| !c.is_empty())
}

fn parse_floats(text: &str) -> std::result::Result<Vec<f32>, String> {
    split_components(text)
        .map(|c| c.parse::<f32>().map_err(|e| format!("'{c}': {e}")))
        .collect()
}
