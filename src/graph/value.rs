//! Literal attribute values
//!
//! Literals are the values a node stores inline, as opposed to link
//! attributes which are edges to other nodes. Classification matches a
//! stored value against a schema by its [`LiteralKind`], never by any
//! subtype relaxation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal scalar stored inline on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

/// Runtime kind of a [`Value`], used for exact-match type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl Value {
    /// The runtime kind of this value.
    pub fn kind(&self) -> LiteralKind {
        match self {
            Value::Text(_) => LiteralKind::Text,
            Value::Integer(_) => LiteralKind::Integer,
            Value::Float(_) => LiteralKind::Float,
            Value::Boolean(_) => LiteralKind::Boolean,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl LiteralKind {
    /// Kind name as used in error messages and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            LiteralKind::Text => "Text",
            LiteralKind::Integer => "Integer",
            LiteralKind::Float => "Float",
            LiteralKind::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

// Convenience conversions
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
