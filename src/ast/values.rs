use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A literal carried by a statement (column value or predicate parameter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL
    Null,
    /// Text literal
    String(String),
    /// Integer literal
    Integer(i64),
    /// Floating point literal
    Float(f64),
    /// Boolean literal
    Boolean(bool),
    /// Database-side expression, emitted verbatim (e.g. `NOW()`)
    Computed(String),
    /// Timestamp literal
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Apply `f` to the text of a string value; every other variant is returned as-is.
    pub fn map_string(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Value::String(s) => Value::String(f(&s)),
            other => other,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Computed(expr) => write!(f, "{}", expr),
            Value::Timestamp(ts) => write!(f, "'{}'", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}
