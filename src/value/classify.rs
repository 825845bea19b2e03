//! JSON type classification used to gate every merge decision.

use std::fmt;

use super::Value;

/// JsonType is the JSON data-model kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Unknown,
    Null,
    Boolean,
    String,
    Number,
    Integer,
    Array,
    Object,
}

impl JsonType {
    /// Returns the JSON Schema name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Unknown => "unknown",
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Returns true for types that carry no nested values.
    pub fn is_simple(&self) -> bool {
        !matches!(self, JsonType::Array | JsonType::Object)
    }

    /// Reports whether two classified types count as the same kind.
    ///
    /// Integers and numbers form one family: a document may spell `1` as
    /// `1.0` and still mean the same number.
    pub fn is_compatible(&self, other: JsonType) -> bool {
        match (self, other) {
            (JsonType::Integer | JsonType::Number, JsonType::Integer | JsonType::Number) => true,
            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a value into its JSON type.
///
/// Non-finite floats cannot be written as JSON and classify as `Unknown`.
pub fn classify(value: &Value) -> JsonType {
    match value {
        Value::Null => JsonType::Null,
        Value::Bool(_) => JsonType::Boolean,
        Value::Int(_) => JsonType::Integer,
        Value::Float(f) if f.is_finite() => JsonType::Number,
        Value::Float(_) => JsonType::Unknown,
        Value::String(_) => JsonType::String,
        Value::List(_) => JsonType::Array,
        Value::Map(_) => JsonType::Object,
    }
}

/// Reports whether two values have compatible JSON types.
pub fn same_kind(a: &Value, b: &Value) -> bool {
    classify(a).is_compatible(classify(b))
}
