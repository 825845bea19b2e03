//! Structural validation of values against the supported JSON-Schema subset.

use serde_json::Number;

use crate::fieldpath::Path;
use crate::schema::{ExclusiveBound, ExtraKeys, Schema, SchemaNode};
use crate::value::{classify, JsonType, Map, Value};

use super::errors::{DocumentError, ValidationError, ValidationErrors, Violation};

/// Default nesting limit for documents checked by [`SchemaValidator`].
pub const DEFAULT_VALIDATION_DEPTH: usize = 128;

/// Validator is the capability the merge engine uses to gate its decisions.
pub trait Validator {
    /// Validates a value against a schema node, collecting every violation.
    fn validate(&self, node: SchemaNode<'_>, value: &Value) -> Result<(), ValidationErrors>;

    /// Reports whether a value satisfies a schema node.
    fn is_valid(&self, node: SchemaNode<'_>, value: &Value) -> bool {
        self.validate(node, value).is_ok()
    }
}

/// SchemaValidator is a small hand-written validator for the keyword subset
/// the schema model understands. Unknown keywords are ignored.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator {
    max_depth: usize,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        SchemaValidator {
            max_depth: DEFAULT_VALIDATION_DEPTH,
        }
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deepest document nesting the validator will walk.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validates a value against the root of a schema.
    pub fn validate_value(&self, schema: &Schema, value: &Value) -> Result<(), ValidationErrors> {
        self.validate(schema.node(), value)
    }

    /// Parses a JSON document and validates it against the root of a schema.
    pub fn validate_bytes(&self, schema: &Schema, bytes: &[u8]) -> Result<(), DocumentError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(self.validate_value(schema, &value)?)
    }

    /// Parses a JSON document and validates it against the root of a schema.
    pub fn validate_str(&self, schema: &Schema, json: &str) -> Result<(), DocumentError> {
        self.validate_bytes(schema, json.as_bytes())
    }

    /// Parses a YAML document and validates it against the root of a schema.
    pub fn validate_yaml(&self, schema: &Schema, yaml: &str) -> Result<(), DocumentError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Ok(self.validate_value(schema, &value)?)
    }

    fn walk(&self, node: SchemaNode<'_>, value: &Value, fail_fast: bool) -> ValidationErrors {
        let mut walk = Walk {
            max_depth: self.max_depth,
            fail_fast,
            errors: ValidationErrors::new(),
        };
        walk.check(node, value, &Path::root(), 0);
        walk.errors
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, node: SchemaNode<'_>, value: &Value) -> Result<(), ValidationErrors> {
        self.walk(node, value, false).into_result()
    }

    fn is_valid(&self, node: SchemaNode<'_>, value: &Value) -> bool {
        self.walk(node, value, true).is_empty()
    }
}

/// Walk carries the state of one validation pass.
struct Walk {
    max_depth: usize,
    fail_fast: bool,
    errors: ValidationErrors,
}

impl Walk {
    fn report(&mut self, path: &Path, violation: Violation) {
        self.errors.push(ValidationError::new(path, violation));
    }

    fn constraint(&mut self, path: &Path, message: impl Into<String>) {
        self.report(path, Violation::Constraint(message.into()));
    }

    fn done(&self) -> bool {
        self.fail_fast && !self.errors.is_empty()
    }

    /// Runs a fail-fast sub-check that does not report into this walk.
    fn matches(&self, node: SchemaNode<'_>, value: &Value, path: &Path, depth: usize) -> bool {
        let mut sub = Walk {
            max_depth: self.max_depth,
            fail_fast: true,
            errors: ValidationErrors::new(),
        };
        sub.check(node, value, path, depth);
        sub.errors.is_empty()
    }

    fn check(&mut self, node: SchemaNode<'_>, value: &Value, path: &Path, depth: usize) {
        if depth > self.max_depth {
            self.constraint(path, format!("document nesting exceeds {} levels", self.max_depth));
            return;
        }
        let node = match node.resolve() {
            Ok(node) => node,
            Err(err) => {
                self.report(path, Violation::Schema(err.to_string()));
                return;
            }
        };
        let ty = node.ty();

        if let Some(type_name) = &ty.type_name {
            let names = type_name.names();
            if !names.iter().any(|name| matches_type_name(name, value)) {
                self.report(
                    path,
                    Violation::WrongType {
                        expected: names.join("|"),
                        found: classify(value),
                    },
                );
                if self.done() {
                    return;
                }
            }
        }

        if let Some(allowed) = &ty.enum_values {
            if !allowed.iter().any(|candidate| candidate.json_eq(value)) {
                self.constraint(path, "value is not one of the enumerated values");
                if self.done() {
                    return;
                }
            }
        }

        match value {
            Value::Int(_) | Value::Float(_) => self.check_number(node, value, path),
            Value::String(s) => self.check_string(node, s, path),
            Value::List(items) => self.check_array(node, items, path, depth),
            Value::Map(map) => self.check_object(node, map, path, depth),
            Value::Null | Value::Bool(_) => {}
        }
        if self.done() {
            return;
        }

        self.check_composition(node, value, path, depth);
    }

    fn check_number(&mut self, node: SchemaNode<'_>, value: &Value, path: &Path) {
        let ty = node.ty();
        let Some(n) = value.as_f64() else {
            return;
        };

        let strict_min = ty.exclusive_minimum.as_ref().is_some_and(ExclusiveBound::is_strict_flag);
        if let Some(min) = ty.minimum.as_ref().and_then(Number::as_f64) {
            if n < min || (strict_min && n == min) {
                self.constraint(path, format!("{} is less than the minimum of {}", n, min));
            }
        }
        if let Some(min) = ty.exclusive_minimum.as_ref().and_then(ExclusiveBound::limit) {
            if n <= min {
                self.constraint(path, format!("{} must be greater than {}", n, min));
            }
        }

        let strict_max = ty.exclusive_maximum.as_ref().is_some_and(ExclusiveBound::is_strict_flag);
        if let Some(max) = ty.maximum.as_ref().and_then(Number::as_f64) {
            if n > max || (strict_max && n == max) {
                self.constraint(path, format!("{} is greater than the maximum of {}", n, max));
            }
        }
        if let Some(max) = ty.exclusive_maximum.as_ref().and_then(ExclusiveBound::limit) {
            if n >= max {
                self.constraint(path, format!("{} must be less than {}", n, max));
            }
        }

        if let Some(step) = ty.multiple_of.as_ref().and_then(Number::as_f64).filter(|step| *step > 0.0) {
            let quotient = n / step;
            if (quotient - quotient.round()).abs() > 1e-9 {
                self.constraint(path, format!("{} is not a multiple of {}", n, step));
            }
        }
    }

    fn check_string(&mut self, node: SchemaNode<'_>, s: &str, path: &Path) {
        let ty = node.ty();
        let len = s.chars().count();
        if let Some(min) = ty.min_length {
            if len < min {
                self.constraint(path, format!("string is shorter than {} characters", min));
            }
        }
        if let Some(max) = ty.max_length {
            if len > max {
                self.constraint(path, format!("string is longer than {} characters", max));
            }
        }
    }

    fn check_array(&mut self, node: SchemaNode<'_>, items: &[Value], path: &Path, depth: usize) {
        let ty = node.ty();
        if let Some(min) = ty.min_items {
            if items.len() < min {
                self.constraint(path, format!("array has {} items, expected at least {}", items.len(), min));
            }
        }
        if let Some(max) = ty.max_items {
            if items.len() > max {
                self.constraint(path, format!("array has {} items, expected at most {}", items.len(), max));
            }
        }
        if ty.requires_unique_items() {
            'outer: for (i, item) in items.iter().enumerate() {
                for earlier in &items[..i] {
                    if earlier.json_eq(item) {
                        self.report(path, Violation::DuplicateItem(i));
                        break 'outer;
                    }
                }
            }
        }
        if self.done() {
            return;
        }

        if let Some(item_node) = node.items() {
            for (i, item) in items.iter().enumerate() {
                self.check(item_node, item, &path.at(i), depth + 1);
                if self.done() {
                    return;
                }
            }
        }
    }

    fn check_object(&mut self, node: SchemaNode<'_>, map: &Map, path: &Path, depth: usize) {
        let ty = node.ty();
        for key in &ty.required {
            if !map.has(key) {
                self.report(path, Violation::MissingKey(key.clone()));
            }
        }
        if let Some(min) = ty.min_properties {
            if map.len() < min {
                self.constraint(path, format!("object has {} properties, expected at least {}", map.len(), min));
            }
        }
        if let Some(max) = ty.max_properties {
            if map.len() > max {
                self.constraint(path, format!("object has {} properties, expected at most {}", map.len(), max));
            }
        }
        if self.done() {
            return;
        }

        let extra = node.extra_keys();
        for (key, field) in map.iter() {
            match node.property(key) {
                Some(property) => self.check(property, field, &path.field(key), depth + 1),
                None => match extra {
                    ExtraKeys::Allowed => {}
                    ExtraKeys::Denied => {
                        self.report(path, Violation::ExtraKey(key.clone()));
                    }
                    ExtraKeys::Schema(extra_node) => {
                        self.check(extra_node, field, &path.field(key), depth + 1)
                    }
                },
            }
            if self.done() {
                return;
            }
        }
    }

    fn check_composition(&mut self, node: SchemaNode<'_>, value: &Value, path: &Path, depth: usize) {
        for sub in node.all_of() {
            self.check(sub, value, path, depth + 1);
            if self.done() {
                return;
            }
        }

        if !node.ty().any_of.is_empty()
            && !node.any_of().any(|sub| self.matches(sub, value, path, depth + 1))
        {
            self.constraint(path, "value does not match any schema in anyOf");
        }

        if !node.ty().one_of.is_empty() {
            let matched = node
                .one_of()
                .filter(|sub| self.matches(*sub, value, path, depth + 1))
                .count();
            if matched != 1 {
                self.constraint(path, format!("value matches {} schemas in oneOf, expected exactly one", matched));
            }
        }

        if let Some(not) = node.not() {
            if self.matches(not, value, path, depth + 1) {
                self.constraint(path, "value must not match the schema in not");
            }
        }
    }
}

/// Reports whether a value satisfies one `type` name.
fn matches_type_name(name: &str, value: &Value) -> bool {
    match (name, classify(value)) {
        ("null", JsonType::Null)
        | ("boolean", JsonType::Boolean)
        | ("string", JsonType::String)
        | ("array", JsonType::Array)
        | ("object", JsonType::Object)
        | ("number", JsonType::Integer | JsonType::Number)
        | ("integer", JsonType::Integer) => true,
        ("integer", JsonType::Number) => value.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}
