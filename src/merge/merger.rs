//! Schema-guided reconciliation of a current document against a default.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fieldpath::Path;
use crate::schema::{ExtraKeys, Schema, SchemaNode};
use crate::validation::{SchemaValidator, Validator};
use crate::value::{classify, same_kind, Map, Value};

use super::unguided::merge_values;

/// Default recursion limit for [`Merger`].
pub const DEFAULT_MERGE_DEPTH: usize = 64;

/// Merger reconciles a current value with a default value under a schema.
///
/// The result always validates against the schema, or is exactly the
/// default. Subtrees of the current value are kept wherever they validate;
/// everything else is repaired from, or replaced by, the default.
///
/// The default is assumed to validate against the schema.
#[derive(Debug, Clone)]
pub struct Merger<V = SchemaValidator> {
    validator: V,
    max_depth: usize,
}

impl Default for Merger<SchemaValidator> {
    fn default() -> Self {
        Merger::with_validator(SchemaValidator::default())
    }
}

impl Merger<SchemaValidator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: Validator> Merger<V> {
    /// Creates a merger that gates its decisions with the given validator.
    pub fn with_validator(validator: V) -> Self {
        Merger {
            validator,
            max_depth: DEFAULT_MERGE_DEPTH,
        }
    }

    /// Sets the deepest nesting the merger will descend into. Anything
    /// deeper resolves to the default.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Merges `current` with `default` under the root of `schema`.
    pub fn merge(&self, current: &Value, default: &Value, schema: &Schema) -> Value {
        self.merge_at(schema.node(), current, default)
    }

    /// Merges `current` with `default` under an arbitrary schema node.
    pub fn merge_at(&self, node: SchemaNode<'_>, current: &Value, default: &Value) -> Value {
        self.merge_node(node, current, default, &Path::root(), 0)
    }

    fn is_valid(&self, node: SchemaNode<'_>, value: &Value) -> bool {
        self.validator.is_valid(node, value)
    }

    /// Returns the candidate if it validates, the default otherwise.
    fn gate(&self, node: SchemaNode<'_>, candidate: Value, default: &Value, path: &Path) -> Value {
        if self.is_valid(node, &candidate) {
            candidate
        } else {
            debug!(path = %path, "merged value fails its schema, using default");
            default.clone()
        }
    }

    fn merge_node(
        &self,
        node: SchemaNode<'_>,
        current: &Value,
        default: &Value,
        path: &Path,
        depth: usize,
    ) -> Value {
        if depth > self.max_depth {
            warn!(path = %path, max_depth = self.max_depth, "merge depth limit reached, using default");
            return default.clone();
        }
        if self.is_valid(node, current) {
            return current.clone();
        }

        let node = match node.resolve() {
            Ok(node) => node,
            Err(err) => {
                debug!(path = %path, error = %err, "schema reference does not resolve, using default");
                return default.clone();
            }
        };

        let ty = node.ty();
        if !ty.all_of.is_empty() {
            self.merge_all_of(node, current, default, path, depth)
        } else if !ty.any_of.is_empty() {
            self.merge_first_match(node, node.any_of().collect(), current, default, path, depth)
        } else if !ty.one_of.is_empty() {
            self.merge_first_match(node, node.one_of().collect(), current, default, path, depth)
        } else {
            self.merge_shape(node, current, default, path, depth)
        }
    }

    /// Threads the value through every `allOf` branch in order, then checks
    /// the result against the whole composite node.
    fn merge_all_of(
        &self,
        node: SchemaNode<'_>,
        current: &Value,
        default: &Value,
        path: &Path,
        depth: usize,
    ) -> Value {
        let mut merged = current.clone();
        for branch in node.all_of() {
            merged = self.merge_node(branch, &merged, default, path, depth + 1);
        }
        self.gate(node, merged, default, path)
    }

    /// Takes the first `anyOf`/`oneOf` branch whose merge result validates.
    ///
    /// Branches the current value already resembles are tried first, so a
    /// value written for a later branch is not coerced into an earlier one.
    fn merge_first_match(
        &self,
        node: SchemaNode<'_>,
        branches: Vec<SchemaNode<'_>>,
        current: &Value,
        default: &Value,
        path: &Path,
        depth: usize,
    ) -> Value {
        let (preferred, others): (Vec<_>, Vec<_>) = branches
            .into_iter()
            .partition(|branch| resembles(*branch, current));

        for branch in preferred.into_iter().chain(others) {
            let merged = self.merge_node(branch, current, default, path, depth + 1);
            if self.is_valid(branch, &merged) && self.is_valid(node, &merged) {
                return merged;
            }
        }
        debug!(path = %path, "no branch reconciles the current value, using default");
        default.clone()
    }

    fn merge_shape(
        &self,
        node: SchemaNode<'_>,
        current: &Value,
        default: &Value,
        path: &Path,
        depth: usize,
    ) -> Value {
        if !same_kind(current, default) {
            debug!(
                path = %path,
                current = %classify(current),
                default = %classify(default),
                "type changed, using default"
            );
            return default.clone();
        }

        let candidate = match (current, default) {
            (Value::List(items), Value::List(fallbacks)) => {
                if items.is_empty() {
                    return default.clone();
                }
                match node.items() {
                    Some(item_node) => {
                        match self.merge_list(node, item_node, items, fallbacks, path, depth) {
                            Some(list) => Value::List(list),
                            None => return default.clone(),
                        }
                    }
                    None => merge_values(current, default),
                }
            }
            (Value::Map(fields), Value::Map(fallbacks)) => {
                Value::Map(self.merge_map(node, fields, fallbacks, path, depth))
            }
            _ => merge_values(current, default),
        };
        self.gate(node, candidate, default, path)
    }

    /// Rebuilds a list from its valid or repairable items, then tops it up
    /// from the tail of the default. `None` means nothing survived and the
    /// default list should be used.
    fn merge_list(
        &self,
        node: SchemaNode<'_>,
        item_node: SchemaNode<'_>,
        items: &[Value],
        fallbacks: &[Value],
        path: &Path,
        depth: usize,
    ) -> Option<Vec<Value>> {
        let ty = node.ty();
        let max_items = ty.max_items.filter(|max| *max > 0);

        let mut merged: Vec<Value> = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if max_items.is_some_and(|max| merged.len() >= max) {
                break;
            }
            if self.is_valid(item_node, item) {
                merged.push(item.clone());
                continue;
            }
            let Some(fallback) = fallbacks.get(i) else {
                debug!(path = %path.at(i), "dropping invalid item with no default counterpart");
                continue;
            };
            let repaired = self.merge_node(item_node, item, fallback, &path.at(i), depth + 1);
            if self.is_valid(item_node, &repaired) {
                merged.push(repaired);
            } else {
                debug!(path = %path.at(i), "dropping irreparable item");
            }
        }

        if merged.is_empty() && !fallbacks.is_empty() {
            return None;
        }

        let min_items = ty.min_items.unwrap_or(0);
        let unique = ty.requires_unique_items();
        for fallback in fallbacks.iter().rev() {
            if merged.len() >= min_items {
                break;
            }
            if unique && merged.iter().any(|kept| kept.json_eq(fallback)) {
                continue;
            }
            if self.is_valid(item_node, fallback) {
                merged.push(fallback.clone());
            }
        }
        Some(merged)
    }

    /// Rebuilds an object in three passes: required keys, current keys,
    /// then padding from the default up to `minProperties`.
    fn merge_map(
        &self,
        node: SchemaNode<'_>,
        fields: &Map,
        fallbacks: &Map,
        path: &Path,
        depth: usize,
    ) -> Map {
        let ty = node.ty();
        let mut merged = Map::new();

        for key in &ty.required {
            let Some(fallback) = fallbacks.get(key) else {
                continue;
            };
            let value = match (fields.get(key), node.property(key)) {
                (None, _) => fallback.clone(),
                (Some(field), Some(property)) if !self.is_valid(property, field) => {
                    self.merge_node(property, field, fallback, &path.field(key), depth + 1)
                }
                (Some(field), _) => field.clone(),
            };
            merged.set(key.clone(), value);
        }

        let max_properties = ty.max_properties.filter(|max| *max > 0);
        let extra_keys = node.extra_keys();
        for (key, field) in fields.iter() {
            if max_properties.is_some_and(|max| merged.len() >= max) {
                break;
            }
            if merged.has(key) {
                continue;
            }
            let key_node = match (node.property(key), extra_keys) {
                (Some(property), _) => property,
                (None, ExtraKeys::Schema(extra)) => extra,
                (None, ExtraKeys::Allowed) => {
                    merged.set(key.clone(), field.clone());
                    continue;
                }
                (None, ExtraKeys::Denied) => {
                    debug!(path = %path.field(key), "dropping key no longer allowed by schema");
                    continue;
                }
            };
            if self.is_valid(key_node, field) {
                merged.set(key.clone(), field.clone());
            } else if let Some(fallback) = fallbacks.get(key) {
                let repaired = self.merge_node(key_node, field, fallback, &path.field(key), depth + 1);
                if self.is_valid(key_node, &repaired) {
                    merged.set(key.clone(), repaired);
                }
            } else {
                debug!(path = %path.field(key), "dropping invalid key with no default");
            }
        }

        let min_properties = ty.min_properties.unwrap_or(0);
        for (key, fallback) in fallbacks.iter() {
            if merged.len() >= min_properties {
                break;
            }
            if !merged.has(key) {
                merged.set(key.clone(), fallback.clone());
            }
        }
        merged
    }
}

/// Reports whether a value already has the shape a branch describes: its
/// kind is admitted by the branch `type` and, for objects, every required
/// key of the branch is present.
fn resembles(branch: SchemaNode<'_>, value: &Value) -> bool {
    let Ok(branch) = branch.resolve() else {
        return false;
    };
    let ty = branch.ty();
    if let Some(type_name) = &ty.type_name {
        if !type_name.admits(classify(value)) {
            return false;
        }
    }
    match value {
        Value::Map(fields) => ty.required.iter().all(|key| fields.has(key)),
        _ => true,
    }
}

/// Merges `current` with `default` under `schema` using the built-in validator.
pub fn merge(current: &Value, default: &Value, schema: &Schema) -> Value {
    Merger::new().merge(current, default, schema)
}

/// MergeRequest bundles the three inputs of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub current: Value,
    pub default: Value,
    pub schema: Schema,
}

impl MergeRequest {
    pub fn new(current: Value, default: Value, schema: Schema) -> Self {
        MergeRequest {
            current,
            default,
            schema,
        }
    }

    /// Runs the request with the given merger.
    pub fn run_with<V: Validator>(&self, merger: &Merger<V>) -> Value {
        merger.merge(&self.current, &self.default, &self.schema)
    }

    /// Runs the request with a default merger.
    pub fn run(&self) -> Value {
        self.run_with(&Merger::new())
    }
}
