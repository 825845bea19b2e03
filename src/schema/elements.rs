//! Core schema elements: the JSON-Schema node and its keyword types.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::collections::BTreeMap;

use super::resolve::{SchemaError, SchemaNode};
use crate::value::{JsonType, Value};

/// Definitions is the table of named sub-schemas addressed by `#/definitions/<name>`.
pub type Definitions = BTreeMap<String, Type>;

/// Type is one JSON-Schema node.
///
/// Only the keywords the reconciliation engine and validator understand are
/// modelled as fields. Every other keyword (`pattern`, `x-*` vendor keys, ...)
/// lands in `extensions` and is re-emitted verbatim on serialization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Type {
    #[serde(rename = "$schema")]
    pub schema_uri: Option<String>,

    #[serde(rename = "$id")]
    pub id: Option<String>,

    /// Reference to a named definition.
    #[serde(rename = "$ref")]
    pub reference: Option<String>,

    pub title: Option<String>,
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub type_name: Option<TypeName>,

    pub format: Option<String>,

    /// `Some(Value::Null)` for an explicit `"default": null`.
    #[serde(deserialize_with = "present")]
    pub default: Option<Value>,

    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Value>>,

    // Numbers
    pub multiple_of: Option<Number>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: Option<ExclusiveBound>,
    pub exclusive_maximum: Option<ExclusiveBound>,

    // Strings
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,

    // Arrays
    pub items: Option<Box<Type>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: Option<bool>,

    // Objects
    pub properties: BTreeMap<String, Type>,
    pub required: Vec<String>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub additional_properties: Option<AdditionalProperties>,

    // Composition
    pub all_of: Vec<Type>,
    pub any_of: Vec<Type>,
    pub one_of: Vec<Type>,
    pub not: Option<Box<Type>>,

    pub definitions: Definitions,

    /// Unrecognized keywords, preserved opaquely.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

/// TypeName is the value of the `type` keyword: one name or a list of names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeName {
    Single(String),
    Multiple(Vec<String>),
}

impl TypeName {
    pub fn names(&self) -> Vec<&str> {
        match self {
            TypeName::Single(name) => vec![name.as_str()],
            TypeName::Multiple(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// Returns true if the given name is one of the declared type names.
    pub fn includes(&self, name: &str) -> bool {
        self.names().contains(&name)
    }

    /// Reports whether a value of the given kind could satisfy this `type`.
    ///
    /// Numeric kinds are matched loosely; the validator decides whether a
    /// float is integral enough for `integer`.
    pub fn admits(&self, kind: JsonType) -> bool {
        self.names().into_iter().any(|name| match name {
            "integer" | "number" => matches!(kind, JsonType::Integer | JsonType::Number),
            other => other == kind.as_str(),
        })
    }
}

/// ExclusiveBound supports both the draft-4 boolean and the draft-6 numeric form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExclusiveBound {
    Flag(bool),
    Limit(Number),
}

impl ExclusiveBound {
    /// True for the boolean form that makes `minimum`/`maximum` strict.
    pub fn is_strict_flag(&self) -> bool {
        matches!(self, ExclusiveBound::Flag(true))
    }

    /// The numeric form's own limit.
    pub fn limit(&self) -> Option<f64> {
        match self {
            ExclusiveBound::Limit(n) => n.as_f64(),
            ExclusiveBound::Flag(_) => None,
        }
    }
}

/// Keeps an explicit `null` apart from an absent key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// AdditionalProperties is either a boolean switch or a schema for extra keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Type>),
}

impl Default for AdditionalProperties {
    fn default() -> Self {
        AdditionalProperties::Allowed(true)
    }
}

impl Type {
    /// Returns true if the node declares `type: object`.
    pub fn declares_object(&self) -> bool {
        self.type_name.as_ref().is_some_and(|t| t.includes("object"))
    }

    /// Returns true if the node declares `type: array`.
    pub fn declares_array(&self) -> bool {
        self.type_name.as_ref().is_some_and(|t| t.includes("array"))
    }

    pub fn requires_unique_items(&self) -> bool {
        self.unique_items == Some(true)
    }

    /// Returns all directly nested schema nodes, excluding `definitions`.
    pub fn children(&self) -> Vec<&Type> {
        let mut children: Vec<&Type> = Vec::new();
        if let Some(items) = &self.items {
            children.push(items);
        }
        children.extend(self.properties.values());
        if let Some(AdditionalProperties::Schema(extra)) = &self.additional_properties {
            children.push(extra);
        }
        children.extend(self.all_of.iter());
        children.extend(self.any_of.iter());
        children.extend(self.one_of.iter());
        if let Some(not) = &self.not {
            children.push(not);
        }
        children
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        macro_rules! entry {
            ($key:expr, $field:expr) => {
                if let Some(value) = &$field {
                    map.serialize_entry($key, value)?;
                }
            };
        }

        entry!("$schema", self.schema_uri);
        entry!("$id", self.id);
        entry!("$ref", self.reference);
        entry!("title", self.title);
        entry!("description", self.description);
        entry!("type", self.type_name);
        entry!("format", self.format);
        entry!("default", self.default);
        entry!("enum", self.enum_values);
        entry!("multipleOf", self.multiple_of);
        entry!("minimum", self.minimum);
        entry!("maximum", self.maximum);
        entry!("exclusiveMinimum", self.exclusive_minimum);
        entry!("exclusiveMaximum", self.exclusive_maximum);
        entry!("minLength", self.min_length);
        entry!("maxLength", self.max_length);
        entry!("items", self.items);
        entry!("minItems", self.min_items);
        entry!("maxItems", self.max_items);
        entry!("uniqueItems", self.unique_items);

        // Object schemas always carry explicit properties and required lists
        // so stored documents diff stably.
        let object = self.declares_object();
        if object || !self.properties.is_empty() {
            map.serialize_entry("properties", &self.properties)?;
        }
        if object || !self.required.is_empty() {
            map.serialize_entry("required", &self.required)?;
        }
        entry!("minProperties", self.min_properties);
        entry!("maxProperties", self.max_properties);
        entry!("additionalProperties", self.additional_properties);

        if !self.all_of.is_empty() {
            map.serialize_entry("allOf", &self.all_of)?;
        }
        if !self.any_of.is_empty() {
            map.serialize_entry("anyOf", &self.any_of)?;
        }
        if !self.one_of.is_empty() {
            map.serialize_entry("oneOf", &self.one_of)?;
        }
        entry!("not", self.not);
        if !self.definitions.is_empty() {
            map.serialize_entry("definitions", &self.definitions)?;
        }

        for (key, value) in &self.extensions {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Schema is a root schema document.
///
/// The root node owns the `definitions` table that every nested `$ref`
/// resolves against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    root: Type,
}

impl Schema {
    /// Wraps an already built root node.
    pub fn new(root: Type) -> Self {
        Schema { root }
    }

    /// Parses a schema from JSON without checking references.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a schema from YAML without checking references.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Builds a schema from an in-memory document without checking references.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        Ok(serde_json::from_value(value.clone().into())?)
    }

    /// Parses a JSON or YAML schema document and verifies that every `$ref`
    /// in it resolves.
    pub fn compile(raw: &str) -> Result<Self, SchemaError> {
        let schema = if raw.trim_start().starts_with('{') {
            Self::from_json(raw)?
        } else {
            Self::from_yaml(raw)?
        };
        schema.check_references()?;
        Ok(schema)
    }

    /// Verifies that every `$ref` reachable from the root or from a
    /// definition resolves to a concrete schema node.
    pub fn check_references(&self) -> Result<(), SchemaError> {
        let mut pending: Vec<&Type> = vec![&self.root];
        pending.extend(self.root.definitions.values());
        while let Some(ty) = pending.pop() {
            if ty.reference.is_some() {
                SchemaNode::new(ty, &self.root.definitions).resolve()?;
            }
            pending.extend(ty.children());
        }
        Ok(())
    }

    pub fn root(&self) -> &Type {
        &self.root
    }

    pub fn definitions(&self) -> &Definitions {
        &self.root.definitions
    }

    /// Returns a copy of this schema with the given definitions injected.
    ///
    /// Injected definitions replace same-named ones from the document.
    pub fn with_definitions(&self, definitions: &Definitions) -> Schema {
        let mut root = self.root.clone();
        for (name, ty) in definitions {
            root.definitions.insert(name.clone(), ty.clone());
        }
        Schema { root }
    }

    /// Returns the root node, ready for resolution and traversal.
    pub fn node(&self) -> SchemaNode<'_> {
        SchemaNode::new(&self.root, &self.root.definitions)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

impl From<Type> for Schema {
    fn from(root: Type) -> Self {
        Schema { root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        let schema = Schema::from_json(
            r#"{
                "type": "object",
                "properties": {
                    "level": {"type": "integer", "minimum": 1, "maximum": 5},
                    "tags": {"type": "array", "items": {"type": "string"}, "minItems": 1, "uniqueItems": true}
                },
                "required": ["level"],
                "additionalProperties": false
            }"#,
        )
        .unwrap();

        let root = schema.root();
        assert!(root.declares_object());
        assert_eq!(root.required, vec!["level".to_string()]);
        assert_eq!(
            root.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );
        let level = &root.properties["level"];
        assert_eq!(level.minimum, Some(Number::from(1)));
        assert_eq!(level.maximum, Some(Number::from(5)));
        let tags = &root.properties["tags"];
        assert!(tags.declares_array());
        assert_eq!(tags.min_items, Some(1));
        assert!(tags.requires_unique_items());
    }

    #[test]
    fn test_additional_properties_schema() {
        let schema = Schema::from_json(
            r#"{"type": "object", "additionalProperties": {"type": "string"}}"#,
        )
        .unwrap();
        match &schema.root().additional_properties {
            Some(AdditionalProperties::Schema(extra)) => {
                assert_eq!(extra.type_name, Some(TypeName::Single("string".into())));
            }
            other => panic!("unexpected additionalProperties: {:?}", other),
        }
    }

    #[test]
    fn test_type_name_list() {
        let schema = Schema::from_json(r#"{"type": ["string", "null"]}"#).unwrap();
        let type_name = schema.root().type_name.as_ref().unwrap();
        assert!(type_name.admits(JsonType::Null));
        assert!(type_name.admits(JsonType::String));
        assert!(!type_name.admits(JsonType::Object));
    }

    #[test]
    fn test_object_defaults_on_serialize() {
        let schema = Schema::from_json(r#"{"type": "object"}"#).unwrap();
        let json: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "object", "properties": {}, "required": []})
        );
    }

    #[test]
    fn test_non_object_omits_defaults() {
        let schema = Schema::from_json(r#"{"type": "string"}"#).unwrap();
        assert_eq!(schema.to_json().unwrap(), r#"{"type":"string"}"#);
    }

    #[test]
    fn test_extensions_roundtrip() {
        let raw = serde_json::json!({
            "type": "string",
            "pattern": "^[a-z]+$",
            "x-ui-widget": {"kind": "select", "order": 3}
        });
        let schema: Schema = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(schema.root().extensions.len(), 2);
        let back: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_recognized_keywords_print_as_written() {
        let raw = r#"{"default":null,"exclusiveMinimum":0,"maximum":2.5,"minimum":1,"type":"integer","uniqueItems":false}"#;
        let schema = Schema::from_json(raw).unwrap();
        assert_eq!(schema.root().default, Some(Value::Null));
        assert_eq!(schema.root().unique_items, Some(false));
        let back: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        let expected: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, expected);
        assert_eq!(back["minimum"].to_string(), "1");

        let absent = Schema::from_json(r#"{"type":"integer"}"#).unwrap();
        assert_eq!(absent.root().default, None);
    }

    #[test]
    fn test_yaml_schema() {
        let schema = Schema::from_yaml(
            r#"
type: object
properties:
  name:
    type: string
    minLength: 2
required: [name]
"#,
        )
        .unwrap();
        assert_eq!(schema.root().properties["name"].min_length, Some(2));
    }

    #[test]
    fn test_with_definitions_overrides() {
        let schema = Schema::from_json(
            r#"{"definitions": {"a": {"type": "string"}, "b": {"type": "boolean"}}}"#,
        )
        .unwrap();
        let mut injected = Definitions::new();
        injected.insert(
            "a".into(),
            Type {
                type_name: Some(TypeName::Single("integer".into())),
                ..Default::default()
            },
        );
        let merged = schema.with_definitions(&injected);
        assert_eq!(
            merged.definitions()["a"].type_name,
            Some(TypeName::Single("integer".into()))
        );
        assert!(merged.definitions().contains_key("b"));
        // The source schema is left untouched.
        assert_eq!(
            schema.definitions()["a"].type_name,
            Some(TypeName::Single("string".into()))
        );
    }

    #[test]
    fn test_compile_checks_references() {
        let ok = Schema::compile(
            r##"{"definitions": {"name": {"type": "string"}}, "properties": {"n": {"$ref": "#/definitions/name"}}}"##,
        );
        assert!(ok.is_ok());

        let missing = Schema::compile(r##"{"properties": {"n": {"$ref": "#/definitions/nope"}}}"##);
        assert!(matches!(missing, Err(SchemaError::UnresolvedRef { .. })));

        let remote = Schema::compile(r##"{"items": {"$ref": "http://example.com/s.json"}}"##);
        assert!(matches!(remote, Err(SchemaError::UnsupportedRef { .. })));
    }
}
