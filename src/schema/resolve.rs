//! Narrow `$ref` resolution over a root `definitions` table.

use thiserror::Error;

use super::elements::{AdditionalProperties, Definitions, Type};

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// SchemaError is a hard error in a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid JSON schema document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML schema document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unresolved reference {reference}")]
    UnresolvedRef { reference: String },

    #[error("unsupported reference {reference}: only #/definitions/<name> is supported")]
    UnsupportedRef { reference: String },

    #[error("reference cycle through {reference}")]
    RefCycle { reference: String },

    #[error("built-in definitions are invalid: {message}")]
    Builtin { message: String },
}

/// SchemaNode is a schema node paired with the definitions it resolves against.
///
/// Nodes are cheap borrowed views; child nodes inherit the root definitions.
#[derive(Debug, Clone, Copy)]
pub struct SchemaNode<'a> {
    ty: &'a Type,
    definitions: &'a Definitions,
}

/// ExtraKeys describes what an object node does with keys outside `properties`.
#[derive(Debug, Clone, Copy)]
pub enum ExtraKeys<'a> {
    Allowed,
    Denied,
    Schema(SchemaNode<'a>),
}

impl<'a> SchemaNode<'a> {
    pub fn new(ty: &'a Type, definitions: &'a Definitions) -> Self {
        SchemaNode { ty, definitions }
    }

    /// Returns the underlying node.
    pub fn ty(&self) -> &'a Type {
        self.ty
    }

    pub fn definitions(&self) -> &'a Definitions {
        self.definitions
    }

    /// Returns a node for a nested schema sharing these definitions.
    pub fn child(&self, ty: &'a Type) -> SchemaNode<'a> {
        SchemaNode::new(ty, self.definitions)
    }

    /// Follows `$ref` links until a concrete node is reached.
    ///
    /// Keywords next to a `$ref` are ignored, as in JSON Schema drafts 4-7.
    pub fn resolve(&self) -> Result<SchemaNode<'a>, SchemaError> {
        let mut current = *self;
        let mut hops = 0;
        while let Some(reference) = current.ty.reference.as_deref() {
            // A chain longer than the definitions table must revisit a name.
            if hops > self.definitions.len() {
                return Err(SchemaError::RefCycle {
                    reference: reference.to_string(),
                });
            }
            let name = definition_name(reference)?;
            let target = self.definitions.get(&name).ok_or_else(|| SchemaError::UnresolvedRef {
                reference: reference.to_string(),
            })?;
            current = self.child(target);
            hops += 1;
        }
        Ok(current)
    }

    /// Returns the schema for the named property, if declared.
    pub fn property(&self, key: &str) -> Option<SchemaNode<'a>> {
        self.ty.properties.get(key).map(|ty| self.child(ty))
    }

    /// Returns the schema for array elements, if declared.
    pub fn items(&self) -> Option<SchemaNode<'a>> {
        self.ty.items.as_deref().map(|ty| self.child(ty))
    }

    /// Returns how keys without a property schema are treated.
    pub fn extra_keys(&self) -> ExtraKeys<'a> {
        match &self.ty.additional_properties {
            None | Some(AdditionalProperties::Allowed(true)) => ExtraKeys::Allowed,
            Some(AdditionalProperties::Allowed(false)) => ExtraKeys::Denied,
            Some(AdditionalProperties::Schema(ty)) => ExtraKeys::Schema(self.child(ty)),
        }
    }

    pub fn all_of(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let definitions = self.definitions;
        self.ty.all_of.iter().map(move |ty| SchemaNode::new(ty, definitions))
    }

    pub fn any_of(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let definitions = self.definitions;
        self.ty.any_of.iter().map(move |ty| SchemaNode::new(ty, definitions))
    }

    pub fn one_of(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let definitions = self.definitions;
        self.ty.one_of.iter().map(move |ty| SchemaNode::new(ty, definitions))
    }

    pub fn not(&self) -> Option<SchemaNode<'a>> {
        self.ty.not.as_deref().map(|ty| self.child(ty))
    }
}

/// Extracts the definition name from a `#/definitions/<name>` reference,
/// undoing JSON-pointer escapes.
fn definition_name(reference: &str) -> Result<String, SchemaError> {
    let unsupported = || SchemaError::UnsupportedRef {
        reference: reference.to_string(),
    };
    let escaped = reference.strip_prefix(DEFINITIONS_PREFIX).ok_or_else(unsupported)?;
    if escaped.is_empty() || escaped.contains('/') {
        return Err(unsupported());
    }
    Ok(escaped.replace("~1", "/").replace("~0", "~"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, TypeName};

    #[test]
    fn test_definition_name() {
        assert_eq!(definition_name("#/definitions/base.action").unwrap(), "base.action");
        assert_eq!(definition_name("#/definitions/a~1b~0c").unwrap(), "a/b~c");
        assert!(definition_name("#/properties/a").is_err());
        assert!(definition_name("#/definitions/").is_err());
        assert!(definition_name("#/definitions/a/b").is_err());
    }

    #[test]
    fn test_resolve_chain() {
        let schema = Schema::from_json(
            r##"{
                "$ref": "#/definitions/outer",
                "definitions": {
                    "outer": {"$ref": "#/definitions/inner"},
                    "inner": {"type": "string"}
                }
            }"##,
        )
        .unwrap();
        let node = schema.node().resolve().unwrap();
        assert_eq!(node.ty().type_name, Some(TypeName::Single("string".into())));
    }

    #[test]
    fn test_resolve_cycle() {
        let schema = Schema::from_json(
            r##"{
                "$ref": "#/definitions/a",
                "definitions": {
                    "a": {"$ref": "#/definitions/b"},
                    "b": {"$ref": "#/definitions/a"}
                }
            }"##,
        )
        .unwrap();
        assert!(matches!(schema.node().resolve(), Err(SchemaError::RefCycle { .. })));
        assert!(matches!(schema.check_references(), Err(SchemaError::RefCycle { .. })));
    }

    #[test]
    fn test_children_inherit_definitions() {
        let schema = Schema::from_json(
            r##"{
                "type": "object",
                "properties": {"f": {"$ref": "#/definitions/fields"}},
                "definitions": {"fields": {"type": "array", "items": {"type": "string"}}}
            }"##,
        )
        .unwrap();
        let field = schema.node().property("f").unwrap().resolve().unwrap();
        assert!(field.ty().declares_array());
        assert!(field.items().is_some());
    }

    #[test]
    fn test_extra_keys() {
        let allowed = Schema::from_json(r#"{"type": "object"}"#).unwrap();
        assert!(matches!(allowed.node().extra_keys(), ExtraKeys::Allowed));
        let denied = Schema::from_json(r#"{"additionalProperties": false}"#).unwrap();
        assert!(matches!(denied.node().extra_keys(), ExtraKeys::Denied));
        let typed = Schema::from_json(r#"{"additionalProperties": {"type": "integer"}}"#).unwrap();
        assert!(matches!(typed.node().extra_keys(), ExtraKeys::Schema(_)));
    }
}
