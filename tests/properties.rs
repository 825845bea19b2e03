//! Property tests for the schema-guided merge.

use config_reconcile::merge::{merge, merge_values};
use config_reconcile::schema::Schema;
use config_reconcile::validation::{SchemaValidator, Validator};
use config_reconcile::value::{from_json, Map, Value};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const SERVICE_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "name": {"type": "string", "minLength": 1},
        "port": {"type": "integer", "minimum": 1, "maximum": 65535},
        "tags": {
            "type": "array",
            "items": {"type": "string"},
            "minItems": 1,
            "maxItems": 3,
            "uniqueItems": true
        },
        "limits": {
            "type": "object",
            "properties": {"cpu": {"type": "number"}},
            "required": ["cpu"],
            "additionalProperties": false
        }
    },
    "required": ["name", "port", "tags"],
    "maxProperties": 6
}"#;

const SERVICE_DEFAULT: &str = r#"{"name": "svc", "port": 8080, "tags": ["a", "b"], "limits": {"cpu": 0.5}}"#;

const VARIANT_SCHEMA: &str = r##"{
    "definitions": {
        "file": {
            "type": "object",
            "properties": {"kind": {"enum": ["file"]}, "path": {"type": "string"}},
            "required": ["kind", "path"],
            "additionalProperties": false
        },
        "socket": {
            "type": "object",
            "properties": {"kind": {"enum": ["socket"]}, "port": {"type": "integer"}},
            "required": ["kind", "port"],
            "additionalProperties": false
        }
    },
    "type": "object",
    "properties": {
        "sink": {"oneOf": [{"$ref": "#/definitions/file"}, {"$ref": "#/definitions/socket"}]},
        "levels": {"allOf": [
            {"type": "array", "items": {"type": "string"}},
            {"type": "array", "minItems": 1, "maxItems": 2}
        ]}
    },
    "required": ["sink", "levels"]
}"##;

const VARIANT_DEFAULT: &str = r#"{"sink": {"kind": "file", "path": "/var/log/app"}, "levels": ["info"]}"#;

fn schema(raw: &str) -> Schema {
    Schema::compile(raw).unwrap()
}

fn document(raw: &str) -> Value {
    from_json(raw).unwrap()
}

fn is_valid(schema: &Schema, value: &Value) -> bool {
    SchemaValidator::new().is_valid(schema.node(), value)
}

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("name".to_string()),
        Just("port".to_string()),
        Just("tags".to_string()),
        Just("limits".to_string()),
        Just("cpu".to_string()),
        Just("sink".to_string()),
        Just("kind".to_string()),
        Just("path".to_string()),
        Just("levels".to_string()),
        "[a-z]{1,5}",
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-70000i64..70000).prop_map(Value::Int),
        (-1000.0f64..1000.0).prop_map(Value::Float),
        prop_oneof![Just("file".to_string()), Just("socket".to_string()), "[a-z]{0,6}"]
            .prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::List),
            prop::collection::btree_map(arb_key(), inner, 0..6)
                .prop_map(|fields| Value::Map(Map { fields })),
        ]
    })
}

fn valid_service() -> impl Strategy<Value = Value> {
    (
        "[a-z]{1,8}",
        1i64..=65535,
        prop::collection::btree_set("[a-z]{1,4}", 1..=3),
        prop::option::of(-100.0f64..100.0),
    )
        .prop_map(|(name, port, tags, cpu)| {
            let mut fields = Map::new();
            fields.set("name".into(), Value::String(name));
            fields.set("port".into(), Value::Int(port));
            fields.set(
                "tags".into(),
                Value::List(tags.into_iter().map(Value::String).collect()),
            );
            if let Some(cpu) = cpu {
                let mut limits = Map::new();
                limits.set("cpu".into(), Value::Float(cpu));
                fields.set("limits".into(), Value::Map(limits));
            }
            Value::Map(fields)
        })
}

#[test]
fn merging_default_with_itself_is_identity() {
    for (raw_schema, raw_default) in [(SERVICE_SCHEMA, SERVICE_DEFAULT), (VARIANT_SCHEMA, VARIANT_DEFAULT)] {
        let schema = schema(raw_schema);
        let default = document(raw_default);
        assert!(is_valid(&schema, &default));
        assert_eq!(merge(&default, &default, &schema), default);
    }
}

proptest! {
    #[test]
    fn result_always_validates(current in arb_value()) {
        let schema = schema(SERVICE_SCHEMA);
        let default = document(SERVICE_DEFAULT);
        let merged = merge(&current, &default, &schema);
        prop_assert!(is_valid(&schema, &merged), "invalid result {:?}", merged);
    }

    #[test]
    fn composite_result_always_validates(current in arb_value()) {
        let schema = schema(VARIANT_SCHEMA);
        let default = document(VARIANT_DEFAULT);
        let merged = merge(&current, &default, &schema);
        prop_assert!(is_valid(&schema, &merged), "invalid result {:?}", merged);
    }

    #[test]
    fn valid_current_is_preserved(current in valid_service()) {
        let schema = schema(SERVICE_SCHEMA);
        let default = document(SERVICE_DEFAULT);
        prop_assert_eq!(merge(&current, &default, &schema), current);
    }

    #[test]
    fn merging_twice_changes_nothing(current in arb_value()) {
        let schema = schema(SERVICE_SCHEMA);
        let default = document(SERVICE_DEFAULT);
        let once = merge(&current, &default, &schema);
        prop_assert_eq!(merge(&once, &default, &schema), once);
    }

    #[test]
    fn type_mismatch_takes_default(
        name in arb_value().prop_filter("not a string", |v| !matches!(v, Value::String(_))),
        rest in prop::collection::btree_map(arb_key(), arb_value(), 0..4),
    ) {
        let schema = schema(SERVICE_SCHEMA);
        let default = document(SERVICE_DEFAULT);
        let mut fields = Map { fields: rest };
        fields.set("name".into(), name);

        let merged = merge(&Value::Map(fields), &default, &schema);
        let merged_name = merged.as_map().and_then(|m| m.get("name")).cloned();
        prop_assert_eq!(merged_name, Some(Value::from("svc")));
    }

    #[test]
    fn required_keys_and_bounds_hold(current in arb_value()) {
        let schema = schema(SERVICE_SCHEMA);
        let default = document(SERVICE_DEFAULT);
        let merged = merge(&current, &default, &schema);
        let fields = merged.as_map().cloned().unwrap_or_default();
        for key in ["name", "port", "tags"] {
            prop_assert!(fields.has(key), "missing {} in {:?}", key, merged);
        }
        let tags = fields.get("tags").and_then(|t| t.as_list()).map(|t| t.len()).unwrap_or(0);
        prop_assert!((1..=3).contains(&tags));
    }

    #[test]
    fn unguided_merge_with_itself_is_identity(value in arb_value()) {
        prop_assert_eq!(merge_values(&value, &value), value);
    }
}
