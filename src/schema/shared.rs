//! Built-in definitions injected into action and event config schemas.

use once_cell::sync::Lazy;

use super::elements::Definitions;
use super::resolve::SchemaError;

/// ACTION_DEFINITIONS_YAML holds the definitions every action config schema
/// may reference.
pub const ACTION_DEFINITIONS_YAML: &str = r#"
base.action:
  type: object
  properties:
    priority:
      type: integer
      minimum: 1
      maximum: 100
    fields:
      type: array
      items:
        type: string
      uniqueItems: true
  additionalProperties: true
  required: [priority, fields]
"#;

/// EVENT_DEFINITIONS_YAML holds the definitions every event config schema
/// may reference.
pub const EVENT_DEFINITIONS_YAML: &str = r##"
fields:
  type: array
  items:
    type: string
  uniqueItems: true
actions:
  type: array
  items:
    type: object
    properties:
      name:
        type: string
      module_name:
        type: string
      priority:
        type: integer
        minimum: 1
        maximum: 100
      fields:
        $ref: "#/definitions/fields"
    additionalProperties: false
    required: [name, module_name, priority, fields]
types.atomic:
  type: string
  default: atomic
  enum: [atomic]
types.aggregation:
  type: string
  default: aggregation
  enum: [aggregation]
types.correlation:
  type: string
  default: correlation
  enum: [correlation]
events.atomic:
  type: object
  properties:
    type:
      $ref: "#/definitions/types.atomic"
    actions:
      $ref: "#/definitions/actions"
    fields:
      $ref: "#/definitions/fields"
  required: [type, actions, fields]
events.complex:
  type: object
  properties:
    type:
      type: string
    actions:
      $ref: "#/definitions/actions"
    fields:
      $ref: "#/definitions/fields"
    seq:
      type: array
      minItems: 1
      items:
        type: object
        properties:
          name:
            type: string
          min_count:
            type: integer
            minimum: 1
        required: [name, min_count]
    group_by:
      type: array
      minItems: 1
      uniqueItems: true
      items:
        type: string
    max_count:
      type: integer
      minimum: 0
    max_time:
      type: integer
      minimum: 0
  required: [type, actions, fields, seq, group_by, max_count, max_time]
events.aggregation:
  allOf:
    - $ref: "#/definitions/events.complex"
    - type: object
      properties:
        type:
          $ref: "#/definitions/types.aggregation"
        seq:
          type: array
          maxItems: 1
      required: [type, seq]
events.correlation:
  allOf:
    - $ref: "#/definitions/events.complex"
    - type: object
      properties:
        type:
          $ref: "#/definitions/types.correlation"
        seq:
          type: array
          maxItems: 20
      required: [type, seq]
"##;

static ACTION_DEFINITIONS: Lazy<Result<Definitions, String>> =
    Lazy::new(|| serde_yaml::from_str(ACTION_DEFINITIONS_YAML).map_err(|e| e.to_string()));

static EVENT_DEFINITIONS: Lazy<Result<Definitions, String>> =
    Lazy::new(|| serde_yaml::from_str(EVENT_DEFINITIONS_YAML).map_err(|e| e.to_string()));

/// Returns the parsed action definitions.
pub fn action_definitions() -> Result<&'static Definitions, SchemaError> {
    builtin(&ACTION_DEFINITIONS)
}

/// Returns the parsed event definitions.
pub fn event_definitions() -> Result<&'static Definitions, SchemaError> {
    builtin(&EVENT_DEFINITIONS)
}

fn builtin(parsed: &'static Result<Definitions, String>) -> Result<&'static Definitions, SchemaError> {
    parsed.as_ref().map_err(|message| SchemaError::Builtin {
        message: message.clone(),
    })
}
