//! Typed documents of a module: configs, actions, events and dependencies.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::schema::Schema;
use crate::value::{Map, Value};

/// ModuleConfig is a module's plain configuration document.
pub type ModuleConfig = Map;

/// SecureParameter is one secret-bearing configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecureParameter {
    /// Server-only parameters are never shipped to agents.
    pub server_only: bool,
    pub value: Value,
}

/// SecureConfig maps parameter names to secure parameters.
pub type SecureConfig = BTreeMap<String, SecureParameter>;

/// ActionConfigItem is the configuration of one action.
///
/// Keys other than `priority` and `fields` are the action's own settings
/// and are kept in `config`, flattened into the same JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionConfigItem {
    pub priority: u64,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(flatten)]
    pub config: Map,
}

/// ActionConfig maps action ids to their configuration.
pub type ActionConfig = BTreeMap<String, ActionConfigItem>;

/// EventKind is the kind of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Atomic,
    Aggregation,
    Correlation,
}

/// EventConfigAction is an action triggered by an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventConfigAction {
    pub name: String,
    pub module_name: String,
    pub priority: u64,
    /// Event fields the action consumes.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// EventConfigSeq is one step of a complex event's sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventConfigSeq {
    pub name: String,
    pub min_count: u64,
}

/// EventConfigItem is the configuration of one event.
///
/// `seq`, `group_by`, `max_count` and `max_time` only exist for aggregation
/// and correlation events: they are always written for those kinds and never
/// for atomic events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventConfigItem {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub actions: Vec<EventConfigAction>,
    #[serde(default)]
    pub seq: Vec<EventConfigSeq>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub max_count: u64,
    #[serde(default)]
    pub max_time: u64,
    #[serde(flatten)]
    pub config: Map,
}

const EVENT_ITEM_KEYS: [&str; 7] = [
    "type",
    "fields",
    "actions",
    "seq",
    "group_by",
    "max_count",
    "max_time",
];

impl EventConfigItem {
    /// Returns true if every field the action consumes is produced by this event.
    pub fn provides_fields_for(&self, action: &EventConfigAction) -> bool {
        action.fields.iter().all(|field| self.fields.contains(field))
    }

    /// Reports whether any action of this event targets the named module.
    pub fn targets_module(&self, module_name: &str) -> bool {
        self.actions.iter().any(|action| action.module_name == module_name)
    }
}

impl Serialize for EventConfigItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.kind)?;
        map.serialize_entry("fields", &self.fields)?;
        map.serialize_entry("actions", &self.actions)?;
        if self.kind != EventKind::Atomic {
            map.serialize_entry("seq", &self.seq)?;
            map.serialize_entry("group_by", &self.group_by)?;
            map.serialize_entry("max_count", &self.max_count)?;
            map.serialize_entry("max_time", &self.max_time)?;
        }
        for (key, value) in self.config.iter() {
            if !EVENT_ITEM_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// EventConfig maps event ids to their configuration.
pub type EventConfig = BTreeMap<String, EventConfigItem>;

/// DependencyKind is the relation a dependency expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    ToReceiveData,
    ToSendData,
    ToMakeAction,
    AgentVersion,
}

/// DependencyItem is a dependency on another module or on the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyItem {
    /// Empty for agent version dependencies.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_module_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_agent_version: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

pub type Dependencies = Vec<DependencyItem>;

/// ModuleRelease is what a module version ships: schemas and default documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleRelease {
    pub name: String,
    pub version: String,
    pub config_schema: Schema,
    pub default_config: ModuleConfig,
    pub secure_config_schema: Schema,
    pub secure_default_config: SecureConfig,
    pub action_config_schema: Schema,
    pub default_action_config: ActionConfig,
    pub event_config_schema: Schema,
    pub default_event_config: EventConfig,
}

/// ModuleInstance is the operator-edited state of a deployed module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleInstance {
    pub current_config: ModuleConfig,
    pub secure_current_config: SecureConfig,
    pub current_action_config: ActionConfig,
    pub current_event_config: EventConfig,
    pub dynamic_dependencies: Dependencies,
}

impl ModuleInstance {
    /// Builds a fresh instance of a release, holding its default documents.
    pub fn from_release(release: &ModuleRelease) -> Self {
        ModuleInstance {
            current_config: release.default_config.clone(),
            secure_current_config: release.secure_default_config.clone(),
            current_action_config: release.default_action_config.clone(),
            current_event_config: release.default_event_config.clone(),
            dynamic_dependencies: Dependencies::new(),
        }
    }

    /// Returns the secure config as an agent may see it: server-only
    /// parameters are blanked.
    pub fn agent_secure_config(&self) -> SecureConfig {
        self.secure_current_config
            .iter()
            .map(|(name, parameter)| {
                let parameter = if parameter.server_only {
                    SecureParameter::default()
                } else {
                    parameter.clone()
                };
                (name.clone(), parameter)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{from_json, to_value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_action_item_flattens_config() {
        let item: ActionConfigItem =
            serde_json::from_str(r#"{"priority": 10, "fields": ["a"], "path": "/tmp", "depth": 2}"#).unwrap();
        assert_eq!(item.priority, 10);
        assert_eq!(item.fields, vec!["a".to_string()]);
        assert_eq!(item.config.len(), 2);
        assert_eq!(item.config.get("path"), Some(&Value::from("/tmp")));

        let value = to_value(&item).unwrap();
        assert_eq!(
            value,
            from_json(r#"{"priority": 10, "fields": ["a"], "path": "/tmp", "depth": 2}"#).unwrap()
        );
    }

    #[test]
    fn test_event_item_serialization_by_kind() {
        let atomic: EventConfigItem = serde_json::from_str(
            r#"{"type": "atomic", "fields": [], "actions": [], "seq": [{"name": "x", "min_count": 1}], "level": 3}"#,
        )
        .unwrap();
        assert_eq!(atomic.seq.len(), 1);
        assert_eq!(
            to_value(&atomic).unwrap(),
            from_json(r#"{"type": "atomic", "fields": [], "actions": [], "level": 3}"#).unwrap()
        );

        let aggregation = EventConfigItem {
            kind: EventKind::Aggregation,
            ..Default::default()
        };
        assert_eq!(
            to_value(&aggregation).unwrap(),
            from_json(
                r#"{"type": "aggregation", "fields": [], "actions": [], "seq": [], "group_by": [], "max_count": 0, "max_time": 0}"#
            )
            .unwrap()
        );
    }

    #[test]
    fn test_dependency_item_omits_empty_strings() {
        let item = DependencyItem {
            module_name: String::new(),
            min_module_version: String::new(),
            min_agent_version: "1.0.0".into(),
            kind: DependencyKind::AgentVersion,
        };
        assert_eq!(
            to_value(&item).unwrap(),
            from_json(r#"{"min_agent_version": "1.0.0", "type": "agent_version"}"#).unwrap()
        );
        let parsed: DependencyItem =
            serde_json::from_str(r#"{"module_name": "syslog", "type": "to_receive_data"}"#).unwrap();
        assert_eq!(parsed.kind, DependencyKind::ToReceiveData);
    }

    #[test]
    fn test_agent_secure_config_blanks_server_only() {
        let mut instance = ModuleInstance::default();
        instance.secure_current_config.insert(
            "token".into(),
            SecureParameter {
                server_only: true,
                value: Value::from("s3cr3t"),
            },
        );
        instance.secure_current_config.insert(
            "user".into(),
            SecureParameter {
                server_only: false,
                value: Value::from("agent"),
            },
        );

        let agent = instance.agent_secure_config();
        assert_eq!(agent["token"], SecureParameter::default());
        assert_eq!(agent["user"].value, Value::from("agent"));
    }
}
