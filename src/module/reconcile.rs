//! Reconciliation of a module instance with a new module release.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::merge::{merge_values, Merger};
use crate::schema::{action_definitions, event_definitions, Schema, SchemaError};
use crate::validation::{SchemaValidator, Validator};
use crate::value::{from_value, to_value, Map, Value};

use super::models::{
    ActionConfig, ActionConfigItem, Dependencies, EventConfig, EventConfigItem, ModuleConfig,
    ModuleInstance, ModuleRelease, SecureConfig,
};

pub const CONFIG: &str = "config";
pub const SECURE_CONFIG: &str = "secure_config";
pub const ACTION_CONFIG: &str = "action_config";
pub const EVENT_CONFIG: &str = "event_config";

/// ModuleError is a hard error met while reconciling one config category.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{category} schema is invalid: {source}")]
    Schema {
        category: &'static str,
        #[source]
        source: SchemaError,
    },

    #[error("{category} document cannot be represented as JSON: {source}")]
    Document {
        category: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ModuleError {
    /// Returns the config category the error belongs to.
    pub fn category(&self) -> &'static str {
        match self {
            ModuleError::Schema { category, .. } | ModuleError::Document { category, .. } => category,
        }
    }

    fn schema(category: &'static str) -> impl FnOnce(SchemaError) -> ModuleError {
        move |source| ModuleError::Schema { category, source }
    }

    fn document(category: &'static str) -> impl FnOnce(serde_json::Error) -> ModuleError {
        move |source| ModuleError::Document { category, source }
    }
}

/// ModuleReconciler carries a module instance's customizations over to a
/// new release of the module.
///
/// Each config category is reconciled independently. A unit that cannot be
/// reconciled (the whole config, one action or one event) degrades to the
/// release default for that unit.
#[derive(Debug, Clone)]
pub struct ModuleReconciler<V = SchemaValidator> {
    merger: Merger<V>,
}

impl Default for ModuleReconciler<SchemaValidator> {
    fn default() -> Self {
        ModuleReconciler::with_merger(Merger::default())
    }
}

impl ModuleReconciler<SchemaValidator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: Validator> ModuleReconciler<V> {
    pub fn with_merger(merger: Merger<V>) -> Self {
        ModuleReconciler { merger }
    }

    pub fn merger(&self) -> &Merger<V> {
        &self.merger
    }

    /// Reconciles every config category of `instance` against `release`.
    pub fn reconcile(
        &self,
        instance: &ModuleInstance,
        release: &ModuleRelease,
    ) -> Result<ModuleInstance, ModuleError> {
        let current_config = self.merge_config(
            &instance.current_config,
            &release.default_config,
            &release.config_schema,
        )?;
        let secure_current_config = self.merge_secure_config(
            &instance.secure_current_config,
            &release.secure_default_config,
            &release.secure_config_schema,
        )?;
        let current_action_config = self.merge_action_config(
            &instance.current_action_config,
            &release.default_action_config,
            &release.action_config_schema,
        )?;
        let current_event_config = self.merge_event_config(
            &instance.current_event_config,
            &release.default_event_config,
            &release.event_config_schema,
        )?;
        let dynamic_dependencies =
            clear_dynamic_dependencies(&instance.dynamic_dependencies, &current_event_config);

        info!(
            module = %release.name,
            version = %release.version,
            actions = current_action_config.len(),
            events = current_event_config.len(),
            dropped_dependencies = instance.dynamic_dependencies.len() - dynamic_dependencies.len(),
            "module instance reconciled"
        );

        Ok(ModuleInstance {
            current_config,
            secure_current_config,
            current_action_config,
            current_event_config,
            dynamic_dependencies,
        })
    }

    /// Reconciles a plain module config.
    pub fn merge_config(
        &self,
        current: &ModuleConfig,
        default: &ModuleConfig,
        schema: &Schema,
    ) -> Result<ModuleConfig, ModuleError> {
        schema.check_references().map_err(ModuleError::schema(CONFIG))?;
        let seeded = seed_missing_keys(current, default);
        let merged = self
            .merger
            .merge(&Value::Map(seeded), &Value::Map(default.clone()), schema);
        if self.accepts(schema, &merged) {
            if let Value::Map(config) = merged {
                return Ok(config);
            }
        }
        warn!(category = CONFIG, "merged config is invalid, using release default");
        Ok(default.clone())
    }

    /// Reconciles a secure module config.
    pub fn merge_secure_config(
        &self,
        current: &SecureConfig,
        default: &SecureConfig,
        schema: &Schema,
    ) -> Result<SecureConfig, ModuleError> {
        schema
            .check_references()
            .map_err(ModuleError::schema(SECURE_CONFIG))?;
        let current = as_map(current, SECURE_CONFIG)?;
        let default_map = as_map(default, SECURE_CONFIG)?;

        let seeded = seed_missing_keys(&current, &default_map);
        let merged = self
            .merger
            .merge(&Value::Map(seeded), &Value::Map(default_map), schema);
        Ok(self.typed_or_default(SECURE_CONFIG, schema, merged, default))
    }

    /// Reconciles the per-action config.
    ///
    /// Actions are the ones the release defaults declare. Each kept action
    /// takes `priority` and `fields` from the default, has its own settings
    /// pruned to the default's keys, and is merged under
    /// `properties[action_id]`. `fields` always ends up equal to the default's.
    pub fn merge_action_config(
        &self,
        current: &ActionConfig,
        default: &ActionConfig,
        schema: &Schema,
    ) -> Result<ActionConfig, ModuleError> {
        let definitions = action_definitions().map_err(ModuleError::schema(ACTION_CONFIG))?;
        let schema = schema.with_definitions(definitions);
        schema
            .check_references()
            .map_err(ModuleError::schema(ACTION_CONFIG))?;
        let root = schema
            .node()
            .resolve()
            .map_err(ModuleError::schema(ACTION_CONFIG))?;

        let mut merged = ActionConfig::new();
        for (id, fallback) in default {
            let Some(item) = current.get(id) else {
                merged.insert(id.clone(), fallback.clone());
                continue;
            };
            let prepared = ActionConfigItem {
                priority: fallback.priority,
                fields: fallback.fields.clone(),
                config: prune_to_default_keys(&item.config, &fallback.config),
            };
            let prepared_value = to_value(&prepared).map_err(ModuleError::document(ACTION_CONFIG))?;
            let fallback_value = to_value(fallback).map_err(ModuleError::document(ACTION_CONFIG))?;

            let value = match root.property(id) {
                Some(node) => self.merger.merge_at(node, &prepared_value, &fallback_value),
                None => merge_values(&prepared_value, &fallback_value),
            };
            let mut action = from_value::<ActionConfigItem>(value).unwrap_or_else(|err| {
                debug!(action = %id, error = %err, "merged action is malformed, using default");
                fallback.clone()
            });
            action.fields = fallback.fields.clone();
            merged.insert(id.clone(), action);
        }

        let dropped = current.keys().filter(|id| !default.contains_key(*id)).count();
        if dropped > 0 {
            debug!(dropped, "dropping actions the release no longer declares");
        }

        let merged_value = to_value(&merged).map_err(ModuleError::document(ACTION_CONFIG))?;
        if self.accepts(&schema, &merged_value) {
            Ok(merged)
        } else {
            warn!(category = ACTION_CONFIG, "merged action config is invalid, using release default");
            Ok(default.clone())
        }
    }

    /// Reconciles the per-event config.
    ///
    /// Events are the ones the release defaults declare. Each kept event
    /// takes `fields` from the default, has its own settings pruned to the
    /// default's keys and is merged under `properties[event_id]`; its actions
    /// are then limited to those whose fields the event still provides.
    pub fn merge_event_config(
        &self,
        current: &EventConfig,
        default: &EventConfig,
        schema: &Schema,
    ) -> Result<EventConfig, ModuleError> {
        let definitions = event_definitions().map_err(ModuleError::schema(EVENT_CONFIG))?;
        let schema = schema.with_definitions(definitions);
        schema
            .check_references()
            .map_err(ModuleError::schema(EVENT_CONFIG))?;
        let root = schema
            .node()
            .resolve()
            .map_err(ModuleError::schema(EVENT_CONFIG))?;

        let mut merged = EventConfig::new();
        for (id, fallback) in default {
            let Some(item) = current.get(id) else {
                merged.insert(id.clone(), fallback.clone());
                continue;
            };
            let prepared = EventConfigItem {
                fields: fallback.fields.clone(),
                config: prune_to_default_keys(&item.config, &fallback.config),
                ..item.clone()
            };

            let mut event = match root.property(id) {
                Some(node) => {
                    let prepared_value = to_value(&prepared).map_err(ModuleError::document(EVENT_CONFIG))?;
                    let fallback_value = to_value(fallback).map_err(ModuleError::document(EVENT_CONFIG))?;
                    let value = self.merger.merge_at(node, &prepared_value, &fallback_value);
                    from_value::<EventConfigItem>(value).unwrap_or_else(|err| {
                        debug!(event = %id, error = %err, "merged event is malformed, using default");
                        fallback.clone()
                    })
                }
                None => prepared,
            };
            event.fields = fallback.fields.clone();

            let before = event.actions.len();
            let actions: Vec<_> = event
                .actions
                .iter()
                .filter(|action| event.provides_fields_for(action))
                .cloned()
                .collect();
            if actions.len() < before {
                debug!(
                    event = %id,
                    dropped = before - actions.len(),
                    "dropping actions that need fields the event no longer provides"
                );
            }
            event.actions = actions;
            merged.insert(id.clone(), event);
        }

        let merged_value = to_value(&merged).map_err(ModuleError::document(EVENT_CONFIG))?;
        if self.accepts(&schema, &merged_value) {
            Ok(merged)
        } else {
            warn!(category = EVENT_CONFIG, "merged event config is invalid, using release default");
            Ok(default.clone())
        }
    }

    fn accepts(&self, schema: &Schema, value: &Value) -> bool {
        self.merger.validator().is_valid(schema.node(), value)
    }

    /// Converts a merged document back to its model, or returns the default
    /// when it is invalid or no longer has the model's shape.
    fn typed_or_default<T>(&self, category: &'static str, schema: &Schema, merged: Value, default: &T) -> T
    where
        T: DeserializeOwned + Clone,
    {
        if !self.accepts(schema, &merged) {
            warn!(category, "merged document is invalid, using release default");
            return default.clone();
        }
        from_value(merged).unwrap_or_else(|err| {
            warn!(category, error = %err, "merged document is malformed, using release default");
            default.clone()
        })
    }
}

/// Keeps the dynamic dependencies whose module is still the target of at
/// least one event action.
pub fn clear_dynamic_dependencies(dependencies: &Dependencies, events: &EventConfig) -> Dependencies {
    dependencies
        .iter()
        .filter(|dependency| {
            events
                .values()
                .any(|event| event.targets_module(&dependency.module_name))
        })
        .cloned()
        .collect()
}

/// Returns `current` with every key of `default` it lacks added.
fn seed_missing_keys(current: &Map, default: &Map) -> Map {
    let mut seeded = current.clone();
    for (key, value) in default.iter() {
        if !seeded.has(key) {
            seeded.set(key.clone(), value.clone());
        }
    }
    seeded
}

/// Returns exactly the keys of `default`, valued from `current` where present.
fn prune_to_default_keys(current: &Map, default: &Map) -> Map {
    default
        .iter()
        .map(|(key, fallback)| {
            let value = current.get(key).unwrap_or(fallback);
            (key.clone(), value.clone())
        })
        .collect()
}

fn as_map<T: Serialize>(model: &T, category: &'static str) -> Result<Map, ModuleError> {
    match to_value(model).map_err(ModuleError::document(category))? {
        Value::Map(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
