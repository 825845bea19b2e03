//! # Config Reconcile
//!
//! Schema-guided reconciliation of configuration documents.
//!
//! When a module ships a new version, its default configuration and schema
//! change, while deployed instances carry operator customizations made
//! against the old version. This library merges a "current" document with the
//! new "default" document under a JSON-Schema subset, keeping every current
//! subtree that is still valid and falling back to the default wherever it is
//! not. The result always validates against the schema, or is the default.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of JSON/YAML documents and their classification
//! - [`schema`] - JSON-Schema subset with `$ref`/`definitions` resolution and shared definitions
//! - [`validation`] - Validation of values against schemas
//! - [`merge`] - The schema-guided merge engine and the unguided structural merge
//! - [`module`] - Reconciliation of a module's config, secure, action and event documents
//! - [`fieldpath`] - Paths into documents, used for diagnostics

pub mod fieldpath;
pub mod merge;
pub mod module;
pub mod schema;
pub mod validation;
pub mod value;

pub use fieldpath::{Path, PathElement};
pub use merge::{merge, merge_values, MergeRequest, Merger};
pub use module::{ModuleError, ModuleInstance, ModuleReconciler, ModuleRelease};
pub use schema::{Schema, SchemaError, SchemaNode, Type};
pub use validation::{
    DocumentError, SchemaValidator, ValidationError, ValidationErrors, Validator, Violation,
};
pub use value::{classify, JsonType, Map, Value};
