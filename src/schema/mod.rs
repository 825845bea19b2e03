//! Schema module defines the JSON-Schema subset that guides reconciliation.
//!
//! A schema is a tree of [`Type`] nodes plus a root `definitions` table.
//! [`SchemaNode`] pairs a node with that table so `$ref` links resolve the
//! same way at any depth.

mod elements;
mod resolve;
mod shared;

pub use elements::*;
pub use resolve::*;
pub use shared::{
    action_definitions, event_definitions, ACTION_DEFINITIONS_YAML, EVENT_DEFINITIONS_YAML,
};
