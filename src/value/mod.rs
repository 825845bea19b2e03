//! Value module - In-memory representation of JSON/YAML configuration documents.
//!
//! This module provides the tagged value type and its JSON type classification.

mod classify;
mod value;

pub use classify::*;
pub use value::*;
