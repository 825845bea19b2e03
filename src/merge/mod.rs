//! Merge module - Schema-guided reconciliation of configuration documents.
//!
//! [`Merger`] walks the current document and the default document side by
//! side under a schema, keeping every current subtree that still validates
//! and falling back to the default wherever it cannot be repaired.
//! [`merge_values`] is the schema-less structural merge used where no schema
//! describes a value.

mod merger;
mod unguided;


pub use merger::*;
pub use unguided::merge_values;
