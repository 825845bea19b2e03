//! Module module - Reconciles a deployed module's documents with a new release.
//!
//! A module carries four configuration documents (plain, secure, per-action
//! and per-event) plus the dynamic dependencies its event actions create.
//! [`ModuleReconciler`] carries each of them over to a new release through
//! the schema-guided merge.

mod models;
mod reconcile;


pub use models::*;
pub use reconcile::*;
