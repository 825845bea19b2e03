//! Field path module - Locates values inside nested documents.
//!
//! Paths point validation errors and merge diagnostics at the value they
//! concern.

mod path;

pub use path::*;
