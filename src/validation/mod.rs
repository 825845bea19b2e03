//! Validation module - Checks values against schemas.
//!
//! The [`Validator`] trait is the seam the merge engine uses to gate its
//! decisions; [`SchemaValidator`] is the built-in implementation.

mod errors;
mod validator;

pub use errors::*;
pub use validator::*;
