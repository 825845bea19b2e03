//! Validation diagnostics.

use std::fmt;
use std::ops::Deref;
use thiserror::Error;

use crate::fieldpath::Path;
use crate::value::JsonType;

/// Violation is the rule a value breaks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("expected {expected}, found {found}")]
    WrongType { expected: String, found: JsonType },

    #[error("required key {0:?} is missing")]
    MissingKey(String),

    #[error("key {0:?} is not allowed")]
    ExtraKey(String),

    #[error("item {0} repeats an earlier item")]
    DuplicateItem(usize),

    /// A bound, enumeration or composition rule.
    #[error("{0}")]
    Constraint(String),

    /// The schema itself cannot be applied, e.g. a dangling `$ref`.
    #[error("schema cannot be applied: {0}")]
    Schema(String),
}

/// ValidationError is one violation at one location of the document.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {violation}")]
pub struct ValidationError {
    pub path: Path,
    pub violation: Violation,
}

impl ValidationError {
    pub fn new(path: &Path, violation: Violation) -> Self {
        ValidationError {
            path: path.clone(),
            violation,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// ValidationErrors is every violation found in one document, in the order
/// the document was walked. Derefs to a slice of errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// `Ok` when nothing was found.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Deref for ValidationErrors {
    type Target = [ValidationError];

    fn deref(&self) -> &[ValidationError] {
        &self.0
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        ValidationErrors(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = self.0.iter();
        if let Some(first) = lines.next() {
            write!(f, "{}", first)?;
        }
        lines.try_for_each(|error| write!(f, "\n{}", error))
    }
}

impl std::error::Error for ValidationErrors {}

/// DocumentError is returned when a raw document cannot be checked or fails
/// its schema.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document must be valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document must be valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("document does not match schema:\n{0}")]
    Invalid(#[from] ValidationErrors),
}
