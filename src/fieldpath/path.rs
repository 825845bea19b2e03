//! Locations of values inside a document.

use std::fmt;

/// PathElement is one step from a container down to a child value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// An object key.
    Key(String),
    /// A position in an array.
    Index(usize),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => write!(f, ".{}", key),
            PathElement::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Path locates a value relative to the document root.
///
/// Paths are built by extension only: every step returns a new path, so the
/// walkers can hand a child path down without undoing it afterwards. A path
/// prints as `.servers[1].port`; the root prints as `.`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathElement>);

impl Path {
    /// Returns the path of the document root.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps below the root.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    /// Returns the path of the value under `key`.
    pub fn field(&self, key: &str) -> Path {
        self.child(PathElement::Key(key.to_string()))
    }

    /// Returns the path of the array item at `index`.
    pub fn at(&self, index: usize) -> Path {
        self.child(PathElement::Index(index))
    }

    fn child(&self, element: PathElement) -> Path {
        let mut elements = Vec::with_capacity(self.0.len() + 1);
        elements.extend_from_slice(&self.0);
        elements.push(element);
        Path(elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        self.0.iter().try_for_each(|element| write!(f, "{}", element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn test_extension_leaves_parent_untouched() {
        let parent = Path::root().field("servers");
        let child = parent.at(1).field("port");

        assert_eq!(parent.to_string(), ".servers");
        assert_eq!(child.to_string(), ".servers[1].port");
        assert_eq!(child.depth(), 3);
        assert_eq!(
            child.elements(),
            &[
                PathElement::Key("servers".into()),
                PathElement::Index(1),
                PathElement::Key("port".into()),
            ]
        );
    }

    #[test]
    fn test_keys_with_dots_are_not_split() {
        assert_eq!(Path::root().field("base.action").to_string(), ".base.action");
        assert_eq!(Path::root().field("base.action").depth(), 1);
    }
}
