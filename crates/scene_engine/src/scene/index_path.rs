//! Structural addresses inside a node tree

use std::fmt;

/// Path of child indices leading from one node to a descendant
///
/// The empty path addresses the starting node itself. Paths stay meaningful
/// across [`SceneGraph::clone_subtree`](super::SceneGraph::clone_subtree),
/// which is how references into a subtree are carried over to its clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath(Vec<usize>);

impl IndexPath {
    /// Empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child index
    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    /// Copy of this path extended by one index
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.push(index);
        path
    }

    /// Iterate the indices from the start node downwards
    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    /// Depth of the addressed node below the start node
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path addresses the start node
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indices as a slice
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for IndexPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl FromIterator<usize> for IndexPath {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a IndexPath {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, index) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str("/")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}
