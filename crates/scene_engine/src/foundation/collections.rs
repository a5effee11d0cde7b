//! Specialized collection types

pub use slotmap::{SlotMap, Key};

slotmap::new_key_type! {
    /// Stable handle of a node inside a [`SceneGraph`](crate::scene::SceneGraph)
    ///
    /// Handles stay valid while the node is alive and are never reused for a
    /// different node, so a stale handle simply fails to resolve.
    pub struct NodeId;
}

/// Arena storage for scene nodes
pub type NodeArena<T> = SlotMap<NodeId, T>;

/// Set that remembers insertion order
///
/// Iteration always yields items in the order they were first inserted, which
/// keeps anything derived from it (such as light array slots) deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionSet<T> {
    items: Vec<T>,
}

impl<T: PartialEq> InsertionSet<T> {
    /// Create an empty set
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert an item; returns `false` if it was already present
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove an item, preserving the order of the rest
    pub fn remove(&mut self, item: &T) -> bool {
        if let Some(position) = self.items.iter().position(|existing| existing == item) {
            self.items.remove(position);
            true
        } else {
            false
        }
    }

    /// Whether the item is present
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep only the items matching the predicate
    pub fn retain(&mut self, predicate: impl FnMut(&T) -> bool) {
        self.items.retain(predicate);
    }
}

impl<T: PartialEq> Default for InsertionSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a InsertionSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
