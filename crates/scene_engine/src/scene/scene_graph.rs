//! Arena-backed node hierarchy
//!
//! Nodes live in a slot map and refer to each other by [`NodeId`]. All tree
//! surgery goes through [`SceneGraph`] so the parent link, the child list and
//! the stored child index always agree.

use std::collections::VecDeque;

use crate::foundation::collections::{NodeArena, NodeId};
use crate::foundation::math::Mat4;

use super::index_path::IndexPath;
use super::node::{Node, NodeKind};
use super::{SceneError, SceneResult};

/// Forest of scene nodes
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: NodeArena<Node>,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached node
    pub fn create_node(&mut self, node: Node) -> NodeId {
        let mut node = node;
        node.parent = None;
        node.index_in_parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Node by id
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable node by id
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Whether the id refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes without a parent
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Children of a node in order; empty for unknown ids
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    /// Topmost ancestor of a node (the node itself when detached)
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.nodes.get(id).map(|_| id)?;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    /// Whether `ancestor` is `node` or lies above it
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// The child is detached from its previous parent first and picks up the
    /// parent's cached world matrix straight away. Attaching to the current
    /// parent again does nothing.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        let parent_world = *self.nodes.get(parent).ok_or(SceneError::NodeNotFound(parent))?.world_matrix();
        let previous = self.nodes.get(child).ok_or(SceneError::NodeNotFound(child))?.parent;

        if self.is_ancestor(child, parent) {
            return Err(SceneError::WouldCreateCycle { parent, child });
        }
        if previous == Some(parent) {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.remove_child(previous, child)?;
        }

        let index = {
            let parent_node = self.nodes.get_mut(parent).ok_or(SceneError::NodeNotFound(parent))?;
            parent_node.children.push(child);
            parent_node.children.len() - 1
        };
        let child_node = self.nodes.get_mut(child).ok_or(SceneError::NodeNotFound(child))?;
        child_node.parent = Some(parent);
        child_node.index_in_parent = Some(index);
        child_node.set_parent_world(parent_world);
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// Later siblings shift down by one and the detached node's parent world
    /// matrix resets to identity.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        let child_node = self.nodes.get(child).ok_or(SceneError::NodeNotFound(child))?;
        let parent_node = self.nodes.get(parent).ok_or(SceneError::NodeNotFound(parent))?;
        if child_node.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }

        let found = parent_node.children.iter().position(|&id| id == child);
        let index = match child_node.index_in_parent {
            Some(index) if parent_node.children.get(index) == Some(&child) => index,
            recorded => {
                let error = SceneError::ChildIndexMismatch {
                    expected: recorded.unwrap_or(usize::MAX),
                    found,
                };
                log::error!("Corrupt child list while detaching {:?}: {}", child, error);
                return Err(error);
            }
        };

        let siblings = {
            let parent_node = self.nodes.get_mut(parent).ok_or(SceneError::NodeNotFound(parent))?;
            parent_node.children.remove(index);
            parent_node.children[index..].to_vec()
        };
        for sibling in siblings {
            if let Some(node) = self.nodes.get_mut(sibling) {
                node.index_in_parent = node.index_in_parent.map(|i| i - 1);
            }
        }

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
            node.index_in_parent = None;
            node.set_parent_world(Mat4::identity());
        }
        Ok(())
    }

    /// Attach under `parent`, or detach when `parent` is `None`
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> SceneResult<()> {
        match parent {
            Some(parent) => self.add_child(parent, child),
            None => match self.parent(child) {
                Some(current) => self.remove_child(current, child),
                None if self.contains(child) => Ok(()),
                None => Err(SceneError::NodeNotFound(child)),
            },
        }
    }

    /// Detach a node and remove it together with its whole subtree
    pub fn destroy(&mut self, id: NodeId) -> SceneResult<()> {
        if let Some(parent) = self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))?.parent {
            self.remove_child(parent, id)?;
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Recompute transforms of a subtree and advance what lives in it
    ///
    /// Every child receives its parent's fresh world matrix whether or not
    /// the parent itself changed. Cameras refresh their cached matrices and
    /// skinned models advance their animation clock by `delta_time` seconds.
    pub fn update(&mut self, id: NodeId, delta_time: f32) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.recompute();
            match &mut node.kind {
                NodeKind::Camera(camera) => camera.update(),
                NodeKind::Model(model) => {
                    if let Some(skin) = &mut model.skin {
                        skin.advance(delta_time);
                    }
                }
                _ => {}
            }

            let world = *node.world_matrix();
            let children = node.children.clone();
            for &child in children.iter().rev() {
                if let Some(child_node) = self.nodes.get_mut(child) {
                    child_node.set_parent_world(world);
                }
                stack.push(child);
            }
        }
    }

    /// Cached world matrix
    pub fn global_transform(&self, id: NodeId) -> Option<Mat4> {
        self.nodes.get(id).map(|node| *node.world_matrix())
    }

    /// Recompute a node's world matrix from its ancestor chain right now
    ///
    /// Only the chain from the root down to `id` is touched; descendants pick
    /// the change up on the next [`update`](Self::update).
    pub fn force_compute_transform(&mut self, id: NodeId) -> Option<Mat4> {
        let mut chain = vec![self.nodes.get(id).map(|_| id)?];
        while let Some(parent) = chain.last().and_then(|&last| self.parent(last)) {
            chain.push(parent);
        }

        let mut parent_world = None;
        for &current in chain.iter().rev() {
            let node = self.nodes.get_mut(current)?;
            if let Some(world) = parent_world {
                node.set_parent_world(world);
            }
            node.recompute();
            parent_world = Some(*node.world_matrix());
        }
        parent_world
    }

    /// Child-index path from `from` to `target`, searched breadth first
    ///
    /// Returns `None` when `target` is not a strict descendant of `from`.
    pub fn breadth_first_search(&self, from: NodeId, target: NodeId) -> Option<IndexPath> {
        if from == target {
            return None;
        }

        let mut queue = VecDeque::from([(from, IndexPath::new())]);
        while let Some((current, path)) = queue.pop_front() {
            for (index, &child) in self.children(current).iter().enumerate() {
                let child_path = path.child(index);
                if child == target {
                    return Some(child_path);
                }
                queue.push_back((child, child_path));
            }
        }
        None
    }

    /// Follow a child-index path down from `from`
    pub fn descendant(&self, from: NodeId, path: &IndexPath) -> Option<NodeId> {
        let mut current = self.nodes.get(from).map(|_| from)?;
        for &index in path {
            current = *self.children(current).get(index)?;
        }
        Some(current)
    }

    /// First node named `name` in a depth-first walk starting at `from`
    pub fn find_by_name(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            let node = self.nodes.get(current)?;
            if node.name() == Some(name) {
                return Some(current);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Deep-copy a subtree
    ///
    /// The copy is detached and structurally identical. References that an
    /// asset keeps into its own subtree are redirected to the matching nodes
    /// of the copy.
    pub fn clone_subtree(&mut self, source: NodeId) -> SceneResult<NodeId> {
        self.clone_tracked(source, &mut Vec::new())
    }

    /// Deep copy that knows which source assets are still rebinding their
    /// models further up the call chain
    pub(super) fn clone_tracked(&mut self, source: NodeId, rebinding: &mut Vec<NodeId>) -> SceneResult<NodeId> {
        let copy = self.nodes.get(source).ok_or(SceneError::NodeNotFound(source))?.detached_copy();
        let clone = self.nodes.insert(copy);

        for child in self.children(source).to_vec() {
            let child_clone = self.clone_tracked(child, rebinding)?;
            self.add_child(clone, child_clone)?;
        }

        if matches!(self.nodes.get(clone).map(|node| &node.kind), Some(NodeKind::Asset(_))) {
            rebinding.push(source);
            self.rebind_asset_models(source, clone, rebinding)?;
            rebinding.pop();
        }
        Ok(clone)
    }

    /// Draw every model of a subtree with its cached world matrix
    pub fn draw(&self, id: NodeId, proj_view: &Mat4) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if let NodeKind::Model(model) = &node.kind {
                model.draw(node.world_matrix(), proj_view);
            }
            stack.extend(node.children.iter().rev());
        }
    }

    /// Iterate all live nodes
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }
}
