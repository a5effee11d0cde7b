//! Imported assets
//!
//! An asset node roots the subtree built from one imported file and keeps a
//! keyed index of the model nodes it contains, so callers can reach "the
//! wheel mesh" without walking the tree.

use std::collections::BTreeMap;

use crate::assets::AssetNodeDescriptor;
use crate::foundation::collections::NodeId;

use super::model::Model;
use super::node::{Node, NodeKind};
use super::scene_graph::SceneGraph;
use super::{SceneError, SceneResult};

/// Keyed references to the models of an asset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetNode {
    models: BTreeMap<String, NodeId>,
}

impl AssetNode {
    /// Asset without models
    pub fn new() -> Self {
        Self::default()
    }

    /// Model node registered under `key`
    pub fn model(&self, key: &str) -> Option<NodeId> {
        self.models.get(key).copied()
    }

    /// All registered models, ordered by key
    pub fn models(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.models.iter().map(|(key, &id)| (key.as_str(), id))
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    fn insert_model(&mut self, key: String, id: NodeId) -> Option<NodeId> {
        self.models.insert(key, id)
    }

    fn remove_model(&mut self, key: &str) -> Option<NodeId> {
        self.models.remove(key)
    }
}

impl SceneGraph {
    fn asset_mut(&mut self, asset: NodeId) -> SceneResult<&mut AssetNode> {
        self.get_mut(asset)
            .ok_or(SceneError::NodeNotFound(asset))?
            .as_asset_mut()
            .ok_or(SceneError::NotAnAsset(asset))
    }

    /// Create a model node and register it in `asset` under `key`
    ///
    /// With `attach` the node becomes the asset's last child; otherwise it
    /// stays detached and is only referenced. A model already registered
    /// under the key is replaced in the index but left in the graph.
    pub fn add_asset_model(
        &mut self,
        asset: NodeId,
        key: impl Into<String>,
        model: Model,
        attach: bool,
    ) -> SceneResult<NodeId> {
        let key = key.into();
        self.asset_mut(asset)?;

        let id = self.create_node(Node::new(NodeKind::Model(model)).with_name(key.clone()));
        if attach {
            self.add_child(asset, id)?;
        }
        if let Some(previous) = self.asset_mut(asset)?.insert_model(key.clone(), id) {
            log::debug!("Asset model '{}' now refers to {:?} instead of {:?}", key, id, previous);
        }
        Ok(id)
    }

    /// Model node registered in `asset` under `key`
    pub fn asset_model(&self, asset: NodeId, key: &str) -> Option<NodeId> {
        self.get(asset)?.as_asset()?.model(key)
    }

    /// Drop a model from the asset's index; the node itself stays
    pub fn remove_asset_model(&mut self, asset: NodeId, key: &str) -> SceneResult<Option<NodeId>> {
        Ok(self.asset_mut(asset)?.remove_model(key))
    }

    /// Point the copy of an asset at the copies of its models
    ///
    /// Models inside the source subtree are found again by index path.
    /// Models outside it are cloned on their own and stay detached, unless
    /// they contain an asset that is being cloned already; such references
    /// are dropped.
    pub(super) fn rebind_asset_models(
        &mut self,
        source: NodeId,
        clone: NodeId,
        rebinding: &mut Vec<NodeId>,
    ) -> SceneResult<()> {
        let references: Vec<(String, NodeId)> = self
            .get(source)
            .and_then(Node::as_asset)
            .map(|asset| asset.models().map(|(key, id)| (key.to_owned(), id)).collect())
            .unwrap_or_default();

        let mut rebound = AssetNode::new();
        for (key, original) in references {
            let copy = match self.breadth_first_search(source, original) {
                Some(path) => self.descendant(clone, &path),
                None if !self.contains(original) => None,
                None if rebinding.iter().any(|&asset| self.is_ancestor(original, asset)) => {
                    log::warn!("Asset model '{}' encloses an asset being cloned and is not cloned", key);
                    continue;
                }
                None => Some(self.clone_tracked(original, rebinding)?),
            };
            match copy {
                Some(copy) => {
                    rebound.insert_model(key, copy);
                }
                None => log::warn!("Asset model '{}' no longer exists and is not cloned", key),
            }
        }

        *self.asset_mut(clone)? = rebound;
        Ok(())
    }
}

/// Build the node tree of an imported asset
///
/// The root carries the asset; descendants become groups with their
/// decomposed transforms. Every mesh reference turns into a model child of
/// the node naming it, produced by `make_model`, and is registered under the
/// mesh name (suffixed with `_1`, `_2`, ... on repeats). Meshes for which
/// `make_model` returns `None` are skipped.
pub fn instantiate_asset(
    graph: &mut SceneGraph,
    descriptor: &AssetNodeDescriptor,
    mut make_model: impl FnMut(&str) -> Option<Model>,
) -> SceneResult<NodeId> {
    let root = graph.create_node(
        Node::new(NodeKind::Asset(AssetNode::new()))
            .with_name(descriptor.name.clone())
            .with_transform(&descriptor.transform),
    );

    let mut pending = vec![(root, descriptor)];
    while let Some((id, current)) = pending.pop() {
        for mesh in &current.meshes {
            let Some(model) = make_model(mesh) else {
                log::warn!("No model for mesh '{}' of asset '{}'", mesh, descriptor.name);
                continue;
            };
            let mut key = mesh.clone();
            let mut repeat = 0;
            while graph.asset_model(root, &key).is_some() {
                repeat += 1;
                key = format!("{mesh}_{repeat}");
            }

            let model_id = graph.add_asset_model(root, key, model, false)?;
            graph.add_child(id, model_id)?;
        }

        for child in &current.children {
            let child_id = graph.create_node(
                Node::group()
                    .with_name(child.name.clone())
                    .with_transform(&child.transform),
            );
            graph.add_child(id, child_id)?;
            pending.push((child_id, child));
        }
    }

    log::debug!(
        "Instantiated asset '{}' with {} models",
        descriptor.name,
        graph.get(root).and_then(Node::as_asset).map_or(0, AssetNode::len)
    );
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};

    fn descriptor() -> AssetNodeDescriptor {
        AssetNodeDescriptor::new("car")
            .with_child(
                AssetNodeDescriptor::new("body")
                    .with_transform(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)))
                    .with_mesh("chassis"),
            )
            .with_child(
                AssetNodeDescriptor::new("axle")
                    .with_mesh("wheel")
                    .with_mesh("wheel"),
            )
    }

    #[test]
    fn test_instantiate_registers_models_by_mesh_name() {
        let mut graph = SceneGraph::new();
        let car = instantiate_asset(&mut graph, &descriptor(), |_| Some(Model::default())).unwrap();

        let asset = graph.get(car).and_then(Node::as_asset).unwrap();
        let keys: Vec<&str> = asset.models().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["chassis", "wheel", "wheel_1"]);

        let chassis = graph.asset_model(car, "chassis").unwrap();
        let body = graph.find_by_name(car, "body").unwrap();
        assert_eq!(graph.parent(chassis), Some(body));

        graph.update(car, 0.0);
        assert!((graph.global_transform(chassis).unwrap().m24 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_clone_rebinds_models_into_the_copy() {
        let mut graph = SceneGraph::new();
        let car = instantiate_asset(&mut graph, &descriptor(), |_| Some(Model::default())).unwrap();
        let outside = graph.add_asset_model(car, "spare", Model::default(), false).unwrap();

        let copy = graph.clone_subtree(car).unwrap();

        let original_wheel = graph.asset_model(car, "wheel_1").unwrap();
        let copied_wheel = graph.asset_model(copy, "wheel_1").unwrap();
        assert_ne!(original_wheel, copied_wheel);
        assert!(graph.is_ancestor(copy, copied_wheel));
        assert_eq!(
            graph.breadth_first_search(copy, copied_wheel),
            graph.breadth_first_search(car, original_wheel)
        );

        let copied_spare = graph.asset_model(copy, "spare").unwrap();
        assert_ne!(copied_spare, outside);
        assert_eq!(graph.parent(copied_spare), None);
    }

    #[test]
    fn test_destroyed_model_is_dropped_on_clone() {
        let mut graph = SceneGraph::new();
        let car = instantiate_asset(&mut graph, &descriptor(), |_| Some(Model::default())).unwrap();
        let spare = graph.add_asset_model(car, "spare", Model::default(), false).unwrap();
        graph.destroy(spare).unwrap();

        let copy = graph.clone_subtree(car).unwrap();
        assert_eq!(graph.asset_model(copy, "spare"), None);
        assert!(graph.asset_model(copy, "chassis").is_some());
    }

    #[test]
    fn test_clone_skips_model_enclosing_its_asset() {
        let mut graph = SceneGraph::new();
        let asset = graph.create_node(Node::new(NodeKind::Asset(AssetNode::new())));
        let holder = graph.add_asset_model(asset, "holder", Model::default(), false).unwrap();
        graph.add_child(holder, asset).unwrap();

        let copy = graph.clone_subtree(asset).unwrap();
        assert_eq!(graph.asset_model(copy, "holder"), None);
        assert_eq!(graph.len(), 3);

        let outer = graph.clone_subtree(holder).unwrap();
        let inner = graph.children(outer)[0];
        assert_eq!(graph.asset_model(inner, "holder"), None);
    }

    #[test]
    fn test_clone_skips_cross_referencing_assets() {
        let mut graph = SceneGraph::new();
        let first = graph.create_node(Node::new(NodeKind::Asset(AssetNode::new())));
        let second = graph.create_node(Node::new(NodeKind::Asset(AssetNode::new())));
        let first_model = graph.add_asset_model(first, "m", Model::default(), false).unwrap();
        let second_model = graph.add_asset_model(second, "m", Model::default(), false).unwrap();
        graph.add_child(first_model, second).unwrap();
        graph.add_child(second_model, first).unwrap();

        let copy = graph.clone_subtree(first).unwrap();
        assert!(graph.asset_model(copy, "m").is_some());
    }

    #[test]
    fn test_asset_model_errors() {
        let mut graph = SceneGraph::new();
        let group = graph.create_node(Node::group());
        assert_eq!(
            graph.add_asset_model(group, "x", Model::default(), true),
            Err(SceneError::NotAnAsset(group))
        );
        assert_eq!(graph.len(), 1);

        let asset = graph.create_node(Node::new(NodeKind::Asset(AssetNode::new())));
        let attached = graph.add_asset_model(asset, "x", Model::default(), true).unwrap();
        assert_eq!(graph.children(asset), &[attached]);
        assert_eq!(graph.remove_asset_model(asset, "x"), Ok(Some(attached)));
        assert!(graph.contains(attached));
    }
}
