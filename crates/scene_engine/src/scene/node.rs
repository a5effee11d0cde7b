//! Scene nodes and their cached transforms

use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::lighting::Light;

use super::asset::AssetNode;
use super::camera::Camera;
use super::model::Model;

/// Validity of a node's cached matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    /// Local and world matrices are up to date
    Clean,
    /// A local component changed; both matrices are stale
    LocalDirty,
    /// Only an ancestor changed; the world matrix is stale
    WorldDirty,
}

/// Joint of a skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Model space to bone space at bind time
    pub inverse_bind_pose: Mat4,
    /// Local transform at bind time
    pub bind_pose: Mat4,
    /// Slot in the owning skeleton's flat bone list
    pub bone_index: usize,
}

impl Bone {
    /// Bone with the given bind matrices; its index is assigned by the skeleton
    pub fn new(bind_pose: Mat4, inverse_bind_pose: Mat4) -> Self {
        Self {
            inverse_bind_pose,
            bind_pose,
            bone_index: 0,
        }
    }
}

/// What a node contributes besides its transform
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Plain transform group
    Group,
    /// Drawable geometry
    Model(Model),
    /// View into the scene
    Camera(Camera),
    /// Light source
    Light(Light),
    /// Skeleton joint
    Bone(Bone),
    /// Root of an imported asset
    Asset(AssetNode),
}

/// Node of a [`SceneGraph`](super::SceneGraph)
///
/// Setting a transform component only marks the node dirty. Matrices are
/// recomputed by the graph's update pass or by
/// [`force_compute_transform`](super::SceneGraph::force_compute_transform);
/// the accessors never recompute.
#[derive(Debug, Clone)]
pub struct Node {
    name: Option<String>,

    position: Vec3,
    rotation: Quat,
    scale: Vec3,

    local: Mat4,
    parent_world: Mat4,
    world: Mat4,
    local_dirty: bool,
    world_dirty: bool,

    pub(crate) parent: Option<NodeId>,
    pub(crate) index_in_parent: Option<usize>,
    pub(crate) children: Vec<NodeId>,

    /// Role of the node
    pub kind: NodeKind,
}

impl Node {
    /// Create a detached node
    ///
    /// Point lights start at their default height; everything else starts at
    /// the origin.
    pub fn new(kind: NodeKind) -> Self {
        let position = match &kind {
            NodeKind::Light(light) => light.default_position(),
            _ => Vec3::zeros(),
        };
        let local = Mat4::new_translation(&position);

        Self {
            name: None,
            position,
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            local,
            parent_world: Mat4::identity(),
            world: local,
            local_dirty: false,
            world_dirty: false,
            parent: None,
            index_in_parent: None,
            children: Vec::new(),
            kind,
        }
    }

    /// Plain group node
    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set all three transform components
    pub fn with_transform(mut self, transform: &Transform) -> Self {
        self.set_transform(transform);
        self
    }

    /// Node name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Rename the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set the local position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_local_dirty();
    }

    /// Set the local rotation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.mark_local_dirty();
    }

    /// Set the local scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.mark_local_dirty();
    }

    /// Set position, rotation and scale at once
    pub fn set_transform(&mut self, transform: &Transform) {
        self.position = transform.position;
        self.rotation = transform.rotation;
        self.scale = transform.scale;
        self.mark_local_dirty();
    }

    /// Local components as a [`Transform`]
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation, self.scale)
    }

    /// Cached local matrix
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    /// Cached world matrix
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Cached world matrix of the parent, identity for a detached node
    pub fn parent_world_matrix(&self) -> &Mat4 {
        &self.parent_world
    }

    /// Which cached matrices are stale
    pub fn transform_state(&self) -> TransformState {
        if self.local_dirty {
            TransformState::LocalDirty
        } else if self.world_dirty {
            TransformState::WorldDirty
        } else {
            TransformState::Clean
        }
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Position in the parent's child list
    pub fn index_in_parent(&self) -> Option<usize> {
        self.index_in_parent
    }

    /// Children in order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Camera carried by this node
    pub fn as_camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Mutable camera carried by this node
    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Model carried by this node
    pub fn as_model(&self) -> Option<&Model> {
        match &self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Mutable model carried by this node
    pub fn as_model_mut(&mut self) -> Option<&mut Model> {
        match &mut self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Light carried by this node
    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mutable light carried by this node
    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Bone carried by this node
    pub fn as_bone(&self) -> Option<&Bone> {
        match &self.kind {
            NodeKind::Bone(bone) => Some(bone),
            _ => None,
        }
    }

    /// Asset carried by this node
    pub fn as_asset(&self) -> Option<&AssetNode> {
        match &self.kind {
            NodeKind::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    /// Mutable asset carried by this node
    pub fn as_asset_mut(&mut self) -> Option<&mut AssetNode> {
        match &mut self.kind {
            NodeKind::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    pub(crate) fn as_bone_mut(&mut self) -> Option<&mut Bone> {
        match &mut self.kind {
            NodeKind::Bone(bone) => Some(bone),
            _ => None,
        }
    }

    /// Copy of the transform state and kind, without tree links
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            local: self.local,
            parent_world: Mat4::identity(),
            world: self.local,
            local_dirty: self.local_dirty,
            world_dirty: true,
            parent: None,
            index_in_parent: None,
            children: Vec::new(),
            kind: self.kind.clone(),
        }
    }

    /// Store the parent's world matrix; the own world matrix becomes stale
    pub(crate) fn set_parent_world(&mut self, parent_world: Mat4) {
        self.parent_world = parent_world;
        self.world_dirty = true;
    }

    /// Bring both cached matrices up to date
    pub(crate) fn recompute(&mut self) {
        if self.local_dirty {
            self.local = self.transform().to_matrix();
        }
        if self.local_dirty || self.world_dirty {
            self.world = self.parent_world * self.local;
        }
        self.local_dirty = false;
        self.world_dirty = false;
    }

    fn mark_local_dirty(&mut self) {
        self.local_dirty = true;
        self.world_dirty = true;
    }
}
