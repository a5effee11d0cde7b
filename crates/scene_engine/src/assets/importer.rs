//! Data handed over by a model importer
//!
//! File parsing lives outside the engine. An importer fills these plain
//! descriptions; the scene turns them into nodes with
//! [`instantiate_asset`](crate::scene::instantiate_asset) and
//! [`Skeleton::from_descriptor`](crate::scene::Skeleton::from_descriptor).

use crate::foundation::math::{Mat4, Transform};
use crate::render::primitive::PrimitiveData;

/// Bones that may influence one vertex
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Bone influences of one vertex
///
/// Holds at most [`MAX_BONE_INFLUENCES`] pairs. When full, a new influence
/// replaces the weakest one, but only if it is heavier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexBoneData {
    ids: [u32; MAX_BONE_INFLUENCES],
    weights: [f32; MAX_BONE_INFLUENCES],
    count: usize,
}

impl VertexBoneData {
    /// Vertex without influences
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `bone` pulls this vertex with `weight`
    ///
    /// # Returns
    /// `false` if the influence was discarded
    pub fn add(&mut self, bone: u32, weight: f32) -> bool {
        if self.count < MAX_BONE_INFLUENCES {
            self.ids[self.count] = bone;
            self.weights[self.count] = weight;
            self.count += 1;
            return true;
        }

        let weakest = self
            .weights
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, &weight)| (index, weight));
        match weakest {
            Some((index, lowest)) if weight > lowest => {
                self.ids[index] = bone;
                self.weights[index] = weight;
                true
            }
            _ => false,
        }
    }

    /// Scale the weights so they sum to one
    pub fn normalize(&mut self) {
        let sum: f32 = self.weights[..self.count].iter().sum();
        if sum > 0.0 {
            for weight in &mut self.weights[..self.count] {
                *weight /= sum;
            }
        }
    }

    /// Number of recorded influences
    pub fn influence_count(&self) -> usize {
        self.count
    }

    /// Weights; a vertex without influences follows bone 0 fully
    pub fn weights(&self) -> [f32; MAX_BONE_INFLUENCES] {
        if self.count == 0 {
            [1.0, 0.0, 0.0, 0.0]
        } else {
            self.weights
        }
    }

    /// Bone indices matching [`weights`](Self::weights)
    pub fn bone_ids(&self) -> [u32; MAX_BONE_INFLUENCES] {
        self.ids
    }

    /// Append this vertex to the skinning attributes of `data`
    pub fn append_to(&self, data: &mut PrimitiveData) {
        data.weights.extend_from_slice(&self.weights());
        data.joints.extend_from_slice(&self.bone_ids());
    }
}

/// Node of an imported file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetNodeDescriptor {
    /// Node name
    pub name: String,
    /// Local transform
    pub transform: Transform,
    /// Names of the meshes drawn at this node
    pub meshes: Vec<String>,
    /// Child nodes
    pub children: Vec<AssetNodeDescriptor>,
}

impl AssetNodeDescriptor {
    /// Node with identity transform
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the local transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the local transform from a 4x4 matrix
    pub fn with_matrix(self, matrix: &Mat4) -> Self {
        self.with_transform(Transform::from_matrix(matrix))
    }

    /// Reference a mesh
    pub fn with_mesh(mut self, mesh: impl Into<String>) -> Self {
        self.meshes.push(mesh.into());
        self
    }

    /// Add a child node
    pub fn with_child(mut self, child: AssetNodeDescriptor) -> Self {
        self.children.push(child);
        self
    }
}

/// One bone of an imported skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct BoneDescriptor {
    /// Bone name, matching animation track names
    pub name: String,
    /// Name of the parent bone
    pub parent: Option<String>,
    /// Local transform at bind time
    pub bind_transform: Mat4,
    /// Model space to bone space at bind time
    pub inverse_bind_pose: Mat4,
}

impl BoneDescriptor {
    /// Describe a bone
    pub fn new(name: impl Into<String>, parent: Option<&str>, bind_transform: Mat4, inverse_bind_pose: Mat4) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_owned),
            bind_transform,
            inverse_bind_pose,
        }
    }
}

/// Imported skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonDescriptor {
    /// Bones in any order
    pub bones: Vec<BoneDescriptor>,
    /// Inverse of the model root's transform
    pub inverse_global_transform: Mat4,
}

impl Default for SkeletonDescriptor {
    fn default() -> Self {
        Self {
            bones: Vec::new(),
            inverse_global_transform: Mat4::identity(),
        }
    }
}
