//! Skeleton and skinning matrix evaluation
//!
//! Bones are ordinary nodes of a private [`SceneGraph`], so posing a skeleton
//! reuses the same transform propagation as the scene itself. The skeleton
//! keeps a flat pre-order view of the bones for index and name lookup.

use std::collections::HashMap;

use crate::assets::SkeletonDescriptor;
use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Transform};

use super::animation::Animation;
use super::node::{Bone, Node, NodeKind};
use super::scene_graph::SceneGraph;
use super::{SceneError, SceneResult};

/// Bone hierarchy and its animation clips
#[derive(Debug, Clone)]
pub struct Skeleton {
    graph: SceneGraph,
    root: NodeId,
    bones: Vec<NodeId>,
    by_name: HashMap<String, usize>,
    inverse_global_transform: Mat4,
    animations: Vec<Animation>,
    animation_by_name: HashMap<String, usize>,
}

impl Skeleton {
    /// Index the bones below `root`
    ///
    /// Bones are numbered in pre-order. Non-bone nodes in between are walked
    /// through but not indexed.
    pub fn new(mut graph: SceneGraph, root: NodeId, inverse_global_transform: Mat4) -> SceneResult<Self> {
        if !graph.contains(root) {
            return Err(SceneError::NodeNotFound(root));
        }

        let mut bones = Vec::new();
        let mut by_name = HashMap::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            stack.extend(graph.children(current).iter().rev());
            let Some(node) = graph.get_mut(current) else {
                continue;
            };
            let name = node.name().map(str::to_owned);
            let Some(bone) = node.as_bone_mut() else {
                continue;
            };

            bone.bone_index = bones.len();
            if let Some(name) = name {
                if by_name.insert(name.clone(), bones.len()).is_some() {
                    return Err(SceneError::InvalidSkeleton(format!("duplicate bone name '{name}'")));
                }
            }
            bones.push(current);
        }

        if bones.is_empty() {
            return Err(SceneError::InvalidSkeleton("no bones below the root".to_string()));
        }

        graph.update(root, 0.0);
        log::debug!("Skeleton indexed {} bones", bones.len());

        Ok(Self {
            graph,
            root,
            bones,
            by_name,
            inverse_global_transform,
            animations: Vec::new(),
            animation_by_name: HashMap::new(),
        })
    }

    /// Build the bone tree from importer output
    ///
    /// Parents are matched by name and exactly one bone may be parentless.
    pub fn from_descriptor(descriptor: &SkeletonDescriptor) -> SceneResult<Self> {
        let mut graph = SceneGraph::new();
        let mut ids: HashMap<&str, NodeId> = HashMap::new();

        for bone in &descriptor.bones {
            let node = Node::new(NodeKind::Bone(Bone::new(bone.bind_transform, bone.inverse_bind_pose)))
                .with_name(bone.name.clone())
                .with_transform(&Transform::from_matrix(&bone.bind_transform));
            if ids.insert(bone.name.as_str(), graph.create_node(node)).is_some() {
                return Err(SceneError::InvalidSkeleton(format!("duplicate bone name '{}'", bone.name)));
            }
        }

        let mut roots = Vec::new();
        for bone in &descriptor.bones {
            let Some(&id) = ids.get(bone.name.as_str()) else {
                continue;
            };
            match &bone.parent {
                Some(parent) => {
                    let parent_id = ids.get(parent.as_str()).copied().ok_or_else(|| {
                        SceneError::InvalidSkeleton(format!("bone '{}' has unknown parent '{}'", bone.name, parent))
                    })?;
                    graph.add_child(parent_id, id)?;
                }
                None => roots.push(id),
            }
        }

        match roots.as_slice() {
            [root] => Self::new(graph, *root, descriptor.inverse_global_transform),
            [] => Err(SceneError::InvalidSkeleton("no root bone".to_string())),
            _ => Err(SceneError::InvalidSkeleton(format!("{} root bones", roots.len()))),
        }
    }

    /// Number of bones
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Index of a bone by name
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Bone node by name
    pub fn bone(&self, name: &str) -> Option<&Node> {
        self.bone_index(name).and_then(|index| self.bone_at(index))
    }

    /// Bone node by index
    pub fn bone_at(&self, index: usize) -> Option<&Node> {
        self.bones.get(index).and_then(|&id| self.graph.get(id))
    }

    /// Graph holding the bones
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Root bone
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Inverse of the model's root transform
    pub fn inverse_global_transform(&self) -> &Mat4 {
        &self.inverse_global_transform
    }

    /// Add a clip, replacing any clip of the same name
    pub fn add_animation(&mut self, animation: Animation) -> usize {
        if let Some(&index) = self.animation_by_name.get(animation.name()) {
            self.animations[index] = animation;
            return index;
        }
        let index = self.animations.len();
        self.animation_by_name.insert(animation.name().to_owned(), index);
        self.animations.push(animation);
        index
    }

    /// Index of a clip by name
    pub fn animation_index(&self, name: &str) -> Option<usize> {
        self.animation_by_name.get(name).copied()
    }

    /// Clip by name
    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animation_index(name).and_then(|index| self.animations.get(index))
    }

    /// Clip by index
    pub fn animation_at(&self, index: usize) -> Option<&Animation> {
        self.animations.get(index)
    }

    /// All clips
    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    /// Pose the skeleton at `time_ticks` of a clip and return one skinning
    /// matrix per bone
    ///
    /// Time loops over the clip length. Bones the clip does not animate are
    /// reset to the identity transform, not to their bind pose.
    pub fn calc_bone_matrices(&mut self, animation_index: usize, time_ticks: f32) -> SceneResult<Vec<Mat4>> {
        let Self {
            graph,
            bones,
            animations,
            ..
        } = self;
        let animation = animations
            .get(animation_index)
            .ok_or(SceneError::AnimationIndexOutOfRange {
                index: animation_index,
                count: animations.len(),
            })?;
        let time = animation.wrap_ticks(time_ticks);

        for &id in bones.iter() {
            let Some(node) = graph.get_mut(id) else {
                continue;
            };
            let transform = match node.name().and_then(|name| animation.track(name)) {
                Some(track) => Transform::new(track.translation_at(time), track.rotation_at(time), track.scale_at(time)),
                None => Transform::identity(),
            };
            node.set_transform(&transform);
        }

        self.graph.update(self.root, 0.0);
        Ok(self.skinning_matrices())
    }

    /// [`calc_bone_matrices`](Self::calc_bone_matrices) addressed by clip name
    pub fn calc_bone_matrices_by_name(&mut self, animation: &str, time_ticks: f32) -> SceneResult<Vec<Mat4>> {
        let index = self
            .animation_index(animation)
            .ok_or_else(|| SceneError::AnimationNotFound(animation.to_owned()))?;
        self.calc_bone_matrices(index, time_ticks)
    }

    /// Reset every bone to its bind pose and return the skinning matrices
    pub fn bind_pose_matrices(&mut self) -> Vec<Mat4> {
        for &id in &self.bones {
            if let Some(node) = self.graph.get_mut(id) {
                if let Some(bind_pose) = node.as_bone().map(|bone| bone.bind_pose) {
                    node.set_transform(&Transform::from_matrix(&bind_pose));
                }
            }
        }
        self.graph.update(self.root, 0.0);
        self.skinning_matrices()
    }

    fn skinning_matrices(&self) -> Vec<Mat4> {
        self.bones
            .iter()
            .filter_map(|&id| self.graph.get(id))
            .filter_map(|node| {
                node.as_bone()
                    .map(|bone| self.inverse_global_transform * node.world_matrix() * bone.inverse_bind_pose)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BoneDescriptor;
    use crate::foundation::math::{Point3, Quat, Vec3};
    use crate::scene::animation::AnimationBoneData;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    /// Root at the origin with a child one unit up
    fn two_bones() -> Skeleton {
        let child_bind = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
        Skeleton::from_descriptor(&SkeletonDescriptor {
            bones: vec![
                BoneDescriptor::new("root", None, Mat4::identity(), Mat4::identity()),
                BoneDescriptor::new("child", Some("root"), child_bind, child_bind.try_inverse().unwrap()),
            ],
            inverse_global_transform: Mat4::identity(),
        })
        .unwrap()
    }

    fn swing() -> Animation {
        Animation::new("swing", 20.0, 10.0)
            .with_track(
                "root",
                AnimationBoneData::new()
                    .with_rotation(0.0, Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2))
                    .with_rotation(20.0, Quat::identity()),
            )
            .with_track("child", AnimationBoneData::new().with_translation(0.0, Vec3::new(0.0, 1.0, 0.0)))
    }

    #[test]
    fn test_bones_are_indexed_in_pre_order() {
        let skeleton = two_bones();
        assert_eq!(skeleton.bone_count(), 2);
        assert_eq!(skeleton.bone_index("root"), Some(0));
        assert_eq!(skeleton.bone_index("child"), Some(1));
        assert_eq!(skeleton.bone("child").and_then(Node::as_bone).map(|b| b.bone_index), Some(1));
    }

    #[test]
    fn test_bind_pose_gives_identity() {
        let root_bind = Mat4::new_translation(&Vec3::new(0.0, 2.0, 0.0))
            * Quat::from_axis_angle(&Vec3::x_axis(), 0.4).to_homogeneous();
        let child_bind = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.5));
        let child_world = root_bind * child_bind;

        let mut skeleton = Skeleton::from_descriptor(&SkeletonDescriptor {
            bones: vec![
                BoneDescriptor::new("root", None, root_bind, root_bind.try_inverse().unwrap()),
                BoneDescriptor::new("child", Some("root"), child_bind, child_world.try_inverse().unwrap()),
            ],
            inverse_global_transform: Mat4::identity(),
        })
        .unwrap();

        for matrix in skeleton.bind_pose_matrices() {
            assert_relative_eq!(matrix, Mat4::identity(), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_rotating_root_swings_child() {
        let mut skeleton = two_bones();
        let swing = skeleton.add_animation(swing());

        let matrices = skeleton.calc_bone_matrices(swing, 0.0).unwrap();

        let child_world = skeleton.bone("child").unwrap().world_matrix();
        assert_relative_eq!(
            child_world.transform_point(&Point3::origin()),
            Point3::new(-1.0, 0.0, 0.0),
            epsilon = EPSILON
        );
        // a vertex authored at the child's bind position follows it
        assert_relative_eq!(
            matrices[1].transform_point(&Point3::new(0.0, 1.0, 0.0)),
            Point3::new(-1.0, 0.0, 0.0),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_keyed_child_rotates_about_its_joint() {
        let child_bind = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
        let tip_bind = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0));
        let mut skeleton = Skeleton::from_descriptor(&SkeletonDescriptor {
            bones: vec![
                BoneDescriptor::new("root", None, Mat4::identity(), Mat4::identity()),
                BoneDescriptor::new("child", Some("root"), child_bind, child_bind.try_inverse().unwrap()),
                BoneDescriptor::new("tip", Some("root"), tip_bind, tip_bind.try_inverse().unwrap()),
            ],
            inverse_global_transform: Mat4::identity(),
        })
        .unwrap();
        let bend = skeleton.add_animation(
            Animation::new("bend", 10.0, 10.0).with_track(
                "child",
                AnimationBoneData::new()
                    .with_translation(0.0, Vec3::new(0.0, 1.0, 0.0))
                    .with_rotation(0.0, Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2)),
            ),
        );

        let matrices = skeleton.calc_bone_matrices(bend, 0.0).unwrap();
        let root = skeleton.bone_index("root").unwrap();
        let child = skeleton.bone_index("child").unwrap();
        let tip = skeleton.bone_index("tip").unwrap();

        // a vertex one unit right of the child joint swings to above it
        assert_relative_eq!(
            matrices[child].transform_point(&Point3::new(1.0, 1.0, 0.0)),
            Point3::new(0.0, 2.0, 0.0),
            epsilon = EPSILON
        );
        assert_relative_eq!(
            matrices[child].transform_point(&Point3::new(0.0, 1.0, 0.0)),
            Point3::new(0.0, 1.0, 0.0),
            epsilon = EPSILON
        );

        assert_relative_eq!(matrices[root], Mat4::identity(), epsilon = EPSILON);
        assert_relative_eq!(*skeleton.bone("tip").unwrap().world_matrix(), Mat4::identity(), epsilon = EPSILON);
        assert_relative_eq!(matrices[tip], tip_bind.try_inverse().unwrap(), epsilon = EPSILON);
    }

    #[test]
    fn test_time_loops_over_clip_length() {
        let mut skeleton = two_bones();
        let swing = skeleton.add_animation(swing());

        for x in [0.0, 5.0, 12.5] {
            let looped = skeleton.calc_bone_matrices(swing, 20.0 + x).unwrap();
            let direct = skeleton.calc_bone_matrices(swing, x).unwrap();
            for (a, b) in looped.iter().zip(&direct) {
                assert_relative_eq!(a, b, epsilon = EPSILON);
            }
        }
    }

    #[test]
    fn test_unanimated_bones_reset_to_identity() {
        let mut skeleton = two_bones();
        let index = skeleton.add_animation(
            Animation::new("spin", 10.0, 10.0)
                .with_track("root", AnimationBoneData::new().with_translation(0.0, Vec3::new(3.0, 0.0, 0.0))),
        );

        skeleton.calc_bone_matrices(index, 0.0).unwrap();

        // the child drops its one-unit bind offset
        let child_world = skeleton.bone("child").unwrap().world_matrix();
        assert_relative_eq!(
            child_world.transform_point(&Point3::origin()),
            Point3::new(3.0, 0.0, 0.0),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_zero_length_clip_samples_first_tick() {
        let mut skeleton = two_bones();
        let index = skeleton.add_animation(
            Animation::new("pose", 0.0, 25.0).with_track(
                "root",
                AnimationBoneData::new()
                    .with_translation(0.0, Vec3::new(1.0, 0.0, 0.0))
                    .with_translation(5.0, Vec3::new(9.0, 0.0, 0.0)),
            ),
        );

        let matrices = skeleton.calc_bone_matrices(index, 3.0).unwrap();
        assert_relative_eq!(matrices[0].m14, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_animation_lookup_errors() {
        let mut skeleton = two_bones();
        assert_eq!(
            skeleton.calc_bone_matrices(0, 0.0),
            Err(SceneError::AnimationIndexOutOfRange { index: 0, count: 0 })
        );
        assert_eq!(
            skeleton.calc_bone_matrices_by_name("run", 0.0),
            Err(SceneError::AnimationNotFound("run".to_string()))
        );

        let first = skeleton.add_animation(swing());
        let replaced = skeleton.add_animation(Animation::new("swing", 5.0, 10.0));
        assert_eq!(first, replaced);
        assert_eq!(skeleton.animations().len(), 1);
        assert_relative_eq!(skeleton.animation("swing").unwrap().total_ticks(), 5.0);
    }

    #[test]
    fn test_descriptor_validation() {
        let orphan = SkeletonDescriptor {
            bones: vec![BoneDescriptor::new("a", Some("missing"), Mat4::identity(), Mat4::identity())],
            inverse_global_transform: Mat4::identity(),
        };
        assert!(matches!(Skeleton::from_descriptor(&orphan), Err(SceneError::InvalidSkeleton(_))));

        let two_roots = SkeletonDescriptor {
            bones: vec![
                BoneDescriptor::new("a", None, Mat4::identity(), Mat4::identity()),
                BoneDescriptor::new("b", None, Mat4::identity(), Mat4::identity()),
            ],
            inverse_global_transform: Mat4::identity(),
        };
        assert!(matches!(Skeleton::from_descriptor(&two_roots), Err(SceneError::InvalidSkeleton(_))));
    }
}
