//! Scene management system
//!
//! An arena-backed node tree with lazily recomputed world transforms, the
//! camera, models and imported assets that live in it, the [`Scene`] that
//! drives per-frame update and draw, and the skeletal animation evaluator.
//!
//! ## Architecture
//!
//! ```text
//! Scene (camera, lights, roots)
//!      ↓
//! SceneGraph (NodeId arena, parent/child links, transforms)
//!      ↓
//! NodeKind (Group | Model | Camera | Light | Bone | Asset)
//! ```
//!
//! Nodes never own each other directly. A node stores the ids of its
//! children and of its parent; re-parenting moves an id from one child list
//! to another.

use thiserror::Error;

use crate::foundation::collections::NodeId;

mod animation;
mod asset;
mod camera;
mod index_path;
mod model;
mod node;
#[allow(clippy::module_inception)]
mod scene;
mod scene_graph;
mod skeleton;

pub use animation::{Animation, AnimationBoneData, Keyframe, DEFAULT_TICKS_PER_SECOND};
pub use asset::{instantiate_asset, AssetNode};
pub use camera::{Camera, CameraMode, PerspectiveProjection, VIEW_POSITION_UNIFORM};
pub use index_path::IndexPath;
pub use model::{Model, Skin};
pub use node::{Bone, Node, NodeKind, TransformState};
pub use scene::Scene;
pub use scene_graph::SceneGraph;
pub use skeleton::Skeleton;

/// Structural errors of the scene graph and the animation evaluator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The id does not refer to a live node
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// Attaching would make a node its own ancestor
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// Node that would become the parent
        parent: NodeId,
        /// Node being attached
        child: NodeId,
    },

    /// The node is not a child of the given parent
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Supposed parent
        parent: NodeId,
        /// Supposed child
        child: NodeId,
    },

    /// A child's recorded index does not point back at it
    #[error("child records index {expected} but is found at {found:?}")]
    ChildIndexMismatch {
        /// Index stored in the child
        expected: usize,
        /// Where the child actually is in the parent's list
        found: Option<usize>,
    },

    /// The node does not carry a camera
    #[error("node {0:?} is not a camera")]
    NotACamera(NodeId),

    /// The node does not carry a light
    #[error("node {0:?} is not a light")]
    NotALight(NodeId),

    /// The node does not carry an asset
    #[error("node {0:?} is not an asset")]
    NotAnAsset(NodeId),

    /// No animation with that name
    #[error("animation '{0}' not found")]
    AnimationNotFound(String),

    /// Animation index past the end
    #[error("animation index {index} out of range ({count} animations)")]
    AnimationIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of animations
        count: usize,
    },

    /// A skeleton description is unusable
    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;
