//! # Scene Engine
//!
//! Core of a scene-graph renderer: deduplicating resource caches for GPU
//! objects, shader programs with cached uniform writes, materials and lights,
//! an arena-backed node tree with lazily recomputed transforms, and a
//! skeletal animation evaluator.
//!
//! ## Features
//!
//! - **Resource caches**: one [`ResourceManager`](assets::ResourceManager) per
//!   resource kind, at most one resource per key
//! - **Device seam**: every GPU call goes through
//!   [`GraphicsDevice`](render::GraphicsDevice); [`HeadlessDevice`](render::HeadlessDevice)
//!   records calls instead of issuing them
//! - **Scene graph**: stable [`NodeId`](foundation::collections::NodeId)
//!   handles, safe re-parenting and subtree cloning
//! - **Skinning**: keyframe sampling and per-bone skinning matrices
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     scene_engine::foundation::logging::init_with_level(&config.logging);
//!
//!     let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
//!     let shaders = Arc::new(ShaderManager::new(ShaderFactory::new(Arc::clone(&device), config.assets.clone())));
//!     let programs = ProgramManager::new(ProgramFactory::new(Arc::clone(&device), shaders));
//!     let primitives = PrimitiveManager::new(PrimitiveFactory::new(Arc::clone(&device)));
//!
//!     let program = programs.insert(
//!         &"phong".to_string(),
//!         &ProgramData::new(
//!             StageSource::new("phong.vert", ShaderData::file(ShaderStage::Vertex, "phong.vert")),
//!             StageSource::new("phong.frag", ShaderData::file(ShaderStage::Fragment, "phong.frag")),
//!         ),
//!     )?;
//!     let cube = scene_engine::render::geometry::cuboid_primitive(&primitives, 1.0, 1.0, 1.0)?;
//!
//!     let mut scene = Scene::new();
//!     scene.add_camera(None, Camera::from_config(&config.camera))?;
//!     scene.add_light(None, PointLight::default().into())?;
//!     scene.add_root(Node::new(NodeKind::Model(Model::new(cube, Arc::new(PhongMaterial::new(program))))));
//!
//!     scene.update(1.0 / 60.0);
//!     scene.prep_shader_programs(&programs);
//!     scene.draw();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{
            AssetNodeDescriptor, BoneDescriptor, ImageData, ResourceFactory, ResourceManager,
            SkeletonDescriptor, VertexBoneData,
        },
        core::config::{AssetConfig, CameraConfig, EngineConfig, LoggingConfig},
        foundation::{
            collections::NodeId,
            math::{Mat4, Quat, Transform, Vec3},
        },
        render::{
            DirLight, GraphicsDevice, HeadlessDevice, Light, Material, PhongMaterial, PointLight,
            PrimitiveData, PrimitiveFactory, PrimitiveManager, ProgramData, ProgramFactory,
            ProgramManager, RenderError, ScreenMaterial, ShaderData, ShaderFactory, ShaderManager,
            ShaderStage, StageSource, Texture, TextureFactory, TextureManager,
        },
        scene::{
            instantiate_asset, Animation, AnimationBoneData, Camera, CameraMode, IndexPath, Model,
            Node, NodeKind, PerspectiveProjection, Scene, SceneError, SceneGraph, Skeleton, Skin,
        },
    };
}
