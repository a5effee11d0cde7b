//! Asset management system
//!
//! The deduplicating resource cache shared by every GPU resource kind, image
//! decoding, and the data an external model importer hands to the engine.

pub mod image_loader;
pub mod importer;
pub mod resource_manager;

pub use image_loader::{ImageData, RowOrder};
pub use importer::{
    AssetNodeDescriptor, BoneDescriptor, SkeletonDescriptor, VertexBoneData, MAX_BONE_INFLUENCES,
};
pub use resource_manager::{ResourceFactory, ResourceManager};
