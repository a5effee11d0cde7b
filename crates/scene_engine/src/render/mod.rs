//! # Rendering Layer
//!
//! GPU-backed resources and the policy objects that drive them. Nothing in
//! here calls a graphics API directly; every device interaction goes through
//! the [`GraphicsDevice`] seam so the layer runs unchanged against a real
//! backend or the [`HeadlessDevice`] used by tests.
//!
//! ## Architecture
//!
//! - **Device**: handle newtypes and the backend trait
//! - **Shaders and programs**: compiled stages, linked programs, introspected uniforms
//! - **Textures and primitives**: pixel and vertex data uploaded once, cached by key
//! - **Materials and lights**: per-draw uniform policy on top of a program
//!
//! Resource creation errors are hard failures surfaced as [`RenderError`].
//! Inconsistencies discovered while drawing are logged and skipped.

use std::path::PathBuf;

use thiserror::Error;

pub mod device;
pub mod geometry;
pub mod headless;
pub mod lighting;
pub mod material;
pub mod primitive;
pub mod program;
pub mod shader;
pub mod texture;
pub mod uniform;

#[cfg(test)]
pub(crate) mod test_shaders;

pub use device::{
    ActiveUniform, BufferHandle, GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, VertexArrayHandle, VertexAttribute,
};
pub use headless::{DeviceCall, HeadlessDevice};
pub use lighting::{Attenuation, DirLight, Light, PointLight, DIR_LIGHT_COUNT_UNIFORM, POINT_LIGHT_COUNT_UNIFORM};
pub use material::{Material, PhongMaterial, ScreenMaterial, TransformUniforms};
pub use primitive::{Primitive, PrimitiveData, PrimitiveFactory, PrimitiveManager};
pub use program::{Program, ProgramData, ProgramFactory, ProgramManager, StageSource};
pub use shader::{Shader, ShaderData, ShaderFactory, ShaderManager, ShaderSource};
pub use texture::{
    FilterMode, Texture, TextureFactory, TextureKey, TextureManager, TextureParams,
    TextureSource, WrapMode,
};
pub use uniform::{Uniform, UniformType, UniformValue};

/// Failures of resource creation and device interaction
#[derive(Debug, Error)]
pub enum RenderError {
    /// A shader stage failed to compile
    #[error("failed to compile shader '{name}': {log}")]
    Compile {
        /// Shader name
        name: String,
        /// Device diagnostic text
        log: String,
    },

    /// Stages failed to link into a program
    #[error("failed to link program: {log}")]
    Link {
        /// Device diagnostic text
        log: String,
    },

    /// Image bytes could not be decoded
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// A source file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A texture or primitive was loaded twice
    #[error("'{0}' is already loaded")]
    AlreadyLoaded(String),

    /// Geometry data cannot be uploaded as given
    #[error("invalid geometry '{name}': {reason}")]
    InvalidGeometry {
        /// Primitive name
        name: String,
        /// What is wrong with the data
        reason: String,
    },

    /// The resource was released and can no longer be used
    #[error("'{0}' has been released")]
    Released(String),

    /// The device refused an operation
    #[error("device error: {0}")]
    Device(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
