//! Backend abstraction trait for the rendering system
//!
//! The engine never talks to a graphics API directly. Everything it needs
//! from one (compile, link, introspect, upload, bind, draw) goes through
//! [`GraphicsDevice`], shared as `Arc<dyn GraphicsDevice>` by every
//! GPU-backed object. Methods take `&self`; implementations keep their own
//! interior state.

use std::fmt;

use crate::assets::ImageData;
use crate::render::texture::TextureParams;
use crate::render::uniform::{UniformType, UniformValue};
use crate::render::RenderResult;

/// Handle to a compiled shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

/// Handle to a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Handle to a vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Handle to a vertex array object grouping a primitive's buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

/// Handle to a 2D texture
///
/// Also used for textures created outside the engine, such as the color
/// attachment of an offscreen framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Programmable pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
    /// Optional geometry stage
    Geometry,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
        };
        f.write_str(name)
    }
}

/// Vertex attribute slots shared by every primitive and shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    /// Object-space position
    Position,
    /// Vertex normal
    Normal,
    /// First UV set
    TexCoord0,
    /// Second UV set
    TexCoord1,
    /// Third UV set
    TexCoord2,
    /// Tangent
    Tangent,
    /// Bitangent
    Bitangent,
    /// Skinning weights
    Weights,
    /// Skinning joint indices
    Joints,
}

impl VertexAttribute {
    /// Shader input location of the attribute
    pub const fn location(self) -> u32 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::TexCoord0 => 2,
            Self::TexCoord1 => 3,
            Self::TexCoord2 => 4,
            Self::Tangent => 5,
            Self::Bitangent => 6,
            Self::Weights => 7,
            Self::Joints => 8,
        }
    }
}

/// An active uniform reported by program introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Name as reported by the device, e.g. `lights[0]` for an array
    pub name: String,
    /// Declared type
    pub uniform_type: UniformType,
    /// Declared array length, 1 for scalars
    pub size: u32,
    /// Location used for writes
    pub location: i32,
}

/// Graphics API collaborator
///
/// Compile and link report failures as the device's diagnostic text; callers
/// wrap it into [`RenderError`](crate::render::RenderError) with context.
pub trait GraphicsDevice: Send + Sync {
    /// Compile one shader stage from source
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;

    /// Delete a compiled stage
    fn delete_shader(&self, shader: ShaderHandle);

    /// Link stages into a program
    fn link_program(&self, stages: &[ShaderHandle]) -> Result<ProgramHandle, String>;

    /// Delete a linked program
    fn delete_program(&self, program: ProgramHandle);

    /// Active uniforms of a linked program in declaration order
    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform>;

    /// Make a program current
    fn use_program(&self, program: ProgramHandle);

    /// Write consecutive array elements of a uniform starting at `first_index`
    fn set_uniform(&self, program: ProgramHandle, location: i32, first_index: u32, values: &[UniformValue]);

    /// Create an empty vertex array object
    fn create_vertex_array(&self) -> VertexArrayHandle;

    /// Delete a vertex array object
    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle);

    /// Upload a float attribute buffer with `components` floats per vertex
    fn upload_vertex_buffer_f32(
        &self,
        vertex_array: VertexArrayHandle,
        attribute: VertexAttribute,
        components: u32,
        data: &[f32],
    ) -> BufferHandle;

    /// Upload an unsigned integer attribute buffer with `components` values per vertex
    fn upload_vertex_buffer_u32(
        &self,
        vertex_array: VertexArrayHandle,
        attribute: VertexAttribute,
        components: u32,
        data: &[u32],
    ) -> BufferHandle;

    /// Upload a triangle-list index buffer
    fn upload_index_buffer(&self, vertex_array: VertexArrayHandle, indices: &[u32]) -> BufferHandle;

    /// Delete a vertex or index buffer
    fn delete_buffer(&self, buffer: BufferHandle);

    /// Create, upload and configure a 2D texture from RGBA8 pixels
    fn create_texture(&self, image: &ImageData, params: &TextureParams) -> RenderResult<TextureHandle>;

    /// Bind a texture to a texture unit
    fn bind_texture(&self, unit: u32, texture: TextureHandle);

    /// Delete a texture
    fn delete_texture(&self, texture: TextureHandle);

    /// Draw `vertex_count` vertices as a triangle list
    fn draw_arrays(&self, vertex_array: VertexArrayHandle, vertex_count: u32);

    /// Draw `index_count` indices as a triangle list
    fn draw_elements(&self, vertex_array: VertexArrayHandle, index_count: u32);
}
