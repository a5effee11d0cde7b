//! Phong material
//!
//! Three channels (diffuse, specular, ambient), each a constant color or a
//! texture sampled from a selectable UV set, plus a shininess exponent.

use std::sync::Arc;

use super::{Material, TransformUniforms};
use crate::foundation::math::Vec3;
use crate::render::program::Program;
use crate::render::texture::Texture;
use crate::render::uniform::Uniform;

/// Texture unit of the diffuse map
pub const DIFFUSE_UNIT: u32 = 0;
/// Texture unit of the specular map
pub const SPECULAR_UNIT: u32 = 1;
/// Texture unit of the ambient map
pub const AMBIENT_UNIT: u32 = 2;

/// Color written in place of a channel's constant when it is textured
pub const TEXTURED_COLOR_MARKER: Vec3 = Vec3::new(-1.0, -1.0, -1.0);

const DEFAULT_SHININESS: f32 = 32.0;

/// One lighting channel
#[derive(Debug, Clone)]
pub struct PhongChannel {
    /// Constant color, used when no texture is bound
    pub color: Vec3,
    /// Optional texture
    pub texture: Option<Arc<Texture>>,
    /// UV set sampled by the texture (0..3)
    pub uv_set: u32,
}

impl PhongChannel {
    /// Untextured channel
    pub fn color(color: Vec3) -> Self {
        Self {
            color,
            texture: None,
            uv_set: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct ChannelUniforms {
    color: Option<Arc<Uniform>>,
    texture: Option<Arc<Uniform>>,
    uv_set: Option<Arc<Uniform>>,
    unit: u32,
}

impl ChannelUniforms {
    fn resolve(program: &Program, prefix: &str, unit: u32) -> Self {
        Self {
            color: program.uniform(&format!("{prefix}Color")).cloned(),
            texture: program.uniform(&format!("{prefix}Tex")).cloned(),
            uv_set: program.uniform(&format!("{prefix}UV")).cloned(),
            unit,
        }
    }

    fn apply(&self, channel: &PhongChannel) {
        let textured = match (&channel.texture, &self.texture) {
            (Some(texture), Some(sampler)) if texture.bind(self.unit) => {
                sampler.set(i32::try_from(self.unit).unwrap_or_default());
                true
            }
            _ => false,
        };

        if let Some(color) = &self.color {
            color.set(if textured { TEXTURED_COLOR_MARKER } else { channel.color });
        }
        if let Some(uv_set) = &self.uv_set {
            uv_set.set(i32::try_from(channel.uv_set).unwrap_or_default());
        }
    }
}

/// Phong-lit material
#[derive(Debug)]
pub struct PhongMaterial {
    program: Arc<Program>,
    transform: TransformUniforms,
    channel_uniforms: [ChannelUniforms; 3],
    shininess_uniform: Option<Arc<Uniform>>,

    /// Diffuse channel
    pub diffuse: PhongChannel,
    /// Specular channel
    pub specular: PhongChannel,
    /// Ambient channel
    pub ambient: PhongChannel,
    /// Specular exponent
    pub shininess: f32,
}

impl PhongMaterial {
    /// Create a white material on `program`
    pub fn new(program: Arc<Program>) -> Self {
        let transform = TransformUniforms::new(&program);
        let channel_uniforms = [
            ChannelUniforms::resolve(&program, "diffuse", DIFFUSE_UNIT),
            ChannelUniforms::resolve(&program, "specular", SPECULAR_UNIT),
            ChannelUniforms::resolve(&program, "ambient", AMBIENT_UNIT),
        ];
        let shininess_uniform = program.uniform("shininess").cloned();

        Self {
            program,
            transform,
            channel_uniforms,
            shininess_uniform,
            diffuse: PhongChannel::color(Vec3::new(1.0, 1.0, 1.0)),
            specular: PhongChannel::color(Vec3::new(1.0, 1.0, 1.0)),
            ambient: PhongChannel::color(Vec3::new(1.0, 1.0, 1.0)),
            shininess: DEFAULT_SHININESS,
        }
    }

    /// Set the diffuse texture
    pub fn with_diffuse_texture(mut self, texture: Arc<Texture>, uv_set: u32) -> Self {
        self.diffuse.texture = Some(texture);
        self.diffuse.uv_set = uv_set;
        self
    }

    /// Set the specular texture
    pub fn with_specular_texture(mut self, texture: Arc<Texture>, uv_set: u32) -> Self {
        self.specular.texture = Some(texture);
        self.specular.uv_set = uv_set;
        self
    }

    /// Set the ambient texture
    pub fn with_ambient_texture(mut self, texture: Arc<Texture>, uv_set: u32) -> Self {
        self.ambient.texture = Some(texture);
        self.ambient.uv_set = uv_set;
        self
    }
}

impl Material for PhongMaterial {
    fn program(&self) -> &Arc<Program> {
        &self.program
    }

    fn apply_uniforms(&self) {
        let channels = [&self.diffuse, &self.specular, &self.ambient];
        for (uniforms, channel) in self.channel_uniforms.iter().zip(channels) {
            uniforms.apply(channel);
        }
        if let Some(shininess) = &self.shininess_uniform {
            shininess.set(self.shininess);
        }
    }

    fn transform_uniforms(&self) -> Option<&TransformUniforms> {
        Some(&self.transform)
    }
}
