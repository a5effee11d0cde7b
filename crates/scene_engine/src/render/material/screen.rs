//! Full-screen blit of an offscreen color buffer

use std::sync::Arc;

use super::Material;
use crate::render::program::Program;
use crate::render::texture::Texture;
use crate::render::uniform::Uniform;

/// Sampler the color buffer is bound to
pub const SCREEN_TEXTURE_UNIFORM: &str = "screenTexture";
const SCREEN_TEXTURE_UNIT: u32 = 0;

/// Material drawing one externally owned texture
#[derive(Debug)]
pub struct ScreenMaterial {
    program: Arc<Program>,
    sampler: Option<Arc<Uniform>>,
    color_buffer: Arc<Texture>,
}

impl ScreenMaterial {
    /// Blit `color_buffer`, typically wrapped with [`Texture::from_handle`]
    pub fn new(program: Arc<Program>, color_buffer: Arc<Texture>) -> Self {
        let sampler = program.uniform(SCREEN_TEXTURE_UNIFORM).cloned();
        if sampler.is_none() {
            log::warn!("Program '{}' has no '{}' sampler", program.name(), SCREEN_TEXTURE_UNIFORM);
        }
        Self {
            program,
            sampler,
            color_buffer,
        }
    }

    /// Replace the blitted texture (e.g. after a framebuffer resize)
    pub fn set_color_buffer(&mut self, color_buffer: Arc<Texture>) {
        self.color_buffer = color_buffer;
    }
}

impl Material for ScreenMaterial {
    fn program(&self) -> &Arc<Program> {
        &self.program
    }

    fn apply_uniforms(&self) {
        if let Some(sampler) = &self.sampler {
            self.color_buffer.bind(SCREEN_TEXTURE_UNIT);
            sampler.set(i32::try_from(SCREEN_TEXTURE_UNIT).unwrap_or_default());
        }
    }
}
