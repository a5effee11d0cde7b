//! Material system
//!
//! A material is the per-draw policy on top of one shared [`Program`]: it
//! makes the program current and pushes its own uniform values. Drawable
//! materials also expose [`TransformUniforms`] so a model can write its
//! matrices before each draw.
//!
//! # Material Types
//!
//! - **Phong**: colors, optional textures per channel, UV-set selection, shininess
//! - **Screen**: blits one externally owned color buffer

use std::fmt;
use std::sync::Arc;

use crate::render::program::Program;

pub mod phong;
pub mod screen;
pub mod transform;

pub use phong::{PhongChannel, PhongMaterial, DIFFUSE_UNIT, SPECULAR_UNIT, AMBIENT_UNIT, TEXTURED_COLOR_MARKER};
pub use screen::ScreenMaterial;
pub use transform::TransformUniforms;

/// Binds a program and its per-draw uniform values
pub trait Material: Send + Sync + fmt::Debug {
    /// Program the material renders with
    fn program(&self) -> &Arc<Program>;

    /// Push material-specific uniforms and texture bindings
    ///
    /// Called by [`use_material`](Self::use_material) after the program is current.
    fn apply_uniforms(&self);

    /// Matrix uniforms, for materials that draw models
    fn transform_uniforms(&self) -> Option<&TransformUniforms> {
        None
    }

    /// Make the program current and push the material's uniforms
    ///
    /// # Returns
    /// `false` (nothing is pushed) if the program was released
    fn use_material(&self) -> bool {
        let program = self.program();
        if !program.is_linked() {
            log::error!("Using a material whose program '{}' is not loaded", program.name());
            return false;
        }
        program.bind();
        self.apply_uniforms();
        true
    }
}
