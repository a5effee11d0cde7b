//! Lighting system
//!
//! Lights write themselves into struct-array uniforms such as
//! `pointLights[2].diffuse`. A program that lacks a field (or the whole
//! array) is skipped silently.

use crate::foundation::math::Vec3;
use crate::render::program::Program;
use crate::render::uniform::UniformValue;

/// Position given to new point light nodes
pub const DEFAULT_POINT_LIGHT_POSITION: Vec3 = Vec3::new(0.0, 10.0, 0.0);

/// Int uniform holding the number of directional lights
pub const DIR_LIGHT_COUNT_UNIFORM: &str = "numDirLights";
/// Int uniform holding the number of point lights
pub const POINT_LIGHT_COUNT_UNIFORM: &str = "numPointLights";

/// Distance falloff of a point light
///
/// Only one coefficient is active; the other two are written as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attenuation {
    /// Constant term
    Constant(f32),
    /// Linear term
    Linear(f32),
    /// Quadratic term
    Quadratic(f32),
}

impl Attenuation {
    /// `(constant, linear, quadratic)` coefficients
    pub fn coefficients(self) -> (f32, f32, f32) {
        match self {
            Self::Constant(value) => (value, 0.0, 0.0),
            Self::Linear(value) => (0.0, value, 0.0),
            Self::Quadratic(value) => (0.0, 0.0, value),
        }
    }
}

impl Default for Attenuation {
    fn default() -> Self {
        Self::Linear(1.0)
    }
}

/// Directional light (like sunlight)
#[derive(Debug, Clone, PartialEq)]
pub struct DirLight {
    /// Direction the light travels
    pub direction: Vec3,
    /// Diffuse color
    pub diffuse: Vec3,
    /// Ambient color
    pub ambient: Vec3,
    /// Specular color
    pub specular: Vec3,
}

impl Default for DirLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.0),
            diffuse: Vec3::new(1.0, 1.0, 1.0),
            ambient: Vec3::zeros(),
            specular: Vec3::new(0.3, 0.3, 0.3),
        }
    }
}

/// Point light (like a lightbulb), positioned by its scene node
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    /// Diffuse color
    pub diffuse: Vec3,
    /// Ambient color
    pub ambient: Vec3,
    /// Specular color
    pub specular: Vec3,
    /// Distance falloff
    pub attenuation: Attenuation,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            diffuse: Vec3::new(1.0, 1.0, 1.0),
            ambient: Vec3::new(1.0, 1.0, 1.0),
            specular: Vec3::new(1.0, 1.0, 1.0),
            attenuation: Attenuation::default(),
        }
    }
}

/// Light source attached to a scene node
#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Directional light
    Directional(DirLight),
    /// Point light
    Point(PointLight),
}

impl Light {
    /// Name of the struct array the light is written into
    pub fn uniform_array_name(&self) -> &'static str {
        match self {
            Self::Directional(_) => "dirLights",
            Self::Point(_) => "pointLights",
        }
    }

    /// Name of the int uniform holding the number of lights of this kind
    pub fn count_uniform_name(&self) -> &'static str {
        match self {
            Self::Directional(_) => DIR_LIGHT_COUNT_UNIFORM,
            Self::Point(_) => POINT_LIGHT_COUNT_UNIFORM,
        }
    }

    /// Position a new node carrying this light starts at
    pub fn default_position(&self) -> Vec3 {
        match self {
            Self::Directional(_) => Vec3::zeros(),
            Self::Point(_) => DEFAULT_POINT_LIGHT_POSITION,
        }
    }

    /// Write this light into slot `index` of its array in `program`
    ///
    /// `world_position` is the translation of the light's node.
    pub fn set_program_uniform(&self, program: &Program, index: usize, world_position: Vec3) {
        let prefix = format!("{}[{index}]", self.uniform_array_name());
        let set = |field: &str, value: UniformValue| {
            if let Some(uniform) = program.uniform(&format!("{prefix}.{field}")) {
                uniform.set(value);
            }
        };

        match self {
            Self::Directional(light) => {
                set("direction", light.direction.into());
                set("diffuse", light.diffuse.into());
                set("ambient", light.ambient.into());
                set("specular", light.specular.into());
            }
            Self::Point(light) => {
                let (constant, linear, quadratic) = light.attenuation.coefficients();
                set("position", world_position.into());
                set("diffuse", light.diffuse.into());
                set("ambient", light.ambient.into());
                set("specular", light.specular.into());
                set("constant", constant.into());
                set("linear", linear.into());
                set("quadratic", quadratic.into());
            }
        }
    }
}

impl From<DirLight> for Light {
    fn from(light: DirLight) -> Self {
        Self::Directional(light)
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Self::Point(light)
    }
}
