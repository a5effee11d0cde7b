//! # Engine Configuration
//!
//! Configuration structures for the subsystems that read settings at
//! construction time: asset resolution for the resource caches, defaults
//! for new cameras, and the logging filter.
//!
//! ## Design Goals
//!
//! - **Centralized**: All configuration types in one place for easy discovery
//! - **Serializable**: Support for multiple config file formats (TOML, RON)
//! - **Type Safe**: Strong typing with validation and defaults

use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError, ConfigFormat};

/// # Asset Configuration
///
/// Base directories used to resolve relative shader and texture paths, and
/// the mipmap default applied when callers build texture keys from a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory that relative shader file paths are resolved against
    pub shader_dir: PathBuf,
    /// Directory that relative texture file paths are resolved against
    pub texture_dir: PathBuf,
    /// Whether textures generate mipmaps unless a key says otherwise
    pub generate_mipmaps: bool,
}

impl AssetConfig {
    /// Create a new asset configuration
    pub fn new() -> Self {
        Self {
            shader_dir: PathBuf::from("resources/shaders"),
            texture_dir: PathBuf::from("resources/textures"),
            generate_mipmaps: true,
        }
    }

    /// Set the shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the texture directory
    pub fn with_texture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.texture_dir = dir.into();
        self
    }

    /// Set the default mipmap flag
    pub fn with_mipmaps(mut self, enabled: bool) -> Self {
        self.generate_mipmaps = enabled;
        self
    }

    /// Resolve a shader path; absolute paths are returned unchanged
    pub fn resolve_shader(&self, path: &Path) -> PathBuf {
        resolve_against(&self.shader_dir, path)
    }

    /// Resolve a texture path; absolute paths are returned unchanged
    pub fn resolve_texture(&self, path: &Path) -> PathBuf {
        resolve_against(&self.texture_dir, path)
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// # Camera Configuration
///
/// Perspective defaults applied to newly created cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
    /// Viewport width divided by height
    pub aspect_ratio: f32,
}

impl CameraConfig {
    /// Create a new camera configuration
    pub fn new() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            aspect_ratio: 16.0 / 9.0,
        }
    }

    /// Set the vertical field of view in degrees
    pub fn with_fov_degrees(mut self, fov: f32) -> Self {
        self.fov_y_degrees = fov;
        self
    }

    /// Set the clipping planes
    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Set the aspect ratio
    pub fn with_aspect_ratio(mut self, aspect: f32) -> Self {
        self.aspect_ratio = aspect;
        self
    }

    /// Validate the projection parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.near <= 0.0 {
            return Err(format!("Near plane must be positive, got {}", self.near));
        }
        if self.far <= self.near {
            return Err(format!("Far plane {} must lie beyond near plane {}", self.far, self.near));
        }
        if !(0.0..180.0).contains(&self.fov_y_degrees) || self.fov_y_degrees == 0.0 {
            return Err(format!("Field of view must be in (0, 180) degrees, got {}", self.fov_y_degrees));
        }
        if self.aspect_ratio <= 0.0 {
            return Err(format!("Aspect ratio must be positive, got {}", self.aspect_ratio));
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub level: String,
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
        }
    }

    /// Set the log level filter
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Engine Configuration
///
/// Top-level configuration that applications load once and hand to the
/// subsystems that need it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Asset resolution settings
    pub assets: AssetConfig,
    /// Camera defaults
    pub camera: CameraConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Create a new engine configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the asset configuration
    pub fn with_assets(mut self, assets: AssetConfig) -> Self {
        self.assets = assets;
        self
    }

    /// Replace the camera configuration
    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    /// Replace the logging configuration
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.camera.validate()
    }
}

impl Config for EngineConfig {}
