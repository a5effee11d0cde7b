//! Shader stage compilation and caching

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::assets::{ResourceFactory, ResourceManager};
use crate::core::config::AssetConfig;
use crate::render::device::{GraphicsDevice, ShaderHandle, ShaderStage};
use crate::render::{RenderError, RenderResult};

/// Where a stage's source text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// Source text held in memory
    Inline(String),
    /// Source file, resolved against the shader directory when relative
    File(PathBuf),
}

/// Creation input for a [`Shader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderData {
    /// Pipeline stage
    pub stage: ShaderStage,
    /// Source text or file
    pub source: ShaderSource,
}

impl ShaderData {
    /// Stage compiled from in-memory source
    pub fn inline(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: ShaderSource::Inline(source.into()),
        }
    }

    /// Stage compiled from a file
    pub fn file(stage: ShaderStage, path: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            source: ShaderSource::File(path.into()),
        }
    }
}

/// A compiled shader stage
pub struct Shader {
    device: Arc<dyn GraphicsDevice>,
    name: String,
    stage: ShaderStage,
    handle: Mutex<Option<ShaderHandle>>,
}

impl Shader {
    /// Compile a stage
    ///
    /// # Returns
    /// * `Err(RenderError::Compile)` - The device rejected the source; its
    ///   diagnostic text is carried in the error
    pub fn compile(device: Arc<dyn GraphicsDevice>, name: impl Into<String>, stage: ShaderStage, source: &str) -> RenderResult<Self> {
        let name = name.into();
        let handle = device.compile_shader(stage, source).map_err(|log| {
            log::error!("Compilation of {} shader '{}' failed: {}", stage, name, log);
            RenderError::Compile { name: name.clone(), log }
        })?;

        log::debug!("Compiled {} shader '{}'", stage, name);
        Ok(Self {
            device,
            name,
            stage,
            handle: Mutex::new(Some(handle)),
        })
    }

    fn state(&self) -> MutexGuard<'_, Option<ShaderHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache key the shader was created under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pipeline stage
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Device handle, `None` once released
    pub fn handle(&self) -> Option<ShaderHandle> {
        *self.state()
    }

    /// Delete the device object; later calls do nothing
    pub fn release(&self) {
        if let Some(handle) = self.state().take() {
            self.device.delete_shader(handle);
        }
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("handle", &self.handle())
            .finish_non_exhaustive()
    }
}

/// Compiles shaders for [`ShaderManager`]
pub struct ShaderFactory {
    device: Arc<dyn GraphicsDevice>,
    assets: AssetConfig,
}

impl ShaderFactory {
    /// Create a factory resolving relative files with `assets`
    pub fn new(device: Arc<dyn GraphicsDevice>, assets: AssetConfig) -> Self {
        Self { device, assets }
    }

    /// Device shared with the shaders it creates
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }
}

impl ResourceFactory for ShaderFactory {
    type Key = String;
    type Data = ShaderData;
    type Resource = Shader;
    type Error = RenderError;

    fn create(&self, key: &String, data: &ShaderData) -> RenderResult<Shader> {
        match &data.source {
            ShaderSource::Inline(source) => Shader::compile(Arc::clone(&self.device), key.clone(), data.stage, source),
            ShaderSource::File(path) => {
                let path = self.assets.resolve_shader(path);
                let source = std::fs::read_to_string(&path).map_err(|source| {
                    log::error!("Failed to read shader '{}' from {:?}", key, path);
                    RenderError::Io { path: path.clone(), source }
                })?;
                Shader::compile(Arc::clone(&self.device), key.clone(), data.stage, &source)
            }
        }
    }

    fn destroy(&self, _key: &String, shader: &Shader) {
        shader.release();
    }
}

/// Cache of compiled stages keyed by name
pub type ShaderManager = ResourceManager<ShaderFactory>;
