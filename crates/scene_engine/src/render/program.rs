//! Linked shader programs
//!
//! A [`Program`] links compiled stages and builds its uniform table from
//! device introspection. Every active uniform gets one [`Uniform`] handle;
//! array uniforms reported as `name[0]` are additionally reachable as `name`.
//!
//! Only one program is current on the device at a time. All programs created
//! by one [`ProgramFactory`] share a [`ProgramBinding`] that remembers which
//! one that is, so binding an already-current program costs nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::assets::{ResourceFactory, ResourceManager};
use crate::render::device::{GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage};
use crate::render::shader::{ShaderData, ShaderManager};
use crate::render::uniform::Uniform;
use crate::render::{RenderError, RenderResult};

const FIRST_ELEMENT_SUFFIX: &str = "[0]";

/// Tracks the program currently in use on a device
#[derive(Debug, Default)]
pub struct ProgramBinding {
    current: Mutex<Option<ProgramHandle>>,
}

impl ProgramBinding {
    /// Create a binding with no program in use
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProgramHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Program currently in use
    pub fn current(&self) -> Option<ProgramHandle> {
        *self.lock()
    }

    /// Forget the current program (e.g. after external code changed it)
    pub fn reset(&self) {
        *self.lock() = None;
    }
}

/// A linked program and its uniform table
pub struct Program {
    device: Arc<dyn GraphicsDevice>,
    binding: Arc<ProgramBinding>,
    name: String,
    handle: ProgramHandle,
    uniforms: Vec<Arc<Uniform>>,
    by_name: HashMap<String, usize>,
    linked: AtomicBool,
}

impl Program {
    /// Link compiled stages and introspect the result
    ///
    /// # Returns
    /// * `Err(RenderError::Link)` - The device refused to link; its
    ///   diagnostic text is carried in the error
    pub fn link(
        device: Arc<dyn GraphicsDevice>,
        binding: Arc<ProgramBinding>,
        name: impl Into<String>,
        stages: &[ShaderHandle],
    ) -> RenderResult<Self> {
        let name = name.into();
        let handle = device.link_program(stages).map_err(|log| {
            log::error!("Linking of program '{}' failed: {}", name, log);
            RenderError::Link { log }
        })?;

        let mut uniforms = Vec::new();
        let mut by_name = HashMap::new();
        for active in device.active_uniforms(handle) {
            let index = uniforms.len();
            if let Some(base) = active.name.strip_suffix(FIRST_ELEMENT_SUFFIX) {
                log::debug!("Program '{}' has array uniform '{}'", name, base);
                by_name.insert(base.to_string(), index);
            }
            by_name.insert(active.name.clone(), index);
            uniforms.push(Arc::new(Uniform::new(Arc::clone(&device), handle, &active)));
        }

        log::info!("Linked program '{}' with {} active uniforms", name, uniforms.len());
        Ok(Self {
            device,
            binding,
            name,
            handle,
            uniforms,
            by_name,
            linked: AtomicBool::new(true),
        })
    }

    /// Cache key the program was created under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device handle
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Whether the program is still linked (not released)
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    /// Uniform by full name, or by base name for arrays
    pub fn uniform(&self, name: &str) -> Option<&Arc<Uniform>> {
        self.by_name.get(name).map(|&index| &self.uniforms[index])
    }

    /// Uniforms in declaration order
    pub fn uniforms(&self) -> &[Arc<Uniform>] {
        &self.uniforms
    }

    /// Number of distinct active uniforms
    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    /// Make this program current
    ///
    /// # Returns
    /// `true` if the device was asked to switch programs; `false` if it was
    /// already current or the program has been released
    pub fn bind(&self) -> bool {
        if !self.is_linked() {
            log::warn!("Program '{}' was released and cannot be used", self.name);
            return false;
        }

        let mut current = self.binding.lock();
        if *current == Some(self.handle) {
            return false;
        }
        self.device.use_program(self.handle);
        *current = Some(self.handle);
        true
    }

    /// Delete the device program; later calls do nothing
    pub fn release(&self) {
        if self.linked.swap(false, Ordering::AcqRel) {
            let mut current = self.binding.lock();
            if *current == Some(self.handle) {
                *current = None;
            }
            drop(current);
            self.device.delete_program(self.handle);
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("uniforms", &self.uniforms.len())
            .field("linked", &self.is_linked())
            .finish_non_exhaustive()
    }
}

/// One stage of a program: its shader cache key and how to build it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSource {
    /// Key in the shader cache
    pub key: String,
    /// Source used if the stage is not cached yet
    pub data: ShaderData,
}

impl StageSource {
    /// Create a stage description
    pub fn new(key: impl Into<String>, data: ShaderData) -> Self {
        Self { key: key.into(), data }
    }
}

/// Creation input for a [`Program`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramData {
    /// Vertex stage
    pub vertex: StageSource,
    /// Fragment stage
    pub fragment: StageSource,
    /// Optional geometry stage
    pub geometry: Option<StageSource>,
}

impl ProgramData {
    /// Vertex and fragment stages
    pub fn new(vertex: StageSource, fragment: StageSource) -> Self {
        Self {
            vertex,
            fragment,
            geometry: None,
        }
    }

    /// Add a geometry stage
    pub fn with_geometry(mut self, geometry: StageSource) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Both stages from in-memory source, keyed `{name}.vert` / `{name}.frag`
    pub fn inline(name: &str, vertex: &str, fragment: &str) -> Self {
        Self::new(
            StageSource::new(format!("{name}.vert"), ShaderData::inline(ShaderStage::Vertex, vertex)),
            StageSource::new(format!("{name}.frag"), ShaderData::inline(ShaderStage::Fragment, fragment)),
        )
    }

    fn stages(&self) -> impl Iterator<Item = &StageSource> {
        [Some(&self.vertex), Some(&self.fragment), self.geometry.as_ref()]
            .into_iter()
            .flatten()
    }
}

/// Links programs for [`ProgramManager`]
///
/// Stages go through the shared shader cache, so programs that use the same
/// stage compile it once.
pub struct ProgramFactory {
    device: Arc<dyn GraphicsDevice>,
    shaders: Arc<ShaderManager>,
    binding: Arc<ProgramBinding>,
}

impl ProgramFactory {
    /// Create a factory compiling stages through `shaders`
    pub fn new(device: Arc<dyn GraphicsDevice>, shaders: Arc<ShaderManager>) -> Self {
        Self {
            device,
            shaders,
            binding: Arc::new(ProgramBinding::new()),
        }
    }

    /// Shader cache used for stages
    pub fn shaders(&self) -> &Arc<ShaderManager> {
        &self.shaders
    }

    /// Current-program tracking shared by every created program
    pub fn binding(&self) -> &Arc<ProgramBinding> {
        &self.binding
    }
}

impl ResourceFactory for ProgramFactory {
    type Key = String;
    type Data = ProgramData;
    type Resource = Program;
    type Error = RenderError;

    fn create(&self, key: &String, data: &ProgramData) -> RenderResult<Program> {
        let mut handles = Vec::with_capacity(3);
        for stage in data.stages() {
            let shader = self.shaders.insert(&stage.key, &stage.data)?;
            let handle = shader
                .handle()
                .ok_or_else(|| RenderError::Released(stage.key.clone()))?;
            handles.push(handle);
        }

        Program::link(Arc::clone(&self.device), Arc::clone(&self.binding), key.clone(), &handles)
    }

    fn destroy(&self, _key: &String, program: &Program) {
        program.release();
    }
}

/// Cache of linked programs keyed by name
pub type ProgramManager = ResourceManager<ProgramFactory>;

impl ResourceManager<ProgramFactory> {
    /// Make `program` current; no device call if it already is
    pub fn use_program(&self, program: &Program) -> bool {
        program.bind()
    }

    /// Program currently in use
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.factory().binding().current()
    }
}
