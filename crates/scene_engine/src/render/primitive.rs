//! GPU geometry: one buffer per vertex attribute plus an optional index buffer
//!
//! Attribute arrays are validated against the position count when uploaded.
//! A mismatch is logged and the array is still uploaded as given; skinning
//! weights and joints are only uploaded as a pair.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;

use crate::assets::{ResourceFactory, ResourceManager};
use crate::render::device::{BufferHandle, GraphicsDevice, VertexArrayHandle, VertexAttribute};
use crate::render::{RenderError, RenderResult};

/// Floats per position, normal, tangent and bitangent
pub const VEC3_COMPONENTS: u32 = 3;
/// Values per vertex for skinning weights and joints
pub const SKIN_COMPONENTS: u32 = 4;
/// Number of independent UV sets
pub const MAX_TEX_COORD_SETS: usize = 3;

const TEX_COORD_ATTRIBUTES: [VertexAttribute; MAX_TEX_COORD_SETS] = [
    VertexAttribute::TexCoord0,
    VertexAttribute::TexCoord1,
    VertexAttribute::TexCoord2,
];

bitflags! {
    /// Which attribute buffers a primitive uploaded
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributeMask: u16 {
        /// Positions
        const POSITION = 1 << 0;
        /// Normals
        const NORMAL = 1 << 1;
        /// First UV set
        const TEX_COORD_0 = 1 << 2;
        /// Second UV set
        const TEX_COORD_1 = 1 << 3;
        /// Third UV set
        const TEX_COORD_2 = 1 << 4;
        /// Tangents
        const TANGENT = 1 << 5;
        /// Bitangents
        const BITANGENT = 1 << 6;
        /// Skinning weights
        const WEIGHTS = 1 << 7;
        /// Skinning joint indices
        const JOINTS = 1 << 8;
        /// Index buffer
        const INDICES = 1 << 9;
    }
}

impl AttributeMask {
    fn tex_coord(set: usize) -> Self {
        match set {
            0 => Self::TEX_COORD_0,
            1 => Self::TEX_COORD_1,
            _ => Self::TEX_COORD_2,
        }
    }
}

/// Raw vertex data for a primitive
///
/// Arrays are flat: three floats per position, `tex_coord_components[i]`
/// floats per vertex in UV set `i`, four values per weight or joint.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveData {
    /// Positions
    pub vertices: Vec<f32>,
    /// Normals
    pub normals: Vec<f32>,
    /// Tangents
    pub tangents: Vec<f32>,
    /// Bitangents
    pub bitangents: Vec<f32>,
    /// Up to three UV sets
    pub tex_coords: [Vec<f32>; MAX_TEX_COORD_SETS],
    /// Components per vertex of each UV set (2 or 3)
    pub tex_coord_components: [u32; MAX_TEX_COORD_SETS],
    /// Skinning weights
    pub weights: Vec<f32>,
    /// Skinning joint indices
    pub joints: Vec<u32>,
    /// Triangle-list indices
    pub indices: Vec<u32>,
}

impl Default for PrimitiveData {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            bitangents: Vec::new(),
            tex_coords: Default::default(),
            tex_coord_components: [2; MAX_TEX_COORD_SETS],
            weights: Vec::new(),
            joints: Vec::new(),
            indices: Vec::new(),
        }
    }
}

impl PrimitiveData {
    /// Data with only positions
    pub fn from_positions(vertices: Vec<f32>) -> Self {
        Self {
            vertices,
            ..Self::default()
        }
    }

    /// Number of vertices (positions)
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VEC3_COMPONENTS as usize
    }

    /// Number of indexed triangles
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices in UV set `set`
    pub fn tex_coord_count(&self, set: usize) -> usize {
        let components = self.tex_coord_components[set].max(1) as usize;
        self.tex_coords[set].len() / components
    }

    /// UV sets whose component count is neither 2 nor 3
    pub fn invalid_tex_coord_sets(&self) -> impl Iterator<Item = usize> + '_ {
        self.tex_coord_components
            .iter()
            .enumerate()
            .filter(|(_, components)| !(2..=3).contains(*components))
            .map(|(set, _)| set)
    }

    /// Log every attribute whose vertex count disagrees with the positions
    ///
    /// # Returns
    /// Number of inconsistencies found
    pub fn validate(&self, name: &str) -> usize {
        let vertex_count = self.vertex_count();
        if vertex_count == 0 {
            log::warn!("Primitive '{}' has no vertices", name);
        }

        let mut counts = vec![
            ("normals", self.normals.len() / VEC3_COMPONENTS as usize),
            ("tangents", self.tangents.len() / VEC3_COMPONENTS as usize),
            ("bitangents", self.bitangents.len() / VEC3_COMPONENTS as usize),
            ("weights", self.weights.len() / SKIN_COMPONENTS as usize),
            ("joints", self.joints.len() / SKIN_COMPONENTS as usize),
        ];
        let uv_names = ["tex coords 0", "tex coords 1", "tex coords 2"];
        for (set, uv_name) in uv_names.into_iter().enumerate() {
            counts.push((uv_name, self.tex_coord_count(set)));
        }

        let mut inconsistencies = 0;
        for set in self.invalid_tex_coord_sets() {
            log::error!(
                "Primitive '{}' declares {} components for tex coords {}",
                name,
                self.tex_coord_components[set],
                set
            );
            inconsistencies += 1;
        }
        for (attribute, count) in counts {
            if count > 0 && count != vertex_count {
                log::warn!(
                    "Primitive '{}' has {} {} for {} vertices",
                    name,
                    count,
                    attribute,
                    vertex_count
                );
                inconsistencies += 1;
            }
        }

        if self.weights.is_empty() != self.joints.is_empty() {
            log::warn!("Primitive '{}' has skinning weights or joints but not both; skinning data is ignored", name);
            inconsistencies += 1;
        }
        if self.indices.is_empty() {
            log::debug!("Primitive '{}' has no indices, drawing by vertex count", name);
        }

        inconsistencies
    }
}

#[derive(Debug)]
struct GpuBuffers {
    vertex_array: VertexArrayHandle,
    buffers: Vec<BufferHandle>,
    attributes: AttributeMask,
    vertex_count: u32,
    index_count: u32,
}

/// Uploaded geometry
pub struct Primitive {
    device: Arc<dyn GraphicsDevice>,
    name: String,
    gpu: Mutex<Option<GpuBuffers>>,
}

impl Primitive {
    /// Create an empty primitive
    pub fn new(device: Arc<dyn GraphicsDevice>, name: impl Into<String>) -> Self {
        Self {
            device,
            name: name.into(),
            gpu: Mutex::new(None),
        }
    }

    /// Create and upload in one step
    pub fn from_data(device: Arc<dyn GraphicsDevice>, name: impl Into<String>, data: &PrimitiveData) -> RenderResult<Self> {
        let primitive = Self::new(device, name);
        primitive.initialize(data)?;
        Ok(primitive)
    }

    fn state(&self) -> MutexGuard<'_, Option<GpuBuffers>> {
        self.gpu.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upload every present attribute and the indices
    ///
    /// # Returns
    /// * `Err(RenderError::AlreadyLoaded)` - Buffers exist; call
    ///   [`release`](Self::release) first
    /// * `Err(RenderError::InvalidGeometry)` - A UV set has neither 2 nor 3
    ///   components
    pub fn initialize(&self, data: &PrimitiveData) -> RenderResult<()> {
        let mut gpu = self.state();
        if gpu.is_some() {
            log::error!("Primitive '{}' is already initialized", self.name);
            return Err(RenderError::AlreadyLoaded(self.name.clone()));
        }

        data.validate(&self.name);
        if let Some(set) = data.invalid_tex_coord_sets().next() {
            return Err(RenderError::InvalidGeometry {
                name: self.name.clone(),
                reason: format!(
                    "tex coords {} have {} components, expected 2 or 3",
                    set, data.tex_coord_components[set]
                ),
            });
        }

        let vertex_array = self.device.create_vertex_array();
        let mut buffers = Vec::new();
        let mut attributes = AttributeMask::empty();

        let mut upload_f32 = |attribute: VertexAttribute, flag: AttributeMask, components: u32, values: &[f32]| {
            if !values.is_empty() {
                buffers.push(self.device.upload_vertex_buffer_f32(vertex_array, attribute, components, values));
                attributes |= flag;
            }
        };

        upload_f32(VertexAttribute::Position, AttributeMask::POSITION, VEC3_COMPONENTS, &data.vertices);
        upload_f32(VertexAttribute::Normal, AttributeMask::NORMAL, VEC3_COMPONENTS, &data.normals);
        for (set, attribute) in TEX_COORD_ATTRIBUTES.into_iter().enumerate() {
            upload_f32(
                attribute,
                AttributeMask::tex_coord(set),
                data.tex_coord_components[set],
                &data.tex_coords[set],
            );
        }
        upload_f32(VertexAttribute::Tangent, AttributeMask::TANGENT, VEC3_COMPONENTS, &data.tangents);
        upload_f32(VertexAttribute::Bitangent, AttributeMask::BITANGENT, VEC3_COMPONENTS, &data.bitangents);

        if !data.weights.is_empty() && !data.joints.is_empty() {
            upload_f32(VertexAttribute::Weights, AttributeMask::WEIGHTS, SKIN_COMPONENTS, &data.weights);
            buffers.push(self.device.upload_vertex_buffer_u32(
                vertex_array,
                VertexAttribute::Joints,
                SKIN_COMPONENTS,
                &data.joints,
            ));
            attributes |= AttributeMask::JOINTS;
        }

        if !data.indices.is_empty() {
            buffers.push(self.device.upload_index_buffer(vertex_array, &data.indices));
            attributes |= AttributeMask::INDICES;
        }

        *gpu = Some(GpuBuffers {
            vertex_array,
            buffers,
            attributes,
            vertex_count: u32::try_from(data.vertex_count()).unwrap_or(u32::MAX),
            index_count: u32::try_from(data.indices.len()).unwrap_or(u32::MAX),
        });
        log::debug!(
            "Initialized primitive '{}' ({} vertices, {} faces)",
            self.name,
            data.vertex_count(),
            data.face_count()
        );
        Ok(())
    }

    /// Attribute buffers that exist
    pub fn attributes(&self) -> AttributeMask {
        self.state().as_ref().map_or(AttributeMask::empty(), |gpu| gpu.attributes)
    }

    /// Whether buffers exist
    pub fn is_initialized(&self) -> bool {
        self.state().is_some()
    }

    /// Whether the primitive carries skinning data
    pub fn is_skinned(&self) -> bool {
        self.attributes().contains(AttributeMask::WEIGHTS | AttributeMask::JOINTS)
    }

    /// Number of uploaded vertices
    pub fn vertex_count(&self) -> u32 {
        self.state().as_ref().map_or(0, |gpu| gpu.vertex_count)
    }

    /// Number of uploaded indices
    pub fn index_count(&self) -> u32 {
        self.state().as_ref().map_or(0, |gpu| gpu.index_count)
    }

    /// Issue the draw call
    ///
    /// Indexed when an index buffer exists, otherwise by vertex count. With no
    /// vertex data this only warns.
    pub fn render(&self) {
        let gpu = self.state();
        let Some(gpu) = gpu.as_ref() else {
            log::warn!("Rendering primitive '{}' before it was initialized", self.name);
            return;
        };

        if gpu.attributes.contains(AttributeMask::INDICES) {
            self.device.draw_elements(gpu.vertex_array, gpu.index_count);
        } else if gpu.attributes.contains(AttributeMask::POSITION) {
            self.device.draw_arrays(gpu.vertex_array, gpu.vertex_count);
        } else {
            log::warn!("Primitive '{}' has no vertex data to draw", self.name);
        }
    }

    /// Delete exactly the buffers that were created
    pub fn release(&self) {
        if let Some(gpu) = self.state().take() {
            for buffer in gpu.buffers {
                self.device.delete_buffer(buffer);
            }
            self.device.delete_vertex_array(gpu.vertex_array);
        }
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("gpu", &*self.state())
            .finish_non_exhaustive()
    }
}

/// Uploads primitives for [`PrimitiveManager`]
pub struct PrimitiveFactory {
    device: Arc<dyn GraphicsDevice>,
}

impl PrimitiveFactory {
    /// Create a factory uploading to `device`
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device }
    }
}

impl ResourceFactory for PrimitiveFactory {
    type Key = String;
    type Data = PrimitiveData;
    type Resource = Primitive;
    type Error = RenderError;

    fn create(&self, key: &String, data: &PrimitiveData) -> RenderResult<Primitive> {
        Primitive::from_data(Arc::clone(&self.device), key.clone(), data)
    }

    fn destroy(&self, _key: &String, primitive: &Primitive) {
        primitive.release();
    }
}

/// Cache of uploaded geometry keyed by name
pub type PrimitiveManager = ResourceManager<PrimitiveFactory>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{DeviceCall, HeadlessDevice};

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    fn device() -> (Arc<HeadlessDevice>, Arc<dyn GraphicsDevice>) {
        let device = Arc::new(HeadlessDevice::new());
        let shared: Arc<dyn GraphicsDevice> = Arc::clone(&device) as Arc<dyn GraphicsDevice>;
        (device, shared)
    }

    #[test]
    fn test_indexed_primitive_draws_elements() {
        let (device, shared) = device();
        let mut data = PrimitiveData::from_positions([TRIANGLE, TRIANGLE].concat());
        data.indices = vec![0, 1, 2, 3, 4, 5];
        let primitive = Primitive::from_data(shared, "quad", &data).unwrap();

        primitive.render();
        let draws = device.draw_calls();
        assert_eq!(draws.len(), 1);
        assert!(matches!(draws[0], DeviceCall::DrawElements { index_count: 6, .. }));
    }

    #[test]
    fn test_position_only_primitive_draws_arrays() {
        let (device, shared) = device();
        let primitive = Primitive::from_data(shared, "triangle", &PrimitiveData::from_positions(TRIANGLE.to_vec())).unwrap();

        primitive.render();
        let draws = device.draw_calls();
        assert_eq!(draws.len(), 1);
        assert!(matches!(draws[0], DeviceCall::DrawArrays { vertex_count: 3, .. }));
    }

    #[test]
    fn test_empty_primitive_render_is_noop() {
        let (device, shared) = device();
        let primitive = Primitive::from_data(shared.clone(), "empty", &PrimitiveData::default()).unwrap();
        primitive.render();

        let uninitialized = Primitive::new(shared, "never");
        uninitialized.render();

        assert!(device.draw_calls().is_empty());
        assert_eq!(primitive.attributes(), AttributeMask::empty());
    }

    #[test]
    fn test_mismatched_attribute_is_still_uploaded() {
        let (device, shared) = device();
        let mut data = PrimitiveData::from_positions(TRIANGLE.to_vec());
        data.normals = vec![0.0, 0.0, 1.0];
        assert_eq!(data.validate("mismatch"), 1);

        let primitive = Primitive::from_data(shared, "mismatch", &data).unwrap();
        assert!(primitive.attributes().contains(AttributeMask::NORMAL));
        assert!(device.calls().contains(&DeviceCall::UploadVertexBuffer {
            vertex_array: VertexArrayHandle(1),
            attribute: VertexAttribute::Normal,
            components: 3,
            len: 3,
        }));
    }

    #[test]
    fn test_weights_without_joints_are_ignored() {
        let (_device, shared) = device();
        let mut data = PrimitiveData::from_positions(TRIANGLE.to_vec());
        data.weights = vec![1.0; 12];

        let primitive = Primitive::from_data(shared.clone(), "half_skinned", &data).unwrap();
        assert!(!primitive.attributes().intersects(AttributeMask::WEIGHTS | AttributeMask::JOINTS));

        data.joints = vec![0; 12];
        let skinned = Primitive::from_data(shared, "skinned", &data).unwrap();
        assert!(skinned.is_skinned());
    }

    #[test]
    fn test_uv_sets_use_their_own_component_count() {
        let (device, shared) = device();
        let mut data = PrimitiveData::from_positions(TRIANGLE.to_vec());
        data.tex_coords[2] = vec![0.0; 9];
        data.tex_coord_components[2] = 3;
        assert_eq!(data.validate("uvw"), 0);

        let primitive = Primitive::from_data(shared, "uvw", &data).unwrap();
        assert_eq!(primitive.attributes(), AttributeMask::POSITION | AttributeMask::TEX_COORD_2);
        assert!(device.calls().iter().any(|call| matches!(
            call,
            DeviceCall::UploadVertexBuffer { attribute: VertexAttribute::TexCoord2, components: 3, .. }
        )));
    }

    #[test]
    fn test_uv_component_count_must_be_two_or_three() {
        let (device, shared) = device();
        let mut data = PrimitiveData::from_positions(TRIANGLE.to_vec());
        data.tex_coords[0] = vec![0.0; 12];
        data.tex_coord_components[0] = 4;
        assert_eq!(data.invalid_tex_coord_sets().collect::<Vec<_>>(), vec![0]);
        assert_eq!(data.validate("uvq"), 1);

        let result = Primitive::from_data(shared, "uvq", &data);
        assert!(matches!(result, Err(RenderError::InvalidGeometry { .. })));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_release_deletes_exactly_created_buffers() {
        let (device, shared) = device();
        let mut data = PrimitiveData::from_positions(TRIANGLE.to_vec());
        data.indices = vec![0, 1, 2];
        let primitive = Primitive::from_data(shared, "tri", &data).unwrap();
        assert_eq!(device.live_buffer_count(), 2);

        assert!(matches!(primitive.initialize(&data), Err(RenderError::AlreadyLoaded(_))));

        primitive.release();
        primitive.release();
        assert_eq!(device.live_buffer_count(), 0);
        assert!(!primitive.is_initialized());
        assert!(primitive.initialize(&data).is_ok());
    }

    #[test]
    fn test_manager_dedups_by_name() {
        let (device, shared) = device();
        let manager = PrimitiveManager::new(PrimitiveFactory::new(shared));
        let data = PrimitiveData::from_positions(TRIANGLE.to_vec());

        let a = manager.insert(&"tri".to_string(), &data).unwrap();
        let b = manager.insert(&"tri".to_string(), &PrimitiveData::default()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.live_buffer_count(), 1);

        manager.clear();
        assert_eq!(device.live_buffer_count(), 0);
    }
}
