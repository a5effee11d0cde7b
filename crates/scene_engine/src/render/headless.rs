//! Headless graphics device
//!
//! A [`GraphicsDevice`] that needs no GPU. It hands out handles, keeps track
//! of which objects are alive, and records every state-changing call so that
//! callers can assert on what would have been sent to a real API.
//!
//! Shader handling is emulated closely enough for the engine's own logic:
//! - a stage without a `main` entry point fails to compile
//! - a program needs a vertex and a fragment stage to link
//! - active uniforms are discovered by parsing `uniform` declarations,
//!   expanding arrays of structs into `name[i].field` entries and reporting
//!   arrays of plain types once as `name[0]` with their length

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::assets::ImageData;
use crate::render::device::{
    ActiveUniform, BufferHandle, GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, VertexArrayHandle, VertexAttribute,
};
use crate::render::texture::TextureParams;
use crate::render::uniform::{UniformType, UniformValue};
use crate::render::{RenderError, RenderResult};

/// A call recorded by [`HeadlessDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// Program made current
    UseProgram(ProgramHandle),
    /// Uniform write
    SetUniform {
        /// Target program
        program: ProgramHandle,
        /// Uniform location
        location: i32,
        /// First array element written
        first_index: u32,
        /// Written values
        values: Vec<UniformValue>,
    },
    /// Attribute buffer upload
    UploadVertexBuffer {
        /// Owning vertex array
        vertex_array: VertexArrayHandle,
        /// Attribute slot
        attribute: VertexAttribute,
        /// Components per vertex
        components: u32,
        /// Number of scalars uploaded
        len: usize,
    },
    /// Index buffer upload
    UploadIndexBuffer {
        /// Owning vertex array
        vertex_array: VertexArrayHandle,
        /// Number of indices
        count: usize,
    },
    /// Buffer deletion
    DeleteBuffer(BufferHandle),
    /// Texture creation
    CreateTexture {
        /// New texture
        texture: TextureHandle,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Upload parameters
        params: TextureParams,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Texture unit
        unit: u32,
        /// Bound texture
        texture: TextureHandle,
    },
    /// Texture deletion
    DeleteTexture(TextureHandle),
    /// Program deletion
    DeleteProgram(ProgramHandle),
    /// Shader deletion
    DeleteShader(ShaderHandle),
    /// Non-indexed triangle-list draw
    DrawArrays {
        /// Drawn vertex array
        vertex_array: VertexArrayHandle,
        /// Vertices drawn
        vertex_count: u32,
    },
    /// Indexed triangle-list draw
    DrawElements {
        /// Drawn vertex array
        vertex_array: VertexArrayHandle,
        /// Indices drawn
        index_count: u32,
    },
}

#[derive(Default)]
struct HeadlessState {
    next_id: u32,
    shaders: HashMap<ShaderHandle, (ShaderStage, String)>,
    programs: HashMap<ProgramHandle, Vec<ActiveUniform>>,
    vertex_arrays: HashSet<VertexArrayHandle>,
    buffers: HashSet<BufferHandle>,
    textures: HashSet<TextureHandle>,
    current_program: Option<ProgramHandle>,
    calls: Vec<DeviceCall>,
}

impl HeadlessState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording device without a GPU
#[derive(Default)]
pub struct HeadlessDevice {
    state: Mutex<HeadlessState>,
}

impl HeadlessDevice {
    /// Create a device with no objects
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every recorded call
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls (object tracking is kept)
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Recorded draw calls
    pub fn draw_calls(&self) -> Vec<DeviceCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, DeviceCall::DrawArrays { .. } | DeviceCall::DrawElements { .. }))
            .cloned()
            .collect()
    }

    /// Number of uniform writes that reached the device
    pub fn uniform_write_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, DeviceCall::SetUniform { .. }))
            .count()
    }

    /// Number of `use_program` calls that reached the device
    pub fn use_program_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, DeviceCall::UseProgram(_)))
            .count()
    }

    /// Currently bound program
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.state().current_program
    }

    /// Number of live vertex and index buffers
    pub fn live_buffer_count(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of live textures
    pub fn live_texture_count(&self) -> usize {
        self.state().textures.len()
    }

    /// Number of live programs
    pub fn live_program_count(&self) -> usize {
        self.state().programs.len()
    }

    /// Number of live shader stages
    pub fn live_shader_count(&self) -> usize {
        self.state().shaders.len()
    }

    /// Last value written to a uniform element, addressed by name
    ///
    /// Accepts plain names (`viewPos`), struct members (`pointLights[1].diffuse`)
    /// and elements of plain arrays (`boneMatrices[3]`).
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let state = self.state();
        let uniforms = state.programs.get(&program)?;
        let (location, element) = resolve_element(uniforms, name)?;

        state.calls.iter().rev().find_map(|call| match call {
            DeviceCall::SetUniform {
                program: written_program,
                location: written_location,
                first_index,
                values,
            } if *written_program == program && *written_location == location => {
                let offset = element.checked_sub(*first_index)?;
                values.get(usize::try_from(offset).ok()?).copied()
            }
            _ => None,
        })
    }
}

fn resolve_element(uniforms: &[ActiveUniform], name: &str) -> Option<(i32, u32)> {
    if let Some(exact) = uniforms.iter().find(|u| u.name == name) {
        return Some((exact.location, 0));
    }

    let open = name.rfind('[')?;
    let index: u32 = name[open + 1..].strip_suffix(']')?.parse().ok()?;
    let base = format!("{}[0]", &name[..open]);
    uniforms
        .iter()
        .find(|u| u.name == base && index < u.size)
        .map(|u| (u.location, index))
}

impl GraphicsDevice for HeadlessDevice {
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        if !strip_comments(source).contains("void main") {
            return Err(format!("ERROR: 0:1: {stage} shader has no entry point 'main'"));
        }
        let mut state = self.state();
        let handle = ShaderHandle(state.next());
        state.shaders.insert(handle, (stage, source.to_string()));
        Ok(handle)
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        let mut state = self.state();
        if state.shaders.remove(&shader).is_some() {
            state.calls.push(DeviceCall::DeleteShader(shader));
        }
    }

    fn link_program(&self, stages: &[ShaderHandle]) -> Result<ProgramHandle, String> {
        let mut state = self.state();

        let mut sources = Vec::with_capacity(stages.len());
        let mut present = HashSet::new();
        for handle in stages {
            let (stage, source) = state
                .shaders
                .get(handle)
                .ok_or_else(|| format!("ERROR: shader {} is not a compiled stage", handle.0))?;
            present.insert(*stage);
            sources.push(source.clone());
        }

        for required in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !present.contains(&required) {
                return Err(format!("ERROR: program has no {required} stage attached"));
            }
        }

        let uniforms = introspect(&sources);
        let handle = ProgramHandle(state.next());
        state.programs.insert(handle, uniforms);
        Ok(handle)
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state();
        if state.programs.remove(&program).is_some() {
            if state.current_program == Some(program) {
                state.current_program = None;
            }
            state.calls.push(DeviceCall::DeleteProgram(program));
        }
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform> {
        self.state().programs.get(&program).cloned().unwrap_or_default()
    }

    fn use_program(&self, program: ProgramHandle) {
        let mut state = self.state();
        state.current_program = Some(program);
        state.calls.push(DeviceCall::UseProgram(program));
    }

    fn set_uniform(&self, program: ProgramHandle, location: i32, first_index: u32, values: &[UniformValue]) {
        self.state().calls.push(DeviceCall::SetUniform {
            program,
            location,
            first_index,
            values: values.to_vec(),
        });
    }

    fn create_vertex_array(&self) -> VertexArrayHandle {
        let mut state = self.state();
        let handle = VertexArrayHandle(state.next());
        state.vertex_arrays.insert(handle);
        handle
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle) {
        self.state().vertex_arrays.remove(&vertex_array);
    }

    fn upload_vertex_buffer_f32(
        &self,
        vertex_array: VertexArrayHandle,
        attribute: VertexAttribute,
        components: u32,
        data: &[f32],
    ) -> BufferHandle {
        let mut state = self.state();
        let handle = BufferHandle(state.next());
        state.buffers.insert(handle);
        state.calls.push(DeviceCall::UploadVertexBuffer {
            vertex_array,
            attribute,
            components,
            len: data.len(),
        });
        handle
    }

    fn upload_vertex_buffer_u32(
        &self,
        vertex_array: VertexArrayHandle,
        attribute: VertexAttribute,
        components: u32,
        data: &[u32],
    ) -> BufferHandle {
        let mut state = self.state();
        let handle = BufferHandle(state.next());
        state.buffers.insert(handle);
        state.calls.push(DeviceCall::UploadVertexBuffer {
            vertex_array,
            attribute,
            components,
            len: data.len(),
        });
        handle
    }

    fn upload_index_buffer(&self, vertex_array: VertexArrayHandle, indices: &[u32]) -> BufferHandle {
        let mut state = self.state();
        let handle = BufferHandle(state.next());
        state.buffers.insert(handle);
        state.calls.push(DeviceCall::UploadIndexBuffer {
            vertex_array,
            count: indices.len(),
        });
        handle
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state();
        if state.buffers.remove(&buffer) {
            state.calls.push(DeviceCall::DeleteBuffer(buffer));
        }
    }

    fn create_texture(&self, image: &ImageData, params: &TextureParams) -> RenderResult<TextureHandle> {
        let expected = u64::from(image.width) * u64::from(image.height) * 4;
        if image.width == 0 || image.height == 0 || image.data.len() as u64 != expected {
            return Err(RenderError::Device(format!(
                "texture data of {} bytes does not match {}x{} RGBA8",
                image.data.len(),
                image.width,
                image.height
            )));
        }

        let mut state = self.state();
        let handle = TextureHandle(state.next());
        state.textures.insert(handle);
        state.calls.push(DeviceCall::CreateTexture {
            texture: handle,
            width: image.width,
            height: image.height,
            params: params.clone(),
        });
        Ok(handle)
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        self.state().calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn delete_texture(&self, texture: TextureHandle) {
        let mut state = self.state();
        if state.textures.remove(&texture) {
            state.calls.push(DeviceCall::DeleteTexture(texture));
        }
    }

    fn draw_arrays(&self, vertex_array: VertexArrayHandle, vertex_count: u32) {
        self.state().calls.push(DeviceCall::DrawArrays {
            vertex_array,
            vertex_count,
        });
    }

    fn draw_elements(&self, vertex_array: VertexArrayHandle, index_count: u32) {
        self.state().calls.push(DeviceCall::DrawElements {
            vertex_array,
            index_count,
        });
    }
}

// ----------------------------------------------------------------------------
// Uniform introspection
// ----------------------------------------------------------------------------

/// One `type name[len]` declaration
#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    type_name: String,
    name: String,
    array_len: Option<u32>,
}

fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Parse `type name`, `type name[N]` or `type name [N]`, ignoring qualifiers
fn parse_declaration(tokens: &[&str]) -> Option<Declaration> {
    let tokens: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !PRECISION_QUALIFIERS.contains(t))
        .collect();
    let (type_name, rest) = tokens.split_first()?;
    let joined: String = rest.concat();

    let (name, array_len) = match joined.find('[') {
        Some(open) => {
            let len = joined[open + 1..].trim_end_matches(']').parse().ok()?;
            (joined[..open].to_string(), Some(len))
        }
        None => (joined, None),
    };

    if name.is_empty() {
        return None;
    }
    Some(Declaration {
        type_name: (*type_name).to_string(),
        name,
        array_len,
    })
}

/// Cut `struct Name { ... };` blocks out of the source
fn extract_structs(source: &str) -> (HashMap<String, Vec<Declaration>>, String) {
    let mut structs = HashMap::new();
    let mut remaining = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = find_keyword(rest, "struct") {
        remaining.push_str(&rest[..start]);
        let after = &rest[start + "struct".len()..];
        let (Some(open), Some(close)) = (after.find('{'), after.find('}')) else {
            rest = after;
            continue;
        };
        if close < open {
            rest = after;
            continue;
        }

        let name = after[..open].trim().to_string();
        let fields = after[open + 1..close]
            .split(';')
            .filter_map(|field| {
                let tokens: Vec<&str> = field.split_whitespace().collect();
                parse_declaration(&tokens)
            })
            .collect();
        structs.insert(name, fields);

        rest = after[close + 1..].trim_start_matches(|c: char| c.is_whitespace() || c == ';');
    }
    remaining.push_str(rest);
    (structs, remaining)
}

fn find_keyword(haystack: &str, keyword: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = haystack[offset..].find(keyword) {
        let start = offset + found;
        let end = start + keyword.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let after_ok = haystack[end..].chars().next().map_or(false, char::is_whitespace);
        if before_ok && after_ok {
            return Some(start);
        }
        offset = end;
    }
    None
}

fn introspect(sources: &[String]) -> Vec<ActiveUniform> {
    let mut uniforms: Vec<ActiveUniform> = Vec::new();
    let mut push = |name: String, uniform_type: UniformType, size: u32| {
        if uniforms.iter().any(|u| u.name == name) {
            return;
        }
        let location = i32::try_from(uniforms.len()).unwrap_or(i32::MAX);
        uniforms.push(ActiveUniform {
            name,
            uniform_type,
            size,
            location,
        });
    };

    for source in sources {
        let (structs, remaining) = extract_structs(&strip_comments(source));

        for statement in remaining.split(';') {
            let tokens: Vec<&str> = statement.split_whitespace().collect();
            let Some(position) = tokens.iter().position(|t| *t == "uniform") else {
                continue;
            };
            let Some(declaration) = parse_declaration(&tokens[position + 1..]) else {
                continue;
            };

            if let Some(fields) = structs.get(&declaration.type_name) {
                let elements: Vec<String> = match declaration.array_len {
                    Some(len) => (0..len).map(|i| format!("{}[{i}]", declaration.name)).collect(),
                    None => vec![declaration.name.clone()],
                };
                for element in &elements {
                    for field in fields {
                        let Some(ty) = UniformType::from_glsl(&field.type_name) else {
                            continue;
                        };
                        match field.array_len {
                            Some(len) => push(format!("{element}.{}[0]", field.name), ty, len),
                            None => push(format!("{element}.{}", field.name), ty, 1),
                        }
                    }
                }
            } else if let Some(ty) = UniformType::from_glsl(&declaration.type_name) {
                match declaration.array_len {
                    Some(len) => push(format!("{}[0]", declaration.name), ty, len),
                    None => push(declaration.name, ty, 1),
                }
            } else {
                log::debug!("Headless device ignores uniform of type '{}'", declaration.type_name);
            }
        }
    }

    uniforms
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "
        #version 330 core
        layout(location = 0) in vec3 aPos;
        uniform mat4 projViewModel; // combined
        uniform mat4 boneMatrices[4];
        void main() { gl_Position = projViewModel * vec4(aPos, 1.0); }
    ";

    const FRAGMENT: &str = "
        #version 330 core
        struct PointLight {
            vec3 position;
            vec3 diffuse;
            float constant;
        };
        uniform PointLight pointLights[2];
        uniform int numPointLights;
        uniform highp vec3 viewPos;
        uniform sampler2D diffuseTex;
        // uniform float commentedOut;
        out vec4 color;
        void main() { color = vec4(1.0); }
    ";

    fn linked(device: &HeadlessDevice) -> ProgramHandle {
        let vs = device.compile_shader(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = device.compile_shader(ShaderStage::Fragment, FRAGMENT).unwrap();
        device.link_program(&[vs, fs]).unwrap()
    }

    #[test]
    fn test_introspection_expands_struct_arrays() {
        let device = HeadlessDevice::new();
        let program = linked(&device);
        let names: Vec<String> = device.active_uniforms(program).into_iter().map(|u| u.name).collect();

        assert_eq!(
            names,
            vec![
                "projViewModel",
                "boneMatrices[0]",
                "pointLights[0].position",
                "pointLights[0].diffuse",
                "pointLights[0].constant",
                "pointLights[1].position",
                "pointLights[1].diffuse",
                "pointLights[1].constant",
                "numPointLights",
                "viewPos",
                "diffuseTex",
            ]
        );

        let uniforms = device.active_uniforms(program);
        let bones = uniforms.iter().find(|u| u.name == "boneMatrices[0]").unwrap();
        assert_eq!(bones.size, 4);
        assert_eq!(bones.uniform_type, UniformType::Mat4);
    }

    #[test]
    fn test_compile_requires_main() {
        let device = HeadlessDevice::new();
        let result = device.compile_shader(ShaderStage::Fragment, "// void main\nout vec4 c;");
        assert!(result.is_err());
    }

    #[test]
    fn test_link_requires_vertex_and_fragment() {
        let device = HeadlessDevice::new();
        let vs = device.compile_shader(ShaderStage::Vertex, VERTEX).unwrap();
        assert!(device.link_program(&[vs]).is_err());
        assert_eq!(device.live_program_count(), 0);
    }

    #[test]
    fn test_uniform_value_lookup_by_element_name() {
        let device = HeadlessDevice::new();
        let program = linked(&device);
        let bones = device
            .active_uniforms(program)
            .into_iter()
            .find(|u| u.name == "boneMatrices[0]")
            .unwrap();

        device.set_uniform(program, bones.location, 2, &[UniformValue::Float(7.0)]);
        assert_eq!(device.uniform_value(program, "boneMatrices[2]"), Some(UniformValue::Float(7.0)));
        assert_eq!(device.uniform_value(program, "boneMatrices[1]"), None);
    }
}
