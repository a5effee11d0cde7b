//! Typed, write-cached shader uniforms
//!
//! A [`Uniform`] is created for every active uniform a program reports. It
//! remembers its declared type and array length, rejects writes of the wrong
//! type, and only forwards a write to the device when the bytes differ from
//! what was last written to the same array element. Camera and light values
//! pushed into every program every frame mostly hit that cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::render::device::{ActiveUniform, GraphicsDevice, ProgramHandle};

/// Declared type of a uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `uint`
    UInt,
    /// `bool`
    Bool,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
    /// `sampler2D`, written with the texture unit as an `Int`
    Sampler2D,
}

impl UniformType {
    /// Parse a shading-language type name
    pub fn from_glsl(name: &str) -> Option<Self> {
        let ty = match name {
            "float" => Self::Float,
            "int" => Self::Int,
            "uint" => Self::UInt,
            "bool" => Self::Bool,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            _ => return None,
        };
        Some(ty)
    }

    /// Whether a value of type `value` may be written to a uniform of this type
    pub fn accepts(self, value: Self) -> bool {
        self == value || (self == Self::Sampler2D && value == Self::Int)
    }
}

/// A value written to a uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Scalar float
    Float(f32),
    /// Scalar int (also texture units)
    Int(i32),
    /// Scalar unsigned int
    UInt(u32),
    /// Boolean
    Bool(bool),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 3x3 matrix
    Mat3(Mat3),
    /// 4x4 matrix
    Mat4(Mat4),
}

impl UniformValue {
    /// Type of the value
    pub fn uniform_type(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float,
            Self::Int(_) => UniformType::Int,
            Self::UInt(_) => UniformType::UInt,
            Self::Bool(_) => UniformType::Bool,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Mat3(_) => UniformType::Mat3,
            Self::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Append the value's raw bytes (matrices column-major)
    fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Self::Float(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            Self::Int(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            Self::UInt(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            Self::Bool(v) => out.extend_from_slice(bytemuck::bytes_of(&i32::from(*v))),
            Self::Vec2(v) => out.extend_from_slice(bytemuck::cast_slice(v.as_slice())),
            Self::Vec3(v) => out.extend_from_slice(bytemuck::cast_slice(v.as_slice())),
            Self::Vec4(v) => out.extend_from_slice(bytemuck::cast_slice(v.as_slice())),
            Self::Mat3(m) => out.extend_from_slice(bytemuck::cast_slice(m.as_slice())),
            Self::Mat4(m) => out.extend_from_slice(bytemuck::cast_slice(m.as_slice())),
        }
    }

    fn to_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(64);
        self.write_bytes(&mut bytes);
        bytes
    }
}

macro_rules! impl_from_value {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for UniformValue {
                fn from(value: $source) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    f32 => Float,
    i32 => Int,
    u32 => UInt,
    bool => Bool,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
}

/// Handle to one active uniform of a linked program
pub struct Uniform {
    name: String,
    uniform_type: UniformType,
    size: u32,
    location: i32,
    program: ProgramHandle,
    device: Arc<dyn GraphicsDevice>,
    /// Last bytes written per array element
    written: Mutex<HashMap<u32, Vec<u8>>>,
}

impl Uniform {
    /// Wrap an introspected uniform
    pub fn new(device: Arc<dyn GraphicsDevice>, program: ProgramHandle, active: &ActiveUniform) -> Self {
        Self {
            name: active.name.clone(),
            uniform_type: active.uniform_type,
            size: active.size.max(1),
            location: active.location,
            program,
            device,
            written: Mutex::new(HashMap::new()),
        }
    }

    /// Name reported by introspection
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn uniform_type(&self) -> UniformType {
        self.uniform_type
    }

    /// Declared array length (1 for scalars)
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Device location
    pub fn location(&self) -> i32 {
        self.location
    }

    /// Write element 0
    ///
    /// # Returns
    /// `true` if the write reached the device
    pub fn set(&self, value: impl Into<UniformValue>) -> bool {
        self.set_array(0, &[value.into()])
    }

    /// Write a single array element
    pub fn set_at(&self, index: u32, value: impl Into<UniformValue>) -> bool {
        self.set_array(index, &[value.into()])
    }

    /// Write consecutive array elements starting at `first_index`
    ///
    /// Mismatched types and out-of-range indices are reported and ignored.
    /// When every element equals what was last written, nothing is sent.
    ///
    /// # Returns
    /// `true` if the write reached the device
    pub fn set_array(&self, first_index: u32, values: &[UniformValue]) -> bool {
        if values.is_empty() {
            return false;
        }

        if let Some(bad) = values.iter().find(|v| !self.uniform_type.accepts(v.uniform_type())) {
            log::warn!(
                "Uniform '{}' is {:?}, refusing to write a {:?}",
                self.name,
                self.uniform_type,
                bad.uniform_type()
            );
            return false;
        }

        let count = u32::try_from(values.len()).unwrap_or(u32::MAX);
        if first_index.checked_add(count).map_or(true, |end| end > self.size) {
            log::warn!(
                "Uniform '{}' has {} elements, write of {} at index {} is out of range",
                self.name,
                self.size,
                values.len(),
                first_index
            );
            return false;
        }

        let encoded: Vec<Vec<u8>> = values.iter().map(|v| v.to_bytes()).collect();
        {
            let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
            let unchanged = (first_index..)
                .zip(&encoded)
                .all(|(index, bytes)| written.get(&index) == Some(bytes));
            if unchanged {
                return false;
            }
            for (index, bytes) in (first_index..).zip(encoded) {
                written.insert(index, bytes);
            }
        }

        self.device.set_uniform(self.program, self.location, first_index, values);
        true
    }

    /// Forget cached values so the next write always reaches the device
    pub fn invalidate(&self) {
        self.written.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl fmt::Debug for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uniform")
            .field("name", &self.name)
            .field("uniform_type", &self.uniform_type)
            .field("size", &self.size)
            .field("location", &self.location)
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}
