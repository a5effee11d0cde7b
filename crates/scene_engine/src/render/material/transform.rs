//! Model, projection and normal matrix uniforms shared by drawable materials

use std::sync::Arc;

use crate::foundation::math::{Mat3, Mat4, Mat4Ext};
use crate::render::program::Program;
use crate::render::uniform::{Uniform, UniformValue};

/// Name of the model matrix uniform
pub const MODEL_UNIFORM: &str = "model";
/// Name of the projection × view × model uniform
pub const PROJ_VIEW_MODEL_UNIFORM: &str = "projViewModel";
/// Name of the normal matrix uniform
pub const NORMAL_MATRIX_UNIFORM: &str = "normalMatrix";
/// Name of the skinning matrix array
pub const BONE_MATRICES_UNIFORM: &str = "boneMatrices";

/// Handles to the per-model matrix uniforms of a program
///
/// Missing uniforms are tolerated; a program that never reads the normal
/// matrix simply does not get it.
#[derive(Debug, Clone, Default)]
pub struct TransformUniforms {
    model: Option<Arc<Uniform>>,
    proj_view_model: Option<Arc<Uniform>>,
    normal_matrix: Option<Arc<Uniform>>,
    bone_matrices: Option<Arc<Uniform>>,
}

impl TransformUniforms {
    /// Resolve the uniforms in `program`
    pub fn new(program: &Program) -> Self {
        Self {
            model: program.uniform(MODEL_UNIFORM).cloned(),
            proj_view_model: program.uniform(PROJ_VIEW_MODEL_UNIFORM).cloned(),
            normal_matrix: program.uniform(NORMAL_MATRIX_UNIFORM).cloned(),
            bone_matrices: program.uniform(BONE_MATRICES_UNIFORM).cloned(),
        }
    }

    /// Write the model matrix
    pub fn set_model_matrix(&self, model: &Mat4) {
        if let Some(uniform) = &self.model {
            uniform.set(*model);
        }
    }

    /// Write projection × view × model
    pub fn set_proj_view_model_matrix(&self, proj_view_model: &Mat4) {
        if let Some(uniform) = &self.proj_view_model {
            uniform.set(*proj_view_model);
        }
    }

    /// Write the normal matrix
    pub fn set_normal_matrix(&self, normal: &Mat3) {
        if let Some(uniform) = &self.normal_matrix {
            uniform.set(*normal);
        }
    }

    /// Write all three matrices for one draw
    pub fn apply(&self, model: &Mat4, proj_view: &Mat4) {
        self.set_model_matrix(model);
        self.set_proj_view_model_matrix(&(proj_view * model));
        self.set_normal_matrix(&model.normal_matrix());
    }

    /// Whether the program takes skinning matrices
    pub fn has_bone_matrices(&self) -> bool {
        self.bone_matrices.is_some()
    }

    /// Write skinning matrices, truncated to the declared array length
    pub fn set_bone_matrices(&self, matrices: &[Mat4]) {
        let Some(uniform) = &self.bone_matrices else {
            return;
        };
        let capacity = uniform.size() as usize;
        if matrices.len() > capacity {
            log::warn!(
                "{} bone matrices do not fit into '{}' of length {}",
                matrices.len(),
                uniform.name(),
                capacity
            );
        }
        let values: Vec<UniformValue> = matrices.iter().take(capacity).map(|m| UniformValue::Mat4(*m)).collect();
        uniform.set_array(0, &values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AssetConfig;
    use crate::foundation::math::Vec3;
    use crate::render::device::GraphicsDevice;
    use crate::render::headless::HeadlessDevice;
    use crate::render::program::{ProgramData, ProgramFactory, ProgramManager};
    use crate::render::shader::{ShaderFactory, ShaderManager};
    use crate::render::test_shaders::{BASIC_FRAGMENT, BASIC_VERTEX, PHONG_FRAGMENT, PHONG_VERTEX};
    use approx::assert_relative_eq;

    fn program(vertex: &str, fragment: &str) -> (Arc<HeadlessDevice>, ProgramManager, Arc<Program>) {
        let device = Arc::new(HeadlessDevice::new());
        let shared: Arc<dyn GraphicsDevice> = Arc::clone(&device) as Arc<dyn GraphicsDevice>;
        let shaders = Arc::new(ShaderManager::new(ShaderFactory::new(Arc::clone(&shared), AssetConfig::default())));
        let programs = ProgramManager::new(ProgramFactory::new(shared, shaders));
        let program = programs
            .insert(&"p".to_string(), &ProgramData::inline("p", vertex, fragment))
            .unwrap();
        (device, programs, program)
    }

    #[test]
    fn test_apply_writes_combined_and_normal_matrices() {
        let (device, _programs, program) = program(PHONG_VERTEX, PHONG_FRAGMENT);
        let uniforms = TransformUniforms::new(&program);

        let model = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));
        let proj_view = Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0));
        uniforms.apply(&model, &proj_view);

        let Some(UniformValue::Mat4(pvm)) = device.uniform_value(program.handle(), "projViewModel") else {
            panic!("projViewModel was not written");
        };
        assert_relative_eq!(pvm, proj_view * model, epsilon = 1e-6);

        let Some(UniformValue::Mat3(normal)) = device.uniform_value(program.handle(), "normalMatrix") else {
            panic!("normalMatrix was not written");
        };
        assert_relative_eq!(normal.m11, 0.5, epsilon = 1e-6);
        assert_relative_eq!(normal.m22, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_uniforms_are_skipped() {
        let (device, _programs, program) = program(BASIC_VERTEX, BASIC_FRAGMENT);
        let uniforms = TransformUniforms::new(&program);
        assert!(!uniforms.has_bone_matrices());

        uniforms.apply(&Mat4::identity(), &Mat4::identity());
        uniforms.set_bone_matrices(&[Mat4::identity()]);
        assert_eq!(device.uniform_write_count(), 2);
    }

    #[test]
    fn test_bone_matrices_are_truncated_to_array_length() {
        let (device, _programs, program) = program(PHONG_VERTEX, PHONG_FRAGMENT);
        let uniforms = TransformUniforms::new(&program);

        let bones: Vec<Mat4> = (0..6)
            .map(|i| Mat4::new_translation(&Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        uniforms.set_bone_matrices(&bones);

        assert_eq!(
            device.uniform_value(program.handle(), "boneMatrices[3]"),
            Some(UniformValue::Mat4(bones[3]))
        );
        assert_eq!(device.uniform_write_count(), 1);
    }
}
