//! Drawable models and their skins

use std::sync::Arc;

use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::primitive::Primitive;

use super::skeleton::Skeleton;
use super::{SceneError, SceneResult};

/// Animated skeleton driving a skinned primitive
///
/// Each skin owns its skeleton, so copies of a model animate independently.
#[derive(Debug, Clone)]
pub struct Skin {
    skeleton: Skeleton,
    animation: Option<usize>,
    time_ticks: f32,
    matrices: Vec<Mat4>,
}

impl Skin {
    /// Skin resting in its bind pose
    pub fn new(mut skeleton: Skeleton) -> Self {
        let matrices = skeleton.bind_pose_matrices();
        Self {
            skeleton,
            animation: None,
            time_ticks: 0.0,
            matrices,
        }
    }

    /// Play a clip from its start
    pub fn set_animation(&mut self, index: usize) -> SceneResult<()> {
        let count = self.skeleton.animations().len();
        if index >= count {
            return Err(SceneError::AnimationIndexOutOfRange { index, count });
        }
        self.animation = Some(index);
        self.time_ticks = 0.0;
        self.matrices = self.skeleton.calc_bone_matrices(index, 0.0)?;
        Ok(())
    }

    /// Play a clip by name
    pub fn set_animation_by_name(&mut self, name: &str) -> SceneResult<()> {
        let index = self
            .skeleton
            .animation_index(name)
            .ok_or_else(|| SceneError::AnimationNotFound(name.to_owned()))?;
        self.set_animation(index)
    }

    /// Stop animating and return to the bind pose
    pub fn stop(&mut self) {
        self.animation = None;
        self.time_ticks = 0.0;
        self.matrices = self.skeleton.bind_pose_matrices();
    }

    /// Advance the clip clock by `delta_time` seconds and re-pose
    pub fn advance(&mut self, delta_time: f32) {
        let Some(index) = self.animation else {
            return;
        };
        let Some(animation) = self.skeleton.animation_at(index) else {
            log::warn!("Skin lost its animation {}", index);
            self.animation = None;
            return;
        };

        self.time_ticks = animation.wrap_ticks(self.time_ticks + animation.seconds_to_ticks(delta_time));
        match self.skeleton.calc_bone_matrices(index, self.time_ticks) {
            Ok(matrices) => self.matrices = matrices,
            Err(e) => log::warn!("Failed to pose skeleton: {}", e),
        }
    }

    /// Skinning matrices of the current pose
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    /// Skeleton
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Mutable skeleton, e.g. to add clips
    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    /// Playing clip
    pub fn animation(&self) -> Option<usize> {
        self.animation
    }

    /// Position in the playing clip
    pub fn time_ticks(&self) -> f32 {
        self.time_ticks
    }
}

/// Geometry drawn with a material
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Geometry
    pub primitive: Option<Arc<Primitive>>,
    /// Material used to draw it
    pub material: Option<Arc<dyn Material>>,
    /// Skinning state
    pub skin: Option<Skin>,
}

impl Model {
    /// Model from geometry and material
    pub fn new(primitive: Arc<Primitive>, material: Arc<dyn Material>) -> Self {
        Self {
            primitive: Some(primitive),
            material: Some(material),
            skin: None,
        }
    }

    /// Attach a skin
    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self
    }

    /// Draw with the given world matrix
    pub fn draw(&self, world: &Mat4, proj_view: &Mat4) {
        let Some(material) = &self.material else {
            log::warn!("Model has no material and is not drawn");
            return;
        };
        if !material.use_material() {
            return;
        }

        if let Some(uniforms) = material.transform_uniforms() {
            uniforms.apply(world, proj_view);
            if let Some(skin) = &self.skin {
                uniforms.set_bone_matrices(skin.matrices());
            }
        }
        if let Some(primitive) = &self.primitive {
            primitive.render();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{BoneDescriptor, SkeletonDescriptor};
    use crate::core::config::AssetConfig;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::device::GraphicsDevice;
    use crate::render::geometry;
    use crate::render::headless::{DeviceCall, HeadlessDevice};
    use crate::render::material::PhongMaterial;
    use crate::render::primitive::{PrimitiveFactory, PrimitiveManager};
    use crate::render::program::{ProgramData, ProgramFactory, ProgramManager};
    use crate::render::shader::{ShaderFactory, ShaderManager};
    use crate::render::test_shaders::{PHONG_FRAGMENT, PHONG_VERTEX};
    use crate::render::uniform::UniformValue;
    use crate::scene::animation::{Animation, AnimationBoneData};
    use approx::assert_relative_eq;

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton::from_descriptor(&SkeletonDescriptor {
            bones: vec![BoneDescriptor::new("root", None, Mat4::identity(), Mat4::identity())],
            inverse_global_transform: Mat4::identity(),
        })
        .unwrap();
        skeleton.add_animation(Animation::new("slide", 10.0, 10.0).with_track(
            "root",
            AnimationBoneData::new()
                .with_translation(0.0, Vec3::zeros())
                .with_translation(10.0, Vec3::new(10.0, 0.0, 0.0)),
        ));
        skeleton
    }

    #[test]
    fn test_skin_advances_in_seconds_and_loops() {
        let mut skin = Skin::new(skeleton());
        skin.advance(1.0);
        assert_eq!(skin.time_ticks(), 0.0);

        skin.set_animation_by_name("slide").unwrap();
        skin.advance(0.25);
        assert_relative_eq!(skin.time_ticks(), 2.5, epsilon = 1e-5);
        assert_relative_eq!(skin.matrices()[0].m14, 2.5, epsilon = 1e-5);

        skin.advance(1.0);
        assert_relative_eq!(skin.time_ticks(), 2.5, epsilon = 1e-4);

        assert!(skin.set_animation(3).is_err());
        skin.stop();
        assert_relative_eq!(skin.matrices()[0], Mat4::identity());
    }

    #[test]
    fn test_cloned_skins_animate_independently() {
        let mut first = Skin::new(skeleton());
        first.set_animation(0).unwrap();
        let second = first.clone();

        first.advance(0.5);
        assert_relative_eq!(first.matrices()[0].m14, 5.0, epsilon = 1e-5);
        assert_relative_eq!(second.matrices()[0].m14, 0.0);
    }

    #[test]
    fn test_draw_uploads_matrices_then_renders() {
        let device = Arc::new(HeadlessDevice::new());
        let shared: Arc<dyn GraphicsDevice> = Arc::clone(&device) as Arc<dyn GraphicsDevice>;
        let shaders = Arc::new(ShaderManager::new(ShaderFactory::new(Arc::clone(&shared), AssetConfig::default())));
        let programs = ProgramManager::new(ProgramFactory::new(Arc::clone(&shared), shaders));
        let primitives = PrimitiveManager::new(PrimitiveFactory::new(shared));
        let program = programs
            .insert(&"phong".to_string(), &ProgramData::inline("phong", PHONG_VERTEX, PHONG_FRAGMENT))
            .unwrap();

        let mut skin = Skin::new(skeleton());
        skin.set_animation(0).unwrap();
        skin.advance(0.5);
        let model = Model::new(
            geometry::cuboid_primitive(&primitives, 1.0, 1.0, 1.0).unwrap(),
            Arc::new(PhongMaterial::new(Arc::clone(&program))),
        )
        .with_skin(skin);

        let world = Transform::from_position(Vec3::new(0.0, 2.0, 0.0)).to_matrix();
        model.draw(&world, &Mat4::identity());

        assert_eq!(device.uniform_value(program.handle(), "model"), Some(UniformValue::Mat4(world)));
        let Some(UniformValue::Mat4(bone)) = device.uniform_value(program.handle(), "boneMatrices[0]") else {
            panic!("bone matrices were not written");
        };
        assert_relative_eq!(bone.m14, 5.0, epsilon = 1e-5);
        assert!(matches!(device.calls().last(), Some(DeviceCall::DrawElements { .. })));
    }

    #[test]
    fn test_model_without_material_draws_nothing() {
        let model = Model::default();
        model.draw(&Mat4::identity(), &Mat4::identity());
        assert!(model.skin.is_none());
    }
}
