//! Frame-level scene driver

use crate::foundation::collections::{InsertionSet, NodeId};
use crate::foundation::math::{Mat4, Mat4Ext, Point3, Vec3};
use crate::render::lighting::{Light, DIR_LIGHT_COUNT_UNIFORM, POINT_LIGHT_COUNT_UNIFORM};
use crate::render::program::{Program, ProgramManager};

use super::camera::Camera;
use super::node::{Node, NodeKind};
use super::scene_graph::SceneGraph;
use super::{SceneError, SceneResult};

/// Node tree plus the active camera and the registered lights
///
/// Per frame, call [`update`](Self::update), then
/// [`prep_shader_programs`](Self::prep_shader_programs), then
/// [`draw`](Self::draw).
#[derive(Debug, Default)]
pub struct Scene {
    graph: SceneGraph,
    roots: Vec<NodeId>,
    active_camera: Option<NodeId>,
    lights: InsertionSet<NodeId>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Node tree
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Mutable node tree
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Top-level nodes that are updated and drawn each frame
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Insert a node as a new root
    pub fn add_root(&mut self, node: Node) -> NodeId {
        let id = self.graph.create_node(node);
        self.roots.push(id);
        id
    }

    /// Insert a node under `parent`, or as a root when `parent` is `None`
    pub fn add_node(&mut self, parent: Option<NodeId>, node: Node) -> SceneResult<NodeId> {
        let Some(parent) = parent else {
            return Ok(self.add_root(node));
        };
        if !self.graph.contains(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let id = self.graph.create_node(node);
        self.graph.add_child(parent, id)?;
        Ok(id)
    }

    /// Promote an existing node to a root, detaching it from its parent
    pub fn insert_root(&mut self, id: NodeId) -> SceneResult<()> {
        self.graph.set_parent(id, None)?;
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
        Ok(())
    }

    /// Remove a subtree together with any camera or light it contained
    pub fn destroy(&mut self, id: NodeId) -> SceneResult<()> {
        self.graph.destroy(id)?;

        let graph = &self.graph;
        self.roots.retain(|&root| graph.contains(root));
        self.lights.retain(|&light| graph.contains(light));
        if self.active_camera.is_some_and(|camera| !graph.contains(camera)) {
            log::info!("Active camera was destroyed");
            self.active_camera = None;
        }
        Ok(())
    }

    /// Insert a camera node and make it the active camera
    pub fn add_camera(&mut self, parent: Option<NodeId>, camera: Camera) -> SceneResult<NodeId> {
        let id = self.add_node(parent, Node::new(NodeKind::Camera(camera)))?;
        self.active_camera = Some(id);
        Ok(id)
    }

    /// Render through the camera carried by `id`
    pub fn set_active_camera(&mut self, id: NodeId) -> SceneResult<()> {
        let node = self.graph.get(id).ok_or(SceneError::NodeNotFound(id))?;
        if node.as_camera().is_none() {
            return Err(SceneError::NotACamera(id));
        }
        self.active_camera = Some(id);
        Ok(())
    }

    /// Node of the active camera
    pub fn active_camera(&self) -> Option<NodeId> {
        self.active_camera
    }

    /// Active camera
    pub fn camera(&self) -> Option<&Camera> {
        self.active_camera
            .and_then(|id| self.graph.get(id))
            .and_then(Node::as_camera)
    }

    /// Mutable active camera
    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        let id = self.active_camera?;
        self.graph.get_mut(id).and_then(Node::as_camera_mut)
    }

    /// Insert a light node and register it
    pub fn add_light(&mut self, parent: Option<NodeId>, light: Light) -> SceneResult<NodeId> {
        let id = self.add_node(parent, Node::new(NodeKind::Light(light)))?;
        self.lights.insert(id);
        Ok(id)
    }

    /// Register an existing light node; returns `false` if it already was
    pub fn register_light(&mut self, id: NodeId) -> SceneResult<bool> {
        let node = self.graph.get(id).ok_or(SceneError::NodeNotFound(id))?;
        if node.as_light().is_none() {
            return Err(SceneError::NotALight(id));
        }
        Ok(self.lights.insert(id))
    }

    /// Stop lighting with a node; the node stays in the tree
    pub fn remove_light(&mut self, id: NodeId) -> bool {
        self.lights.remove(&id)
    }

    /// Registered light nodes in registration order
    pub fn lights(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.lights.iter().copied()
    }

    /// Advance the scene by `delta_time` seconds
    ///
    /// Every root subtree is updated. The camera and the lights are updated
    /// too when they hang off a tree that is not a root.
    pub fn update(&mut self, delta_time: f32) {
        let attached = self.active_camera.into_iter().chain(self.lights.iter().copied());
        let tops = self.tree_tops(self.roots.iter().copied().chain(attached));

        for top in tops {
            self.graph.update(top, delta_time);
        }
    }

    /// Effective view matrix: the camera's own view after its node's transform
    pub fn view_matrix(&self) -> Mat4 {
        let Some((camera, node)) = self.camera_node() else {
            return Mat4::identity();
        };
        let node_inverse = node.world_matrix().try_inverse().unwrap_or_else(Mat4::identity);
        camera.view_matrix() * node_inverse
    }

    /// Projection matrix of the active camera
    pub fn projection_matrix(&self) -> Mat4 {
        self.camera().map_or_else(Mat4::identity, |camera| *camera.projection_matrix())
    }

    /// Eye position in world space
    pub fn eye_position(&self) -> Vec3 {
        self.camera_node().map_or_else(Vec3::zeros, |(camera, node)| {
            node.world_matrix()
                .transform_point(&Point3::from(camera.position()))
                .coords
        })
    }

    /// Push camera and light uniforms into every linked program
    ///
    /// Lights are numbered per array in registration order, so the slot of a
    /// light only changes when lights registered before it are removed.
    pub fn prep_shader_programs(&self, programs: &ProgramManager) {
        let programs: Vec<_> = programs.values().into_iter().filter(|p| p.is_linked()).collect();
        let eye = self.eye_position();

        if let Some(camera) = self.camera() {
            for program in &programs {
                camera.set_program_uniforms(program, eye);
            }
        }

        let mut directional = 0;
        let mut point = 0;
        for id in &self.lights {
            let Some(node) = self.graph.get(*id) else {
                continue;
            };
            let Some(light) = node.as_light() else {
                continue;
            };
            let slot = match light {
                Light::Directional(_) => &mut directional,
                Light::Point(_) => &mut point,
            };
            let position = node.world_matrix().translation_part();
            for program in &programs {
                light.set_program_uniform(program, *slot, position);
            }
            *slot += 1;
        }

        for program in &programs {
            set_count(program, DIR_LIGHT_COUNT_UNIFORM, directional);
            set_count(program, POINT_LIGHT_COUNT_UNIFORM, point);
        }
    }

    /// Draw every root with the active camera
    pub fn draw(&self) {
        let proj_view = self.projection_matrix() * self.view_matrix();
        for top in self.tree_tops(self.roots.iter().copied()) {
            self.graph.draw(top, &proj_view);
        }
    }

    /// Topmost ancestors of `ids`, each once, in first-seen order
    ///
    /// A root that was later attached below another node resolves to the top
    /// of its new tree, so no subtree is walked twice in one frame.
    fn tree_tops(&self, ids: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
        let mut tops = Vec::new();
        for id in ids {
            if let Some(top) = self.graph.root_of(id) {
                if !tops.contains(&top) {
                    tops.push(top);
                }
            }
        }
        tops
    }

    fn camera_node(&self) -> Option<(&Camera, &Node)> {
        let node = self.graph.get(self.active_camera?)?;
        Some((node.as_camera()?, node))
    }
}

fn set_count(program: &Program, name: &str, count: usize) {
    if let Some(uniform) = program.uniform(name) {
        uniform.set(i32::try_from(count).unwrap_or(i32::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AssetConfig;
    use crate::render::device::GraphicsDevice;
    use crate::render::geometry;
    use crate::render::headless::HeadlessDevice;
    use crate::render::lighting::{DirLight, PointLight};
    use crate::render::material::{Material, PhongMaterial};
    use crate::render::primitive::{PrimitiveFactory, PrimitiveManager};
    use crate::render::program::{ProgramData, ProgramFactory};
    use crate::render::shader::{ShaderFactory, ShaderManager};
    use crate::render::test_shaders::{BASIC_FRAGMENT, BASIC_VERTEX, PHONG_FRAGMENT, PHONG_VERTEX};
    use crate::render::uniform::UniformValue;
    use crate::scene::model::Model;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    struct Fixture {
        device: Arc<HeadlessDevice>,
        programs: ProgramManager,
        primitives: PrimitiveManager,
        phong: Arc<Program>,
    }

    fn fixture() -> Fixture {
        let device = Arc::new(HeadlessDevice::new());
        let shared: Arc<dyn GraphicsDevice> = Arc::clone(&device) as Arc<dyn GraphicsDevice>;
        let shaders = Arc::new(ShaderManager::new(ShaderFactory::new(Arc::clone(&shared), AssetConfig::default())));
        let programs = ProgramManager::new(ProgramFactory::new(Arc::clone(&shared), shaders));
        let primitives = PrimitiveManager::new(PrimitiveFactory::new(shared));
        let phong = programs
            .insert(&"phong".to_string(), &ProgramData::inline("phong", PHONG_VERTEX, PHONG_FRAGMENT))
            .unwrap();
        Fixture {
            device,
            programs,
            primitives,
            phong,
        }
    }

    fn point_at(scene: &mut Scene, x: f32) -> NodeId {
        let id = scene.add_light(None, PointLight::default().into()).unwrap();
        scene.graph_mut().get_mut(id).unwrap().set_position(Vec3::new(x, 0.0, 0.0));
        id
    }

    #[test]
    fn test_lights_get_slots_in_registration_order() {
        let f = fixture();
        let mut scene = Scene::new();
        point_at(&mut scene, 1.0);
        scene.add_light(None, DirLight::default().into()).unwrap();
        let second = point_at(&mut scene, 2.0);
        point_at(&mut scene, 3.0);

        scene.update(0.0);
        scene.prep_shader_programs(&f.programs);

        let handle = f.phong.handle();
        for (slot, x) in [(0, 1.0), (1, 2.0), (2, 3.0)] {
            assert_eq!(
                f.device.uniform_value(handle, &format!("pointLights[{slot}].position")),
                Some(UniformValue::Vec3(Vec3::new(x, 0.0, 0.0)))
            );
        }
        assert_eq!(f.device.uniform_value(handle, "numPointLights"), Some(UniformValue::Int(3)));
        assert_eq!(f.device.uniform_value(handle, "numDirLights"), Some(UniformValue::Int(1)));

        scene.remove_light(second);
        scene.prep_shader_programs(&f.programs);
        assert_eq!(
            f.device.uniform_value(handle, "pointLights[1].position"),
            Some(UniformValue::Vec3(Vec3::new(3.0, 0.0, 0.0)))
        );
        assert_eq!(f.device.uniform_value(handle, "numPointLights"), Some(UniformValue::Int(2)));
    }

    #[test]
    fn test_counts_are_zero_without_lights() {
        let f = fixture();
        let scene = Scene::new();
        scene.prep_shader_programs(&f.programs);
        assert_eq!(f.device.uniform_value(f.phong.handle(), "numPointLights"), Some(UniformValue::Int(0)));
        assert_eq!(f.device.uniform_value(f.phong.handle(), "viewPos"), None);
    }

    #[test]
    fn test_every_program_receives_lights() {
        let f = fixture();
        let second = f
            .programs
            .insert(&"phong2".to_string(), &ProgramData::inline("phong2", PHONG_VERTEX, PHONG_FRAGMENT))
            .unwrap();
        let basic = f
            .programs
            .insert(&"basic".to_string(), &ProgramData::inline("basic", BASIC_VERTEX, BASIC_FRAGMENT))
            .unwrap();

        let mut scene = Scene::new();
        scene.add_light(None, DirLight::default().into()).unwrap();
        scene.prep_shader_programs(&f.programs);

        for program in [&f.phong, &second] {
            assert!(f.device.uniform_value(program.handle(), "dirLights[0].direction").is_some());
        }
        assert_eq!(f.device.uniform_value(basic.handle(), "numDirLights"), None);
    }

    #[test]
    fn test_camera_node_transform_moves_the_eye() {
        let f = fixture();
        let mut scene = Scene::new();
        let rig = scene.add_root(Node::group());
        scene.graph_mut().get_mut(rig).unwrap().set_position(Vec3::new(10.0, 0.0, 0.0));
        let camera = scene.add_camera(Some(rig), Camera::default()).unwrap();

        scene.update(0.0);
        scene.prep_shader_programs(&f.programs);

        assert_eq!(scene.active_camera(), Some(camera));
        assert_relative_eq!(scene.eye_position(), Vec3::new(10.0, 0.0, 1.0), epsilon = 1e-5);
        assert_eq!(
            f.device.uniform_value(f.phong.handle(), "viewPos"),
            Some(UniformValue::Vec3(scene.eye_position()))
        );

        let eye_in_view = scene.view_matrix().transform_point(&Point3::new(10.0, 0.0, 1.0));
        assert_relative_eq!(eye_in_view, Point3::origin(), epsilon = 1e-5);
    }

    #[test]
    fn test_detached_camera_is_still_updated() {
        let mut scene = Scene::new();
        let holder = scene.graph_mut().create_node(Node::group());
        let camera = scene.graph_mut().create_node(Node::new(NodeKind::Camera(Camera::default())));
        scene.graph_mut().add_child(holder, camera).unwrap();
        scene.set_active_camera(camera).unwrap();

        scene.camera_mut().unwrap().set_position(Vec3::new(0.0, 0.0, 4.0));
        scene.update(0.0);
        assert!(!scene.camera().unwrap().is_view_dirty());
    }

    #[test]
    fn test_draw_walks_models_with_combined_matrix() {
        let f = fixture();
        let mut scene = Scene::new();
        scene.add_camera(None, Camera::default()).unwrap();

        let cube = geometry::cuboid_primitive(&f.primitives, 1.0, 1.0, 1.0).unwrap();
        let material: Arc<dyn Material> = Arc::new(PhongMaterial::new(Arc::clone(&f.phong)));
        let group = scene.add_root(Node::group());
        scene.graph_mut().get_mut(group).unwrap().set_position(Vec3::new(0.0, 0.0, -3.0));
        for _ in 0..2 {
            scene
                .add_node(Some(group), Node::new(NodeKind::Model(Model::new(Arc::clone(&cube), Arc::clone(&material)))))
                .unwrap();
        }
        scene.add_node(Some(group), Node::new(NodeKind::Model(Model::default()))).unwrap();

        scene.update(0.0);
        f.device.clear_calls();
        scene.draw();

        assert_eq!(f.device.draw_calls().len(), 2);
        let Some(UniformValue::Mat4(pvm)) = f.device.uniform_value(f.phong.handle(), "projViewModel") else {
            panic!("projViewModel was not written");
        };
        let expected = scene.projection_matrix() * scene.view_matrix() * Mat4::new_translation(&Vec3::new(0.0, 0.0, -3.0));
        assert_relative_eq!(pvm, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_reparented_root_is_walked_once() {
        let f = fixture();
        let mut scene = Scene::new();
        let cube = geometry::cuboid_primitive(&f.primitives, 1.0, 1.0, 1.0).unwrap();
        let material: Arc<dyn Material> = Arc::new(PhongMaterial::new(Arc::clone(&f.phong)));
        let holder = scene.add_root(Node::group());
        let model = scene.add_root(Node::new(NodeKind::Model(Model::new(cube, material))));
        scene.graph_mut().add_child(holder, model).unwrap();

        scene.update(0.0);
        f.device.clear_calls();
        scene.draw();

        assert_eq!(scene.roots().len(), 2);
        assert_eq!(f.device.draw_calls().len(), 1);
    }

    #[test]
    fn test_destroy_forgets_camera_and_lights() {
        let mut scene = Scene::new();
        let root = scene.add_root(Node::group());
        scene.add_camera(Some(root), Camera::default()).unwrap();
        scene.add_light(Some(root), PointLight::default().into()).unwrap();
        let model = scene.add_root(Node::new(NodeKind::Model(Model::default())));

        assert_eq!(scene.set_active_camera(model), Err(SceneError::NotACamera(model)));
        assert_eq!(scene.register_light(model), Err(SceneError::NotALight(model)));

        scene.destroy(root).unwrap();
        assert_eq!(scene.roots(), &[model]);
        assert_eq!(scene.active_camera(), None);
        assert_eq!(scene.lights().count(), 0);
        assert_eq!(scene.view_matrix(), Mat4::identity());
    }
}
