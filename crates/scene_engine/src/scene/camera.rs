//! Camera system
//!
//! A camera combines a perspective projection with one of three view modes:
//! looking at a target point, looking along a forward vector, or a free
//! camera that switches between the two. Both matrices are cached and only
//! rebuilt after a parameter actually changed.

use crate::core::config::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::program::Program;

/// Uniform receiving the eye position in world space
pub const VIEW_POSITION_UNIFORM: &str = "viewPos";

const MIN_DIRECTION_LENGTH: f32 = 1e-6;

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveProjection {
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Viewport width divided by height
    pub aspect: f32,
}

impl PerspectiveProjection {
    /// Create a projection; `fov_y` is in radians
    pub fn new(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self { near, far, fov_y, aspect }
    }

    /// Projection described by a camera configuration
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(
            utils::deg_to_rad(config.fov_y_degrees),
            config.aspect_ratio,
            config.near,
            config.far,
        )
    }

    /// Projection matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }
}

impl Default for PerspectiveProjection {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// How the view direction is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    /// Look from the position at a target point
    Target,
    /// Look from the position along a forward vector
    Forward,
    /// Either of the above, switchable at run time
    Free {
        /// Use the target point instead of the forward vector
        use_target: bool,
    },
}

impl CameraMode {
    fn uses_target(self) -> bool {
        match self {
            Self::Target => true,
            Self::Forward => false,
            Self::Free { use_target } => use_target,
        }
    }
}

/// Perspective camera with cached view and projection matrices
///
/// The eye position is relative to the node carrying the camera; the scene
/// combines it with that node's world transform.
#[derive(Debug, Clone)]
pub struct Camera {
    mode: CameraMode,
    position: Vec3,
    target: Vec3,
    up: Vec3,
    forward: Vec3,
    projection: PerspectiveProjection,

    view: Mat4,
    projection_matrix: Mat4,
    view_dirty: bool,
    projection_dirty: bool,
}

impl Camera {
    /// Create a camera at `(0, 0, 1)` looking down `-Z`
    pub fn new(mode: CameraMode, projection: PerspectiveProjection) -> Self {
        let mut camera = Self {
            mode,
            position: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::zeros(),
            up: Vec3::y(),
            forward: -Vec3::z(),
            projection,
            view: Mat4::identity(),
            projection_matrix: Mat4::identity(),
            view_dirty: true,
            projection_dirty: true,
        };
        camera.update();
        camera
    }

    /// Target camera using a configured projection
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::target(PerspectiveProjection::from_config(config))
    }

    /// Camera looking at a target point
    pub fn target(projection: PerspectiveProjection) -> Self {
        Self::new(CameraMode::Target, projection)
    }

    /// Camera looking along a forward vector
    pub fn forward(projection: PerspectiveProjection) -> Self {
        Self::new(CameraMode::Forward, projection)
    }

    /// Switchable camera
    pub fn free(projection: PerspectiveProjection, use_target: bool) -> Self {
        Self::new(CameraMode::Free { use_target }, projection)
    }

    /// View mode
    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Eye position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Look-at target
    pub fn target_point(&self) -> Vec3 {
        self.target
    }

    /// Up vector
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Projection parameters
    pub fn projection(&self) -> &PerspectiveProjection {
        &self.projection
    }

    /// Direction the camera looks in
    ///
    /// In target mode this is derived from the target and the position and
    /// the camera is left untouched.
    pub fn forward_direction(&self) -> Vec3 {
        if self.mode.uses_target() {
            (self.target - self.position)
                .try_normalize(MIN_DIRECTION_LENGTH)
                .unwrap_or(self.forward)
        } else {
            self.forward
        }
    }

    /// Move the eye
    pub fn set_position(&mut self, position: Vec3) {
        if self.position != position {
            self.position = position;
            self.view_dirty = true;
        }
    }

    /// Set the look-at target
    pub fn set_target(&mut self, target: Vec3) {
        if self.target != target {
            self.target = target;
            self.view_dirty = true;
        }
    }

    /// Set the up vector
    pub fn set_up(&mut self, up: Vec3) {
        if self.up != up {
            self.up = up;
            self.view_dirty = true;
        }
    }

    /// Set the forward vector; it is stored normalized
    pub fn set_forward(&mut self, forward: Vec3) {
        let Some(forward) = forward.try_normalize(MIN_DIRECTION_LENGTH) else {
            log::warn!("Ignoring zero-length camera forward vector");
            return;
        };
        if self.forward != forward {
            self.forward = forward;
            self.view_dirty = true;
        }
    }

    /// Switch a free camera between target and forward view
    pub fn use_target(&mut self, use_target: bool) {
        match &mut self.mode {
            CameraMode::Free { use_target: current } => {
                if *current != use_target {
                    *current = use_target;
                    self.view_dirty = true;
                }
            }
            mode => log::warn!("Camera in {:?} mode cannot switch view source", mode),
        }
    }

    /// Replace the projection parameters
    pub fn set_projection(&mut self, projection: PerspectiveProjection) {
        if self.projection != projection {
            self.projection = projection;
            self.projection_dirty = true;
        }
    }

    /// Set the vertical field of view in radians
    pub fn set_fov_y(&mut self, fov_y: f32) {
        self.set_projection(PerspectiveProjection { fov_y, ..self.projection });
    }

    /// Set the aspect ratio, e.g. after a window resize
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.set_projection(PerspectiveProjection { aspect, ..self.projection });
    }

    /// Set the clipping planes
    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.set_projection(PerspectiveProjection { near, far, ..self.projection });
    }

    /// Cached view matrix
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// Cached projection matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Whether the cached view matrix is stale
    pub fn is_view_dirty(&self) -> bool {
        self.view_dirty
    }

    /// Whether the cached projection matrix is stale
    pub fn is_projection_dirty(&self) -> bool {
        self.projection_dirty
    }

    /// Rebuild whichever cached matrices are stale
    pub fn update(&mut self) {
        if self.view_dirty {
            self.force_compute_view_matrix();
        }
        if self.projection_dirty {
            self.force_compute_projection_matrix();
        }
    }

    /// Rebuild the view matrix unconditionally
    pub fn force_compute_view_matrix(&mut self) -> Mat4 {
        let look_at = if self.mode.uses_target() {
            self.target
        } else {
            self.position + self.forward
        };
        self.view = Mat4::look_at(self.position, look_at, self.up);
        self.view_dirty = false;
        self.view
    }

    /// Rebuild the projection matrix unconditionally
    pub fn force_compute_projection_matrix(&mut self) -> Mat4 {
        self.projection_matrix = self.projection.matrix();
        self.projection_dirty = false;
        self.projection_matrix
    }

    /// Write the eye position into `program`
    pub fn set_program_uniforms(&self, program: &Program, eye_world: Vec3) {
        if let Some(uniform) = program.uniform(VIEW_POSITION_UNIFORM) {
            uniform.set(eye_world);
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::target(PerspectiveProjection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_projection_uses_radians() {
        let projection = PerspectiveProjection::default();
        assert_relative_eq!(projection.fov_y, std::f32::consts::FRAC_PI_4, epsilon = 1e-6);
        assert_relative_eq!(projection.near, 0.1);
    }

    #[test]
    fn test_view_is_cached_until_update() {
        let mut camera = Camera::default();
        let before = *camera.view_matrix();

        camera.set_position(Vec3::new(0.0, 0.0, 5.0));
        assert!(camera.is_view_dirty());
        assert_eq!(*camera.view_matrix(), before);

        camera.update();
        assert!(!camera.is_view_dirty());
        let eye_in_view = camera.view_matrix().transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(eye_in_view, Point3::origin(), epsilon = 1e-5);
    }

    #[test]
    fn test_unchanged_setters_keep_cache_clean() {
        let mut camera = Camera::default();
        camera.set_position(camera.position());
        camera.set_target(Vec3::zeros());
        camera.set_aspect_ratio(camera.projection().aspect);
        assert!(!camera.is_view_dirty());
        assert!(!camera.is_projection_dirty());

        camera.set_aspect_ratio(1.0);
        assert!(camera.is_projection_dirty());
    }

    #[test]
    fn test_forward_direction_per_mode() {
        let mut target = Camera::target(PerspectiveProjection::default());
        target.set_position(Vec3::new(0.0, 0.0, 4.0));
        target.set_target(Vec3::new(4.0, 0.0, 4.0));
        assert_relative_eq!(target.forward_direction(), Vec3::x(), epsilon = 1e-6);
        assert!(target.is_view_dirty());

        let mut forward = Camera::forward(PerspectiveProjection::default());
        forward.set_forward(Vec3::new(0.0, 3.0, 0.0));
        assert_relative_eq!(forward.forward_direction(), Vec3::y(), epsilon = 1e-6);

        forward.update();
        forward.set_forward(Vec3::zeros());
        assert!(!forward.is_view_dirty());
    }

    #[test]
    fn test_free_camera_switches_source() {
        let mut camera = Camera::free(PerspectiveProjection::default(), false);
        camera.set_target(Vec3::new(1.0, 0.0, 1.0));
        camera.update();
        assert_relative_eq!(camera.forward_direction(), -Vec3::z(), epsilon = 1e-6);

        camera.use_target(true);
        assert!(camera.is_view_dirty());
        assert_relative_eq!(camera.forward_direction(), Vec3::x(), epsilon = 1e-6);
    }
}
