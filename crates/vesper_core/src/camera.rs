use glam::{Mat4, Vec3};

use crate::settings::CameraSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians.
    Perspective { fov: f32, aspect: f32 },
    /// Full width and height of the view volume.
    Orthographic { width: f32, height: f32 },
}

/// Viewer or light camera.
///
/// Matrices use glam's right-handed, `[0, 1]` depth conventions and are only
/// refreshed by [`calculate_matrices`](Self::calculate_matrices).
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    /// Pending movement in camera-local axes (x right, y up, z forward),
    /// consumed by [`tick`](Self::tick).
    pub move_input: Vec3,

    // 缓存的矩阵
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(
            Projection::Perspective {
                fov: fov_degrees.to_radians(),
                aspect,
            },
            near,
            far,
        )
    }

    #[must_use]
    pub fn new_orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Orthographic { width, height }, near, far)
    }

    /// Builds the viewport camera described by the settings.
    #[must_use]
    pub fn from_settings(settings: &CameraSettings, aspect: f32) -> Self {
        let mut cam = Self::new_perspective(settings.fov_degrees, aspect, settings.near, settings.far);
        cam.position = Vec3::from(settings.position);
        cam.forward = Vec3::from(settings.forward).normalize_or(Vec3::Z);
        cam.move_speed = settings.move_speed;
        cam.calculate_matrices();
        cam
    }

    fn with_projection(projection: Projection, near: f32, far: f32) -> Self {
        let mut cam = Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
            up: Vec3::Y,
            projection,
            near,
            far,
            move_speed: 1.0,
            move_input: Vec3::ZERO,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
        };
        cam.calculate_matrices();
        cam
    }

    /// Advances the camera by `dt` seconds of pending movement input.
    pub fn tick(&mut self, dt: f32) {
        if self.move_input == Vec3::ZERO || dt <= 0.0 {
            return;
        }
        let forward = self.forward.normalize_or(Vec3::Z);
        let right = forward.cross(self.up).normalize_or(Vec3::X);
        let up = right.cross(forward);
        let local = self.move_input;
        self.position += (right * local.x + up * local.y + forward * local.z) * self.move_speed * dt;
    }

    /// Recomputes view, projection and view-projection matrices.
    pub fn calculate_matrices(&mut self) {
        let forward = self.forward.normalize_or(Vec3::Z);
        self.view_matrix = Mat4::look_to_rh(self.position, forward, self.up);
        self.projection_matrix = match self.projection {
            Projection::Perspective { fov, aspect } => {
                Mat4::perspective_rh(fov, aspect, self.near, self.far)
            }
            Projection::Orthographic { width, height } => {
                let (w, h) = (width * 0.5, height * 0.5);
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }
}
