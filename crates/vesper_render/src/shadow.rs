//! Directional shadow light framing.
//!
//! The shadow caster is a fixed directional light looking almost straight
//! down. Its orthographic frustum is fitted to the scene bounds once, on the
//! first frame, and the rendered shadow map is cached for the rest of the run.
//! Moving geometry will therefore cast stale shadows.

use glam::Vec3;
use vesper_core::Camera;

/// Distance the light is pulled back from the top of the scene.
pub const LIGHT_DISTANCE: f32 = 50.0;

/// Fraction of the scene's horizontal extent covered by the ortho frustum.
pub const ORTHO_COVERAGE: f32 = 0.7;

/// Placement and extents of the shadow-casting light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightFrame {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub ortho_width: f32,
    pub ortho_height: f32,
    pub near: f32,
    pub far: f32,
}

impl LightFrame {
    /// Unit direction the light travels in.
    #[must_use]
    pub fn light_forward() -> Vec3 {
        Vec3::new(-0.15, -1.0, 0.15).normalize()
    }

    /// Fits the light to the axis-aligned scene bounds.
    #[must_use]
    pub fn from_bounds(min: Vec3, max: Vec3) -> Self {
        let forward = Self::light_forward();
        let mut top = (min + max) * 0.5;
        top.y = max.y;

        let height = (max.y - min.y).max(0.0);
        Self {
            position: top - forward * LIGHT_DISTANCE,
            forward,
            up: Vec3::Z,
            ortho_width: (max.x - min.x) * ORTHO_COVERAGE,
            ortho_height: (max.z - min.z) * ORTHO_COVERAGE,
            near: 0.1,
            far: LIGHT_DISTANCE * 2.0 + height,
        }
    }

    /// Orthographic camera looking along the light.
    #[must_use]
    pub fn camera(&self) -> Camera {
        let mut cam = Camera::new_orthographic(self.ortho_width, self.ortho_height, self.near, self.far);
        self.apply_to(&mut cam);
        cam
    }

    /// Re-aims an existing camera and refreshes its matrices.
    pub fn apply_to(&self, camera: &mut Camera) {
        camera.position = self.position;
        camera.forward = self.forward;
        camera.up = self.up;
        camera.projection = vesper_core::Projection::Orthographic {
            width: self.ortho_width,
            height: self.ortho_height,
        };
        camera.near = self.near;
        camera.far = self.far;
        camera.calculate_matrices();
    }
}
