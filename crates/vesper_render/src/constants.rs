//! Per-Frame Constant Buffers
//!
//! Each buffer kind is a fixed-layout `#[repr(C)]` record that the
//! orchestrator fills once per frame and uploads with
//! [`ConstantBuffer::commit`]. Passes only ever read them.
//!
//! All records are built from `Mat4`/`Vec4` and groups of four scalars so
//! the layout has no implicit padding and matches WGSL uniform rules.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::device::RenderDevice;

/// Camera and screen-space data shared by most passes. Bound as
/// `"GlobalViewportBuffer"`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportConstants {
    /// Unjittered view-projection of the previous frame.
    pub prev_view_projection: Mat4,
    /// View-space X/Y axes scaled by the inverse projection scale, in world space.
    pub eye_x_axis: Vec4,
    pub eye_y_axis: Vec4,
    pub eye_z_axis: Vec4,
    pub eye_position: Vec4,
    pub world_bounds_min: Vec4,
    pub world_bounds_max: Vec4,
    pub world_bounds_inv_range: Vec4,
    pub z_near: f32,
    pub z_far: f32,
    /// 1.0 when the `ResolvedColor` temporal phase is 0.
    pub frame_jitter: f32,
    pub temporal_aa: f32,
    /// `(w, h, 1/w, 1/h)`.
    pub screen_size: Vec4,
    /// `(w/2, h/2, 2/w, 2/h)`.
    pub screen_size_half_res: Vec4,
    /// Coefficients that turn a pixel coordinate and linear depth into a
    /// view-space position.
    pub reproject_info: Vec4,
    /// [`reproject_info`](Self::reproject_info) for integer pixel coordinates
    /// (sampling at texel centres).
    pub reproject_info_from_int: Vec4,
}

impl ViewportConstants {
    /// Screen size and its reciprocals.
    #[must_use]
    pub fn screen_size_for(width: u32, height: u32) -> (Vec4, Vec4) {
        let (w, h) = (width as f32, height as f32);
        (
            Vec4::new(w, h, 1.0 / w, 1.0 / h),
            Vec4::new(w / 2.0, h / 2.0, 2.0 / w, 2.0 / h),
        )
    }

    /// Reprojection coefficients for `projection` at `width`×`height`.
    ///
    /// Returns `(reproject_info, reproject_info_from_int)`.
    #[must_use]
    pub fn reproject_info_for(projection: &Mat4, width: u32, height: u32) -> (Vec4, Vec4) {
        let m11 = projection.x_axis.x;
        let m22 = projection.y_axis.y;
        let m13 = projection.x_axis.z;
        let m23 = projection.y_axis.z;
        let info = Vec4::new(
            -2.0 / (width as f32 * m11),
            -2.0 / (height as f32 * m22),
            (1.0 - m13) / m11,
            (1.0 + m23) / m22,
        );
        let from_int = info + Vec4::new(0.0, 0.0, info.x * 0.5, info.y * 0.5);
        (info, from_int)
    }

    /// World-space eye axes derived from the view and projection matrices.
    #[must_use]
    pub fn eye_axes_for(view: &Mat4, projection: &Mat4) -> [Vec4; 3] {
        let view_to_world = view.inverse();
        [
            view_to_world * Vec4::new(1.0 / projection.x_axis.x, 0.0, 0.0, 0.0),
            view_to_world * Vec4::new(0.0, 1.0 / projection.y_axis.y, 0.0, 0.0),
            view_to_world * Vec4::new(0.0, 0.0, 1.0, 0.0),
        ]
    }

    /// Scene bounds as `(min, max, inverse range)`.
    #[must_use]
    pub fn world_bounds_for(min: Vec3, max: Vec3) -> (Vec4, Vec4, Vec4) {
        (
            min.extend(0.0),
            max.extend(0.0),
            (Vec3::ONE / (max - min)).extend(0.0),
        )
    }
}

/// Matrices of the viewport camera for the current frame. Bound as
/// `"CurrentViewport"`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CurrentViewportConstants {
    pub projection: Mat4,
    pub view: Mat4,
    /// Includes the temporal jitter translation.
    pub view_projection: Mat4,
    /// Inverse of the unjittered view-projection.
    pub inverse_view_projection: Mat4,
}

/// Lighting inputs of the forward pass. Bound as `"ForwardPassBuffer"`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ForwardPassConstants {
    pub shadow_view_projection: Mat4,
    pub shadow_inverse_view_projection: Mat4,
    /// Points towards the light; `w` is 1.
    pub light_direction: Vec4,
    pub light_color: Vec4,
    pub point_light_position: Vec4,
    pub point_light_color: Vec4,
}

impl ForwardPassConstants {
    pub const LIGHT_COLOR: Vec4 = Vec4::new(1.0, 0.95, 0.9, 0.0);
    pub const POINT_LIGHT_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 0.0);

    /// Position of the animated point light at `time` seconds.
    #[must_use]
    pub fn point_light_position_at(time: f32) -> Vec4 {
        Vec4::new((0.05 * time).sin() * 10.0, 2.0, (0.15 * time).cos() * 5.8, 0.0)
    }
}

/// Post-effect chain parameters. Bound as `"PostEffects"`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PostEffectsConstants {
    /// Depth-of-field circle-of-confusion scale; DOF is skipped unless positive.
    pub dof_coc_scale: f32,
    pub debug_bokeh: f32,
    pub _padding: [f32; 2],
}

// ─── Named Buffer ─────────────────────────────────────────────────────────────

/// A typed constant record bound under a fixed name.
#[derive(Clone, Debug)]
pub struct ConstantBuffer<T: Pod> {
    name: &'static str,
    pub data: T,
}

impl<T: Pod> ConstantBuffer<T> {
    #[must_use]
    pub fn new(name: &'static str, data: T) -> Self {
        Self { name, data }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Uploads and binds the current contents.
    pub fn commit(&self, gpu: &mut dyn RenderDevice) {
        gpu.upload_constants(self.name, bytemuck::bytes_of(&self.data));
    }
}

/// The four buffers the orchestrator maintains.
#[derive(Clone, Debug)]
pub struct FrameConstants {
    pub viewport: ConstantBuffer<ViewportConstants>,
    pub current_viewport: ConstantBuffer<CurrentViewportConstants>,
    pub forward: ConstantBuffer<ForwardPassConstants>,
    pub post_effects: ConstantBuffer<PostEffectsConstants>,
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self {
            viewport: ConstantBuffer::new("GlobalViewportBuffer", ViewportConstants::default()),
            current_viewport: ConstantBuffer::new(
                "CurrentViewport",
                CurrentViewportConstants::default(),
            ),
            forward: ConstantBuffer::new("ForwardPassBuffer", ForwardPassConstants::default()),
            post_effects: ConstantBuffer::new("PostEffects", PostEffectsConstants::default()),
        }
    }
}

impl FrameConstants {
    /// Commits every buffer, in the order passes expect them bound.
    pub fn commit_all(&self, gpu: &mut dyn RenderDevice) {
        self.viewport.commit(gpu);
        self.forward.commit(gpu);
        self.current_viewport.commit(gpu);
        self.post_effects.commit(gpu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;

    #[test]
    fn test_layout_sizes_are_vec4_multiples() {
        assert_eq!(std::mem::size_of::<ViewportConstants>(), 64 + 16 * 12);
        assert_eq!(std::mem::size_of::<CurrentViewportConstants>(), 256);
        assert_eq!(std::mem::size_of::<ForwardPassConstants>(), 128 + 64);
        assert_eq!(std::mem::size_of::<PostEffectsConstants>(), 16);
    }

    #[test]
    fn test_commit_uploads_under_name() {
        let mut gpu = HeadlessDevice::new();
        let mut constants = FrameConstants::default();
        constants.post_effects.data.dof_coc_scale = 2.0;
        constants.commit_all(&mut gpu);

        let bytes = gpu.constants("PostEffects").unwrap();
        let post: PostEffectsConstants = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(post.dof_coc_scale, 2.0);
        assert!(gpu.constants("GlobalViewportBuffer").is_some());
        assert!(gpu.constants("CurrentViewport").is_some());
        assert!(gpu.constants("ForwardPassBuffer").is_some());
    }

    #[test]
    fn test_reproject_info_from_int_offsets_half_texel() {
        let proj = Mat4::perspective_rh(1.0, 2.0, 0.1, 100.0);
        let (info, from_int) = ViewportConstants::reproject_info_for(&proj, 200, 100);
        assert!((info.x - (-2.0 / (200.0 * proj.x_axis.x))).abs() < 1e-6);
        assert_eq!(from_int.x, info.x);
        assert!((from_int.z - (info.z + info.x * 0.5)).abs() < 1e-6);
        assert!((from_int.w - (info.w + info.y * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_screen_size_reciprocals() {
        let (full, half) = ViewportConstants::screen_size_for(1920, 1080);
        assert_eq!(full, Vec4::new(1920.0, 1080.0, 1.0 / 1920.0, 1.0 / 1080.0));
        assert_eq!(half, Vec4::new(960.0, 540.0, 2.0 / 1920.0, 2.0 / 1080.0));
    }
}
