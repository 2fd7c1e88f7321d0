//! Frame Orchestrator
//!
//! Sequences one frame of the fixed pass graph:
//!
//! ```text
//!  acquire ─► [shadow once] ─► constants ─► DepthPrepass ─► motion vectors
//!     │                                                         │
//!     │      linearize ─► (debug "LinearDepth") ─► SSAO ◄───────┘
//!     │          │
//!     │          ▼
//!     │      volumetric fog ─► MainForwardRender (forward + sky)
//!     │                                  │
//!     │      PostEffects: [DOF] ─► luminance ─► HDR resolve ─► temporal
//!     │                   resolve ─► (debug "ResolvedNoFXAA") ─► AA ─► present
//!     ▼
//!  release ─► advance temporal slots ─► frame_number += 1 ─► submit
//! ```
//!
//! The pool, the temporal manager and the debug router are plain fields of
//! the orchestrator; nothing here is global.
//!
//! # Lifetimes
//!
//! Surfaces acquired from the pool during a frame are parked in a
//! per-frame holder and returned to the pool after the passes run, whether
//! they succeeded or not. Temporal pairs, the debug display, the cached
//! shadow map and the other persistent surfaces are allocated once in
//! [`FrameOrchestrator::new`] and never touch the pool.

use glam::Vec3;
use vesper_core::errors::{RenderError, Result};
use vesper_core::{Camera, FrameTime, RendererSettings};

use crate::constants::{
    FrameConstants, ForwardPassConstants, PostEffectsConstants, ViewportConstants,
};
use crate::debug::DebugSurfaceRouter;
use crate::device::RenderDevice;
use crate::jitter::{jitter_matrix, jittered_view_projection};
use crate::passes::{PassContext, PassSet, SceneProvider};
use crate::pool::SurfacePool;
use crate::shadow::LightFrame;
use crate::surface::{SurfaceDescriptor, SurfaceSet, allocate_surface_set};
use crate::temporal::TemporalSurfaceManager;

/// Temporal slot holding the HDR-resolved colour.
pub const RESOLVED_COLOR: &str = "ResolvedColor";
/// Temporal slot holding screen-space motion vectors.
pub const MOTION_VECTORS: &str = "MotionVectors";

/// Debug channel for the linearised depth buffer.
pub const DEBUG_LINEAR_DEPTH: &str = "LinearDepth";
/// Debug channel for the temporally resolved image before anti-aliasing.
pub const DEBUG_RESOLVED_NO_AA: &str = "ResolvedNoFXAA";

/// Main-buffer clear value before the depth prepass.
pub const PREPASS_CLEAR_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.5];

pub const SHADOW_MAP_SIZE: u32 = 1024;
pub const GI_VOLUME_SIZE: u32 = 32;
/// Fog scattering is computed at this fraction of the output resolution.
pub const FOG_DOWNSAMPLE: u32 = 8;

/// The descriptors every frame requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptors {
    /// Post-effect ping-pong target.
    pub full_res: SurfaceDescriptor,
    /// Main colour buffer with depth.
    pub full_res_depth: SurfaceDescriptor,
    pub resolved_color: SurfaceDescriptor,
    pub linear_depth: SurfaceDescriptor,
    pub ssao: SurfaceDescriptor,
    pub motion_vectors: SurfaceDescriptor,
}

impl FrameDescriptors {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        use wgpu::TextureFormat as F;
        Self {
            full_res: SurfaceDescriptor::color(F::Rgba16Float, width, height),
            full_res_depth: SurfaceDescriptor::color_depth(F::Rgba16Float, width, height),
            resolved_color: SurfaceDescriptor::color(F::Rgba8Unorm, width, height),
            linear_depth: SurfaceDescriptor::color(F::R32Float, width, height),
            ssao: SurfaceDescriptor::color(F::R8Unorm, width, height),
            motion_vectors: SurfaceDescriptor::color(F::Rg16Float, width, height),
        }
    }
}

/// Surfaces that live for the whole run outside the pool.
struct PersistentSurfaces {
    /// Rendered on the first frame only.
    shadow: SurfaceSet,
    fog_scattering: SurfaceSet,
    gi_volumes: [SurfaceSet; 3],
    /// 1×1 average luminance.
    luminance: SurfaceSet,
}

impl PersistentSurfaces {
    fn allocate(gpu: &mut dyn RenderDevice, width: u32, height: u32) -> Result<Self> {
        use wgpu::TextureFormat as F;

        let shadow = allocate_surface_set(
            gpu,
            &SurfaceDescriptor::color(F::Rgba32Float, SHADOW_MAP_SIZE, SHADOW_MAP_SIZE),
            "Shadow EVSM",
        )?;
        let fog_scattering = allocate_surface_set(
            gpu,
            &SurfaceDescriptor::color(
                F::Rgba16Float,
                (width / FOG_DOWNSAMPLE).max(1),
                (height / FOG_DOWNSAMPLE).max(1),
            ),
            "Fog Scattering",
        )?;
        let gi_desc = SurfaceDescriptor::color(F::Rgba16Float, GI_VOLUME_SIZE, GI_VOLUME_SIZE);
        let gi_volumes = [
            allocate_surface_set(gpu, &gi_desc, "GI Volume R")?,
            allocate_surface_set(gpu, &gi_desc, "GI Volume G")?,
            allocate_surface_set(gpu, &gi_desc, "GI Volume B")?,
        ];
        let luminance = allocate_surface_set(gpu, &SurfaceDescriptor::color(F::R32Float, 1, 1), "Luminance")?;

        Ok(Self {
            shadow,
            fog_scattering,
            gi_volumes,
            luminance,
        })
    }
}

/// Pooled surfaces checked out for the current frame.
#[derive(Default)]
struct FrameBorrows {
    main: Option<SurfaceSet>,
    linear_depth: Option<SurfaceSet>,
    ssao: Option<SurfaceSet>,
    pong: Option<SurfaceSet>,
    resolved_temporal: Option<SurfaceSet>,
}

impl FrameBorrows {
    /// Returns everything that was acquired, most recent first.
    fn release_into(self, pool: &mut SurfacePool) {
        let sets = [
            self.resolved_temporal,
            self.pong,
            self.ssao,
            self.linear_depth,
            self.main,
        ];
        for set in sets.into_iter().flatten() {
            pool.release(set);
        }
    }
}

/// Owns the per-run rendering state and renders frames.
pub struct FrameOrchestrator {
    settings: RendererSettings,
    descriptors: FrameDescriptors,
    pool: SurfacePool,
    temporal: TemporalSurfaceManager,
    debug: DebugSurfaceRouter,
    passes: PassSet,
    constants: FrameConstants,
    viewport_camera: Camera,
    shadow_camera: Camera,
    persistent: PersistentSurfaces,
    shadows_initialized: bool,
    frame_number: u64,
}

impl FrameOrchestrator {
    /// Validates the configuration and allocates everything that outlives a
    /// frame.
    ///
    /// `scene` bounds must have positive extent on every axis; the world
    /// bounds constants store their inverse.
    pub fn new(
        gpu: &mut dyn RenderDevice,
        settings: RendererSettings,
        passes: PassSet,
        scene: &dyn SceneProvider,
    ) -> Result<Self> {
        settings.validate()?;
        let (min, max) = scene.bounds();
        if !(max - min).cmpgt(Vec3::ZERO).all() {
            return Err(RenderError::InvalidDescriptor(format!(
                "degenerate scene bounds {min} .. {max}"
            )));
        }

        let (width, height) = (settings.width, settings.height);
        let descriptors = FrameDescriptors::new(width, height);
        let pool = settings
            .max_pooled_sets
            .map_or_else(SurfacePool::new, SurfacePool::with_max_sets);

        let mut temporal = TemporalSurfaceManager::new();
        temporal.initialize(gpu, RESOLVED_COLOR, &descriptors.resolved_color)?;
        temporal.initialize(gpu, MOTION_VECTORS, &descriptors.motion_vectors)?;

        let mut debug = DebugSurfaceRouter::new(gpu, width, height, settings.diagnostic_log_capacity)?;
        debug.set_gpu_debug(settings.gpu_debug);

        let persistent = PersistentSurfaces::allocate(gpu, width, height)?;
        let viewport_camera = Camera::from_settings(&settings.camera, settings.aspect_ratio());

        log::info!("Frame orchestrator ready: {width}x{height}, scene bounds {min} .. {max}");

        Ok(Self {
            settings,
            descriptors,
            pool,
            temporal,
            debug,
            passes,
            constants: FrameConstants::default(),
            viewport_camera,
            shadow_camera: Camera::new_orthographic(1.0, 1.0, 0.1, 100.0),
            persistent,
            shadows_initialized: false,
            frame_number: 0,
        })
    }

    /// Renders one frame into `target`.
    ///
    /// On error the frame is abandoned: pooled surfaces are still returned,
    /// but the temporal slots and the frame counter do not advance.
    pub fn render_frame(
        &mut self,
        gpu: &mut dyn RenderDevice,
        scene: &dyn SceneProvider,
        time: FrameTime,
        target: &SurfaceSet,
    ) -> Result<()> {
        let mut borrows = FrameBorrows::default();
        let result = self.run_frame(gpu, scene, time, target, &mut borrows);
        borrows.release_into(&mut self.pool);

        if let Err(err) = result {
            log::warn!("Frame {} aborted: {err}", self.frame_number);
            return Err(err);
        }

        self.temporal.advance_all();
        self.frame_number += 1;
        gpu.submit()
    }

    fn run_frame(
        &mut self,
        gpu: &mut dyn RenderDevice,
        scene: &dyn SceneProvider,
        time: FrameTime,
        target: &SurfaceSet,
        frame: &mut FrameBorrows,
    ) -> Result<()> {
        let main: &SurfaceSet = frame
            .main
            .insert(self.pool.acquire(gpu, &self.descriptors.full_res_depth)?);
        let linear_depth: &SurfaceSet = frame
            .linear_depth
            .insert(self.pool.acquire(gpu, &self.descriptors.linear_depth)?);
        let ssao: &SurfaceSet = frame
            .ssao
            .insert(self.pool.acquire(gpu, &self.descriptors.ssao)?);

        if self.debug.claim_first_call() {
            gpu.bind_diagnostic_log(self.debug.diagnostic_log());
        }

        if !self.shadows_initialized {
            let (min, max) = scene.bounds();
            LightFrame::from_bounds(min, max).apply_to(&mut self.shadow_camera);
        }

        self.update_constants(scene, time)?;
        self.constants.commit_all(gpu);

        let Self {
            passes,
            pool,
            temporal,
            debug,
            constants,
            persistent,
            descriptors,
            shadows_initialized,
            frame_number,
            ..
        } = self;
        let mut ctx = PassContext {
            gpu,
            scene,
            constants,
            frame_index: *frame_number,
        };

        if !*shadows_initialized {
            log::info!("Rendering shadow map; it is reused for every later frame");
            ctx.run(passes.shadow.as_mut(), &persistent.shadow, &[])?;
            *shadows_initialized = true;
        }

        ctx.scoped("DepthPrepass", |ctx| {
            ctx.gpu.clear(main, PREPASS_CLEAR_COLOR, true);
            ctx.run(passes.depth_prepass.as_mut(), main, &[])
        })?;

        let mv_current = temporal.current(MOTION_VECTORS)?;
        let mv_history = temporal.history(MOTION_VECTORS)?;
        ctx.run(passes.motion_vectors.as_mut(), mv_current, &[main])?;

        ctx.run(passes.linearize_depth.as_mut(), linear_depth, &[main])?;
        debug.register(ctx.gpu, DEBUG_LINEAR_DEPTH, linear_depth);
        ctx.run(passes.ambient_occlusion.as_mut(), ssao, &[linear_depth, mv_current])?;

        let [gi_r, gi_g, gi_b] = &persistent.gi_volumes;
        ctx.run(
            passes.volumetric_fog.as_mut(),
            &persistent.fog_scattering,
            &[&persistent.shadow, gi_r, gi_g, gi_b],
        )?;

        ctx.scoped("MainForwardRender", |ctx| {
            ctx.run(
                passes.forward.as_mut(),
                main,
                &[&persistent.shadow, ssao, gi_r, gi_g, gi_b, &persistent.fog_scattering],
            )?;
            ctx.run(passes.sky.as_mut(), main, &[])
        })?;

        let dof_enabled = ctx.constants.post_effects.data.dof_coc_scale > 0.0;
        ctx.scoped("PostEffects", |ctx| {
            let pong: &SurfaceSet = frame.pong.insert(pool.acquire(ctx.gpu, &descriptors.full_res)?);

            let source = if dof_enabled {
                ctx.run(passes.depth_of_field.as_mut(), pong, &[main, main])?;
                pong
            } else {
                main
            };

            ctx.run(passes.luminance.as_mut(), &persistent.luminance, &[source])?;

            let resolved_current = temporal.current(RESOLVED_COLOR)?;
            let resolved_history = temporal.history(RESOLVED_COLOR)?;
            ctx.run(
                passes.hdr_resolve.as_mut(),
                resolved_current,
                &[source, &persistent.luminance],
            )?;

            let resolved_temporal: &SurfaceSet = frame
                .resolved_temporal
                .insert(pool.acquire(ctx.gpu, &descriptors.resolved_color)?);
            ctx.run(
                passes.temporal_resolve.as_mut(),
                resolved_temporal,
                &[resolved_current, resolved_history, mv_current, mv_history],
            )?;
            debug.register(ctx.gpu, DEBUG_RESOLVED_NO_AA, resolved_temporal);

            ctx.run(passes.anti_aliasing.as_mut(), target, &[resolved_temporal])
        })?;

        debug.present(ctx.gpu, target);
        Ok(())
    }

    /// Fills every constant buffer for the coming frame.
    fn update_constants(&mut self, scene: &dyn SceneProvider, time: FrameTime) -> Result<()> {
        let prev_view_projection = self.viewport_camera.view_projection_matrix();
        self.viewport_camera.tick(time.delta);
        self.viewport_camera.calculate_matrices();
        self.shadow_camera.calculate_matrices();

        let (width, height) = (self.settings.width, self.settings.height);
        let jitter = jitter_matrix(self.frame_number, width, height, self.settings.temporal_aa);

        let cam = &self.viewport_camera;
        let (view, projection) = (cam.view_matrix(), cam.projection_matrix());
        let view_projection = cam.view_projection_matrix();

        let current = &mut self.constants.current_viewport.data;
        current.projection = projection;
        current.view = view;
        current.inverse_view_projection = view_projection.inverse();
        current.view_projection = jittered_view_projection(view_projection, jitter);

        let (min, max) = scene.bounds();
        let [eye_x_axis, eye_y_axis, eye_z_axis] = ViewportConstants::eye_axes_for(&view, &projection);
        let (world_bounds_min, world_bounds_max, world_bounds_inv_range) =
            ViewportConstants::world_bounds_for(min, max);
        let (screen_size, screen_size_half_res) = ViewportConstants::screen_size_for(width, height);
        let (reproject_info, reproject_info_from_int) =
            ViewportConstants::reproject_info_for(&projection, width, height);
        let frame_jitter = if self.temporal.phase(RESOLVED_COLOR)? == 0 { 1.0 } else { 0.0 };

        self.constants.viewport.data = ViewportConstants {
            prev_view_projection,
            eye_x_axis,
            eye_y_axis,
            eye_z_axis,
            eye_position: cam.position.extend(1.0),
            world_bounds_min,
            world_bounds_max,
            world_bounds_inv_range,
            z_near: cam.near,
            z_far: cam.far,
            frame_jitter,
            temporal_aa: if self.settings.temporal_aa { 1.0 } else { 0.0 },
            screen_size,
            screen_size_half_res,
            reproject_info,
            reproject_info_from_int,
        };

        let shadow_view_projection = self.shadow_camera.view_projection_matrix();
        self.constants.forward.data = ForwardPassConstants {
            shadow_view_projection,
            shadow_inverse_view_projection: shadow_view_projection.inverse(),
            light_direction: (-self.shadow_camera.forward).extend(1.0),
            light_color: ForwardPassConstants::LIGHT_COLOR,
            point_light_position: ForwardPassConstants::point_light_position_at(time.elapsed),
            point_light_color: ForwardPassConstants::POINT_LIGHT_COLOR,
        };

        self.constants.post_effects.data = PostEffectsConstants {
            dof_coc_scale: self.settings.dof_coc_scale,
            debug_bokeh: if self.settings.debug_bokeh { 1.0 } else { 0.0 },
            _padding: [0.0; 2],
        };
        Ok(())
    }

    /// Reads and formats this frame's GPU diagnostic log.
    ///
    /// Blocks on the GPU. Call once per frame, after
    /// [`render_frame`](Self::render_frame).
    pub fn drain_diagnostics(&mut self, gpu: &mut dyn RenderDevice) -> Result<String> {
        self.debug.drain(gpu)
    }

    // ── Runtime toggles ────────────────────────────────────────────────────

    pub fn set_temporal_aa(&mut self, enabled: bool) {
        self.settings.temporal_aa = enabled;
    }

    /// Depth of field runs only while the scale is positive.
    pub fn set_dof_coc_scale(&mut self, scale: f32) {
        self.settings.dof_coc_scale = scale;
    }

    pub fn set_debug_bokeh(&mut self, enabled: bool) {
        self.settings.debug_bokeh = enabled;
    }

    pub fn set_gpu_debug(&mut self, enabled: bool) {
        self.settings.gpu_debug = enabled;
        self.debug.set_gpu_debug(enabled);
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[must_use]
    pub fn descriptors(&self) -> &FrameDescriptors {
        &self.descriptors
    }

    #[must_use]
    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    #[must_use]
    pub fn temporal(&self) -> &TemporalSurfaceManager {
        &self.temporal
    }

    #[must_use]
    pub fn debug(&self) -> &DebugSurfaceRouter {
        &self.debug
    }

    /// Debug selection and UI state; change only between frames.
    pub fn debug_mut(&mut self) -> &mut DebugSurfaceRouter {
        &mut self.debug
    }

    #[must_use]
    pub fn is_debug_overlay_active(&self) -> bool {
        self.debug.selection().is_active()
    }

    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[must_use]
    pub fn constants(&self) -> &FrameConstants {
        &self.constants
    }

    #[must_use]
    pub fn viewport_camera(&self) -> &Camera {
        &self.viewport_camera
    }

    pub fn viewport_camera_mut(&mut self) -> &mut Camera {
        &mut self.viewport_camera
    }

    #[must_use]
    pub fn shadow_camera(&self) -> &Camera {
        &self.shadow_camera
    }

    #[must_use]
    pub fn shadows_initialized(&self) -> bool {
        self.shadows_initialized
    }
}
