//! Reference passes built only on device primitives.
//!
//! They stand in for the real shading passes in the demo and in tests: every
//! pass is deterministic, so the final image is a predictable function of the
//! scene colour.

use glam::Vec3;
use vesper_core::errors::{RenderError, Result};

use super::{Pass, PassContext, PassSet, SceneProvider};
use crate::debug::DiagnosticLogEntry;
use crate::device::{CopyMode, RenderDevice};
use crate::surface::SurfaceSet;

/// Copies the first source into the destination.
pub struct CopyPass {
    name: &'static str,
    mode: CopyMode,
}

impl CopyPass {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            mode: CopyMode::Raw,
        }
    }

    #[must_use]
    pub fn with_mode(name: &'static str, mode: CopyMode) -> Self {
        Self { name, mode }
    }
}

impl Pass for CopyPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(
        &mut self,
        ctx: &mut PassContext<'_>,
        destination: &SurfaceSet,
        sources: &[&SurfaceSet],
    ) -> Result<()> {
        let source = sources
            .first()
            .ok_or_else(|| RenderError::pass(self.name, "no source surface"))?;
        ctx.gpu.copy(self.mode, destination, source);
        Ok(())
    }
}

/// Fills the destination with a constant.
pub struct ClearPass {
    name: &'static str,
    color: [f32; 4],
}

impl ClearPass {
    #[must_use]
    pub fn new(name: &'static str, color: [f32; 4]) -> Self {
        Self { name, color }
    }
}

impl Pass for ClearPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, destination: &SurfaceSet, _: &[&SurfaceSet]) -> Result<()> {
        ctx.gpu.clear(destination, self.color, false);
        Ok(())
    }
}

/// Draws the scene into the destination.
pub struct ScenePass {
    name: &'static str,
}

impl ScenePass {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Pass for ScenePass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, destination: &SurfaceSet, _: &[&SurfaceSet]) -> Result<()> {
        ctx.scene.render(ctx.gpu, destination)
    }
}

type PassFn = dyn FnMut(&mut PassContext<'_>, &SurfaceSet, &[&SurfaceSet]) -> Result<()>;

/// A pass backed by a closure.
pub struct FnPass {
    name: &'static str,
    f: Box<PassFn>,
}

impl FnPass {
    pub fn new(
        name: &'static str,
        f: impl FnMut(&mut PassContext<'_>, &SurfaceSet, &[&SurfaceSet]) -> Result<()> + 'static,
    ) -> Self {
        Self { name, f: Box::new(f) }
    }
}

impl Pass for FnPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(
        &mut self,
        ctx: &mut PassContext<'_>,
        destination: &SurfaceSet,
        sources: &[&SurfaceSet],
    ) -> Result<()> {
        (self.f)(ctx, destination, sources)
    }
}

/// Runs an inner pass, then appends one diagnostic entry for a fixed pixel
/// of its destination: the frame index as `z` and the eye position.
///
/// Appends are dropped by the device while no log is bound.
pub struct PixelLogPass {
    inner: Box<dyn Pass>,
    x: u32,
    y: u32,
}

impl PixelLogPass {
    #[must_use]
    pub fn new(inner: Box<dyn Pass>, x: u32, y: u32) -> Self {
        Self { inner, x, y }
    }
}

impl Pass for PixelLogPass {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn execute(
        &mut self,
        ctx: &mut PassContext<'_>,
        destination: &SurfaceSet,
        sources: &[&SurfaceSet],
    ) -> Result<()> {
        self.inner.execute(ctx, destination, sources)?;

        let size = destination.descriptor();
        let eye = ctx.constants.viewport.data.eye_position;
        let entry = DiagnosticLogEntry {
            x: self.x.min(size.width.saturating_sub(1)),
            y: self.y.min(size.height.saturating_sub(1)),
            z: ctx.frame_index as f32,
            component_count: 3,
            values: [eye.x, eye.y, eye.z, 0.0],
        };
        if !ctx.gpu.append_diagnostic(&entry.encode()) {
            log::trace!("Pixel log entry for '{}' dropped", self.inner.name());
        }
        Ok(())
    }
}

impl PassSet {
    /// Deterministic stand-ins for every pass.
    ///
    /// With a [`StaticScene`] the output equals the scene colour stored
    /// in the output's format.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            shadow: Box::new(ScenePass::new("ShadowEVSM")),
            depth_prepass: Box::new(ScenePass::new("DepthNormalPrepass")),
            motion_vectors: Box::new(ClearPass::new("ResolveMotionVectors", [0.0; 4])),
            linearize_depth: Box::new(CopyPass::new("LinearizeDepth")),
            ambient_occlusion: Box::new(ClearPass::new("SSAO", [1.0; 4])),
            volumetric_fog: Box::new(ClearPass::new("VolumetricFog", [0.0, 0.0, 0.0, 1.0])),
            forward: Box::new(ScenePass::new("ForwardShading")),
            sky: Box::new(FnPass::new("Sky", |_, _, _| Ok(()))),
            depth_of_field: Box::new(CopyPass::new("ScatterDOF")),
            luminance: Box::new(CopyPass::new("Luminance")),
            hdr_resolve: Box::new(CopyPass::new("ResolveHDR")),
            temporal_resolve: Box::new(CopyPass::new("ResolveTemporal")),
            anti_aliasing: Box::new(CopyPass::new("FXAA")),
        }
    }

    /// [`reference`](Self::reference) with the final pass logging pixel
    /// `(x, y)` of the output each frame.
    #[must_use]
    pub fn reference_with_pixel_log(x: u32, y: u32) -> Self {
        let mut set = Self::reference();
        set.anti_aliasing = Box::new(PixelLogPass::new(set.anti_aliasing, x, y));
        set
    }
}

// ─── Scene ────────────────────────────────────────────────────────────────────

/// A box of space filled with one colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticScene {
    pub min: Vec3,
    pub max: Vec3,
    pub color: [f32; 4],
}

impl StaticScene {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3, color: [f32; 4]) -> Self {
        Self { min, max, color }
    }
}

impl Default for StaticScene {
    fn default() -> Self {
        Self::new(
            Vec3::new(-20.0, 0.0, -12.0),
            Vec3::new(20.0, 15.0, 12.0),
            [0.25, 0.5, 0.75, 1.0],
        )
    }
}

impl SceneProvider for StaticScene {
    fn bounds(&self) -> (Vec3, Vec3) {
        (self.min, self.max)
    }

    fn render(&self, gpu: &mut dyn RenderDevice, target: &SurfaceSet) -> Result<()> {
        gpu.clear(target, self.color, false);
        Ok(())
    }
}
