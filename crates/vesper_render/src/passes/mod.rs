//! Pass Contract
//!
//! A pass is an opaque unit of rendering work: it reads some source surfaces
//! and writes exactly one destination. The orchestrator owns the ordering;
//! passes never see each other.
//!
//! # Design
//! - `execute` must write only to `destination` and never modify `sources`.
//! - Per-frame inputs other than surfaces (matrices, light data, DOF scale)
//!   come from the committed constant buffers in [`PassContext::constants`].
//! - A failing pass aborts the frame. There are no retries.

pub mod reference;

use glam::Vec3;
use vesper_core::errors::Result;

use crate::constants::FrameConstants;
use crate::device::RenderDevice;
use crate::surface::SurfaceSet;

/// Scene geometry as far as the frame pipeline is concerned.
pub trait SceneProvider {
    /// Axis-aligned world bounds as `(min, max)`.
    fn bounds(&self) -> (Vec3, Vec3);

    /// Submits the scene's geometry into `target`.
    fn render(&self, gpu: &mut dyn RenderDevice, target: &SurfaceSet) -> Result<()>;
}

/// Everything a pass may touch besides its surfaces.
pub struct PassContext<'a> {
    pub gpu: &'a mut dyn RenderDevice,
    pub scene: &'a dyn SceneProvider,
    pub constants: &'a FrameConstants,
    pub frame_index: u64,
}

impl PassContext<'_> {
    /// Runs `f` inside a named profiling scope.
    ///
    /// The scope is closed even when `f` fails.
    pub fn scoped<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.gpu.begin_scope(name);
        let result = f(&mut *self);
        self.gpu.end_scope();
        result
    }

    /// Invokes one pass.
    pub fn run(
        &mut self,
        pass: &mut dyn Pass,
        destination: &SurfaceSet,
        sources: &[&SurfaceSet],
    ) -> Result<()> {
        log::trace!(
            "Frame {}: pass '{}' -> {:?}",
            self.frame_index,
            pass.name(),
            destination.id()
        );
        pass.execute(self, destination, sources)
    }
}

/// One rendering pass.
pub trait Pass {
    /// Name used in logs and error reports.
    fn name(&self) -> &'static str;

    fn execute(
        &mut self,
        ctx: &mut PassContext<'_>,
        destination: &SurfaceSet,
        sources: &[&SurfaceSet],
    ) -> Result<()>;
}

/// The fixed set of collaborators the orchestrator sequences.
pub struct PassSet {
    pub shadow: Box<dyn Pass>,
    pub depth_prepass: Box<dyn Pass>,
    pub motion_vectors: Box<dyn Pass>,
    pub linearize_depth: Box<dyn Pass>,
    pub ambient_occlusion: Box<dyn Pass>,
    pub volumetric_fog: Box<dyn Pass>,
    pub forward: Box<dyn Pass>,
    pub sky: Box<dyn Pass>,
    pub depth_of_field: Box<dyn Pass>,
    pub luminance: Box<dyn Pass>,
    pub hdr_resolve: Box<dyn Pass>,
    pub temporal_resolve: Box<dyn Pass>,
    pub anti_aliasing: Box<dyn Pass>,
}

impl PassSet {
    /// Pass names in field order.
    #[must_use]
    pub fn names(&self) -> [&'static str; 13] {
        [
            self.shadow.name(),
            self.depth_prepass.name(),
            self.motion_vectors.name(),
            self.linearize_depth.name(),
            self.ambient_occlusion.name(),
            self.volumetric_fog.name(),
            self.forward.name(),
            self.sky.name(),
            self.depth_of_field.name(),
            self.luminance.name(),
            self.hdr_resolve.name(),
            self.temporal_resolve.name(),
            self.anti_aliasing.name(),
        ]
    }
}
