//! Render Device Seam
//!
//! Everything the frame pipeline needs from the GPU goes through the
//! object-safe [`RenderDevice`] trait. Two implementations ship with the
//! crate:
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | [`HeadlessDevice`](crate::headless::HeadlessDevice) | `headless` | CPU reference, tests, demo |
//! | `WgpuDevice` | `gpu` (feature `gpu`) | Real GPU through wgpu |
//!
//! # Ordering
//!
//! Commands are recorded in call order onto a single stream. Nothing is
//! guaranteed to have executed until [`RenderDevice::wait_idle`] returns,
//! which is the only CPU/GPU synchronisation point in the pipeline.

use vesper_core::errors::Result;

use crate::surface::{SurfaceDescriptor, SurfaceSet};

/// How [`RenderDevice::copy`] maps source texels to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CopyMode {
    /// Value passthrough.
    #[default]
    Raw,
    /// Broadcast the fourth channel into all channels.
    Alpha,
    /// Keep only the fractional part of each channel.
    Frac,
}

impl CopyMode {
    /// Applies the mode to one RGBA texel.
    #[inline]
    #[must_use]
    pub fn apply(self, texel: [f32; 4]) -> [f32; 4] {
        match self {
            Self::Raw => texel,
            Self::Alpha => [texel[3]; 4],
            Self::Frac => texel.map(|v| v - v.floor()),
        }
    }
}

/// Handle to a fixed-capacity append buffer written by shaders.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DiagnosticLogId(pub(crate) u32);

impl DiagnosticLogId {
    /// For [`RenderDevice`] implementations.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// GPU command stream used by the pool, the router and every pass.
pub trait RenderDevice {
    /// Allocates a new set matching `descriptor`.
    ///
    /// The descriptor has already been validated by
    /// [`allocate_surface_set`](crate::surface::allocate_surface_set).
    fn create_surface_set(&mut self, descriptor: &SurfaceDescriptor, label: &str)
    -> Result<SurfaceSet>;

    /// Clears every colour target of `target`, and its depth buffer when
    /// `clear_depth` is set.
    fn clear(&mut self, target: &SurfaceSet, color: [f32; 4], clear_depth: bool);

    /// Copies the first colour target of `src` into the first colour target
    /// of `dst`, transforming texels per `mode`.
    fn copy(&mut self, mode: CopyMode, dst: &SurfaceSet, src: &SurfaceSet);

    /// Uploads and binds a constant buffer under `name`.
    fn upload_constants(&mut self, name: &'static str, bytes: &[u8]);

    /// Creates an append buffer of `capacity` entries of `stride` bytes.
    fn create_diagnostic_log(&mut self, capacity: u32, stride: u32) -> Result<DiagnosticLogId>;

    /// Makes `log` the append target for subsequent shader work.
    fn bind_diagnostic_log(&mut self, log: DiagnosticLogId);

    /// Appends one entry to the bound log from the host.
    ///
    /// Shares slot allocation with shader appends. Returns `false` when no
    /// log is bound or the entry fell past capacity; the counter still
    /// advances in the latter case.
    fn append_diagnostic(&mut self, entry: &[u8]) -> bool;

    /// Number of appends shaders performed since the last reset.
    ///
    /// May exceed the capacity; writes past it were dropped.
    fn diagnostic_append_count(&mut self, log: DiagnosticLogId) -> Result<u32>;

    /// Reads the first `count` entries of `log` as raw bytes.
    fn read_diagnostic_log(&mut self, log: DiagnosticLogId, count: u32) -> Result<Vec<u8>>;

    /// Zeroes the append counter of `log`.
    fn reset_diagnostic_log(&mut self, log: DiagnosticLogId);

    /// Blocks until all recorded work has retired on the GPU.
    fn wait_idle(&mut self) -> Result<()>;

    /// Opens a named profiling scope.
    fn begin_scope(&mut self, name: &str);

    /// Closes the innermost profiling scope.
    fn end_scope(&mut self);

    /// Flushes recorded work to the GPU queue.
    fn submit(&mut self) -> Result<()>;
}
