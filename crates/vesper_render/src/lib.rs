//! Frame orchestration for the Vesper renderer.
//!
//! Surfaces come from a descriptor-keyed [`SurfacePool`], temporal effects
//! read last frame's output through the [`TemporalSurfaceManager`], and any
//! intermediate surface can be inspected through the [`DebugSurfaceRouter`].
//! [`FrameOrchestrator`] ties them together and runs the fixed pass graph.
//!
//! Everything talks to the GPU through the [`RenderDevice`] trait.
//! [`HeadlessDevice`] is a CPU implementation; `WgpuDevice` (feature `gpu`)
//! runs on real hardware.

pub mod constants;
pub mod debug;
pub mod device;
pub mod frame;
pub mod headless;
pub mod jitter;
pub mod passes;
pub mod pool;
pub mod shadow;
pub mod surface;
pub mod temporal;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use constants::{
    ConstantBuffer, CurrentViewportConstants, ForwardPassConstants, FrameConstants,
    PostEffectsConstants, ViewportConstants,
};
pub use debug::{DebugMode, DebugSelection, DebugSurfaceRouter, DiagnosticLogEntry, NO_DEBUG_CHANNEL};
pub use device::{CopyMode, DiagnosticLogId, RenderDevice};
pub use frame::{FrameDescriptors, FrameOrchestrator};
pub use headless::HeadlessDevice;
pub use passes::{Pass, PassContext, PassSet, SceneProvider};
pub use pool::{PoolStats, SurfacePool};
pub use shadow::LightFrame;
pub use surface::{SurfaceDescriptor, SurfaceSet, SurfaceSetId, TextureId, allocate_surface_set};
pub use temporal::TemporalSurfaceManager;

#[cfg(feature = "gpu")]
pub use gpu::WgpuDevice;
