#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # Vesper
//!
//! Resource pooling and frame orchestration for a real-time 3D viewer.
//!
//! This umbrella crate re-exports the workspace members:
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `vesper_core` | errors, settings, camera, frame timing |
//! | `vesper_render` | surface pool, temporal slots, debug router, passes, orchestrator |
//!
//! ```rust,ignore
//! use vesper::prelude::*;
//!
//! let mut gpu = HeadlessDevice::new();
//! let scene = StaticScene::default();
//! let settings = RendererSettings::with_resolution(1280, 720);
//! let mut frames = FrameOrchestrator::new(&mut gpu, settings, PassSet::reference(), &scene)?;
//! ```

pub use vesper_core::{camera, errors, settings, time};
pub use vesper_render::{
    constants, debug, device, frame, headless, jitter, passes, pool, shadow, surface, temporal,
};

#[cfg(feature = "gpu")]
pub use vesper_render::gpu;

pub use vesper_core::{
    Camera, CameraSettings, ErrorKind, FrameTime, Projection, RenderError, RendererSettings, Result,
    Timer,
};
pub use vesper_render::{
    CopyMode, DebugMode, DebugSurfaceRouter, FrameOrchestrator, HeadlessDevice, Pass, PassContext,
    PassSet, PoolStats, RenderDevice, SceneProvider, SurfaceDescriptor, SurfacePool, SurfaceSet,
    SurfaceSetId, TemporalSurfaceManager,
};

#[cfg(feature = "gpu")]
pub use vesper_render::WgpuDevice;

/// Everything needed to set up and drive frames.
pub mod prelude {
    pub use crate::{
        Camera, CopyMode, DebugMode, FrameOrchestrator, FrameTime, HeadlessDevice, Pass,
        PassContext, PassSet, RenderDevice, RenderError, RendererSettings, Result, SceneProvider,
        SurfaceDescriptor, SurfacePool, SurfaceSet, TemporalSurfaceManager, Timer,
    };
    pub use crate::passes::reference::StaticScene;
    pub use glam::{Mat4, Vec3, Vec4};
}
