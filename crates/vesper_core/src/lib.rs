//! Core types shared by the Vesper renderer crates.

pub mod camera;
pub mod errors;
pub mod settings;
pub mod time;

pub use camera::{Camera, Projection};
pub use errors::{ErrorKind, RenderError, Result};
pub use settings::{CameraSettings, RendererSettings};
pub use time::{FrameTime, Timer};
