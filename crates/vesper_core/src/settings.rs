//! Renderer Settings
//!
//! This module defines the configuration consumed by the frame orchestrator.
//!
//! Settings are plain data with serde support so they can be loaded from a
//! JSON file. Every field has a default, so a partial document is valid:
//!
//! ```rust,ignore
//! use vesper_core::settings::RendererSettings;
//!
//! let settings = RendererSettings::from_json_str(r#"{ "width": 1280, "height": 720 }"#)?;
//! assert!(settings.temporal_aa);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{RenderError, Result};

/// Capacity of the GPU diagnostic log in entries.
pub const DEFAULT_DIAGNOSTIC_LOG_CAPACITY: u32 = 1024;

// ---------------------------------------------------------------------------
// CameraSettings
// ---------------------------------------------------------------------------

/// Initial viewport camera placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// World-space eye position.
    pub position: [f32; 3],
    /// View direction (normalized on use).
    pub forward: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second applied by [`Camera::tick`](crate::camera::Camera::tick).
    pub move_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 2.0, -10.0],
            forward: [0.0, 0.0, 1.0],
            fov_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
            move_speed: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Configuration of the frame pipeline.
///
/// | Field | Effect |
/// |-------|--------|
/// | `width` / `height` | Output resolution; sizes every full-res descriptor |
/// | `temporal_aa` | Enables the sub-pixel jitter on the view-projection |
/// | `dof_coc_scale` | Depth-of-field strength; the DOF pass runs only when `> 0` |
/// | `debug_bokeh` | Forwarded to the post-effects buffer |
/// | `gpu_debug` | Enables reading the GPU diagnostic log |
/// | `diagnostic_log_capacity` | Fixed entry capacity of the diagnostic log |
/// | `max_pooled_sets` | Optional hard cap on pooled surface sets |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub width: u32,
    pub height: u32,
    pub temporal_aa: bool,
    pub dof_coc_scale: f32,
    pub debug_bokeh: bool,
    pub gpu_debug: bool,
    pub diagnostic_log_capacity: u32,
    pub max_pooled_sets: Option<usize>,
    pub camera: CameraSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            temporal_aa: true,
            dof_coc_scale: 0.0,
            debug_bokeh: false,
            gpu_debug: false,
            diagnostic_log_capacity: DEFAULT_DIAGNOSTIC_LOG_CAPACITY,
            max_pooled_sets: None,
            camera: CameraSettings::default(),
        }
    }
}

impl RendererSettings {
    /// Default settings at the given resolution.
    #[must_use]
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Parses settings from a JSON document and validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and parses a JSON settings file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading renderer settings from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDescriptor(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.diagnostic_log_capacity == 0 {
            return Err(RenderError::InvalidDescriptor(
                "diagnostic_log_capacity must be at least 1".to_string(),
            ));
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(RenderError::InvalidDescriptor(format!(
                "camera clip planes must satisfy 0 < near < far, got near={} far={}",
                self.camera.near, self.camera.far
            )));
        }
        Ok(())
    }

    /// Width over height.
    #[inline]
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}
