//! Debug Surface Router
//!
//! Lets any intermediate surface be inspected without touching pass code.
//! The orchestrator calls [`register`](DebugSurfaceRouter::register) right
//! after a pass produces something worth looking at. The first time a name is
//! seen it becomes a selectable channel; afterwards, if it is the selected
//! channel, the surface is copied into the debug-display surface, which
//! [`present`](DebugSurfaceRouter::present) later puts over the final image.
//!
//! The router also owns the GPU diagnostic log and turns it into text once
//! per frame with [`drain`](DebugSurfaceRouter::drain).
//!
//! # Selection
//!
//! ```text
//!            UI action                  UI action
//!   "None" ────────────► "LinearDepth" ────────────► "ResolvedNoFXAA"
//!      ▲                                                    │
//!      └────────────────────────────────────────────────────┘
//! ```
//!
//! Selection only changes through [`select`](DebugSurfaceRouter::select),
//! which the UI calls between frames. Registration reads it once per call.

use std::fmt;
use std::str::FromStr;

use vesper_core::errors::{RenderError, Result};

use crate::debug::diagnostics::{DIAGNOSTIC_ENTRY_SIZE, DiagnosticLogEntry, decode_entries, format_entries};
use crate::device::{CopyMode, DiagnosticLogId, RenderDevice};
use crate::surface::{SurfaceDescriptor, SurfaceSet, allocate_surface_set};

/// The selection that disables the debug overlay.
pub const NO_DEBUG_CHANNEL: &str = "None";

/// How the selected channel is visualised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugMode {
    /// Colour passthrough. UI name `"RGB"`.
    #[default]
    Raw,
    /// Alpha broadcast. UI name `"A"`.
    Alpha,
    /// Fractional part, for spotting tiling and banding. UI name `"FRAC"`.
    Frac,
}

impl DebugMode {
    pub const ALL: [Self; 3] = [Self::Raw, Self::Alpha, Self::Frac];

    #[must_use]
    pub const fn copy_mode(self) -> CopyMode {
        match self {
            Self::Raw => CopyMode::Raw,
            Self::Alpha => CopyMode::Alpha,
            Self::Frac => CopyMode::Frac,
        }
    }

    /// Name shown in the UI.
    #[must_use]
    pub const fn ui_name(self) -> &'static str {
        match self {
            Self::Raw => "RGB",
            Self::Alpha => "A",
            Self::Frac => "FRAC",
        }
    }
}

impl fmt::Display for DebugMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ui_name())
    }
}

impl FromStr for DebugMode {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RGB" => Ok(Self::Raw),
            "A" => Ok(Self::Alpha),
            "FRAC" => Ok(Self::Frac),
            other => Err(RenderError::UnknownDebugMode(other.to_string())),
        }
    }
}

/// The active channel/mode pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSelection {
    pub channel: String,
    pub mode: DebugMode,
}

impl Default for DebugSelection {
    fn default() -> Self {
        Self {
            channel: NO_DEBUG_CHANNEL.to_string(),
            mode: DebugMode::Raw,
        }
    }
}

impl DebugSelection {
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.channel != NO_DEBUG_CHANNEL
    }
}

pub struct DebugSurfaceRouter {
    /// Known channel names in discovery order; starts with `"None"`.
    channels: Vec<String>,
    selection: DebugSelection,
    ui_rebuild_required: bool,
    gpu_debug: bool,
    first_call_this_frame: bool,
    display: SurfaceSet,
    log: DiagnosticLogId,
    log_capacity: u32,
}

impl DebugSurfaceRouter {
    /// Allocates the RGBA8 display surface and a diagnostic log of
    /// `log_capacity` entries.
    pub fn new(gpu: &mut dyn RenderDevice, width: u32, height: u32, log_capacity: u32) -> Result<Self> {
        let display = allocate_surface_set(
            gpu,
            &SurfaceDescriptor::color(wgpu::TextureFormat::Rgba8Unorm, width, height),
            "Debug Display",
        )?;
        let log = gpu.create_diagnostic_log(log_capacity, DIAGNOSTIC_ENTRY_SIZE as u32)?;

        Ok(Self {
            channels: vec![NO_DEBUG_CHANNEL.to_string()],
            selection: DebugSelection::default(),
            ui_rebuild_required: true,
            gpu_debug: false,
            first_call_this_frame: true,
            display,
            log,
            log_capacity,
        })
    }

    // ── Interception ───────────────────────────────────────────────────────

    /// Offers `candidate` under `channel`.
    ///
    /// A new name is recorded and raises the UI-rebuild flag; nothing is
    /// copied on discovery. A known name that matches the selection is copied
    /// into the display surface using the selected mode.
    pub fn register(&mut self, gpu: &mut dyn RenderDevice, channel: &str, candidate: &SurfaceSet) {
        if !self.channels.iter().any(|c| c == channel) {
            log::info!("Discovered debug channel '{channel}'");
            self.channels.push(channel.to_string());
            self.ui_rebuild_required = true;
            return;
        }

        if self.selection.channel == channel {
            gpu.copy(self.selection.mode.copy_mode(), &self.display, candidate);
        }
    }

    /// Copies the display surface over `target` unless the selection is
    /// `"None"`. Call after the frame's output is otherwise complete.
    pub fn present(&self, gpu: &mut dyn RenderDevice, target: &SurfaceSet) {
        if self.selection.is_active() {
            gpu.copy(CopyMode::Raw, target, &self.display);
        }
    }

    // ── Diagnostic log ─────────────────────────────────────────────────────

    /// Reads this frame's diagnostic entries and formats them, one line each.
    ///
    /// Blocks until the GPU has retired all work that could append to the
    /// log. Returns an empty string when GPU debugging is off. Always resets
    /// the once-per-frame bookkeeping.
    pub fn drain(&mut self, gpu: &mut dyn RenderDevice) -> Result<String> {
        let entries = self.drain_entries(gpu)?;
        Ok(format_entries(&entries))
    }

    /// Like [`drain`](Self::drain) but returns the decoded entries.
    pub fn drain_entries(&mut self, gpu: &mut dyn RenderDevice) -> Result<Vec<DiagnosticLogEntry>> {
        self.first_call_this_frame = true;
        if !self.gpu_debug {
            return Ok(Vec::new());
        }

        gpu.wait_idle()?;
        let appended = gpu.diagnostic_append_count(self.log)?;
        if appended > self.log_capacity {
            log::warn!(
                "Diagnostic log overflow: {appended} appends, keeping the first {}",
                self.log_capacity
            );
        }
        let count = appended.min(self.log_capacity);
        let bytes = gpu.read_diagnostic_log(self.log, count)?;
        gpu.reset_diagnostic_log(self.log);

        Ok(decode_entries(&bytes, count as usize))
    }

    /// Returns `true` once per frame, until the next drain.
    ///
    /// Callers use it to do per-frame setup (binding the log) exactly once.
    pub fn claim_first_call(&mut self) -> bool {
        std::mem::replace(&mut self.first_call_this_frame, false)
    }

    // ── Selection & UI state ───────────────────────────────────────────────

    pub fn select(&mut self, channel: &str, mode: DebugMode) {
        if !self.channels.iter().any(|c| c == channel) {
            log::warn!("Selecting debug channel '{channel}' before any pass registered it");
        }
        self.selection = DebugSelection {
            channel: channel.to_string(),
            mode,
        };
    }

    #[must_use]
    pub fn selection(&self) -> &DebugSelection {
        &self.selection
    }

    /// Known channels in discovery order, `"None"` first.
    #[must_use]
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    #[must_use]
    pub fn is_ui_rebuild_required(&self) -> bool {
        self.ui_rebuild_required
    }

    /// Reads and clears the UI-rebuild flag.
    pub fn take_ui_rebuild(&mut self) -> bool {
        std::mem::take(&mut self.ui_rebuild_required)
    }

    pub fn set_gpu_debug(&mut self, enabled: bool) {
        self.gpu_debug = enabled;
    }

    #[must_use]
    pub fn gpu_debug(&self) -> bool {
        self.gpu_debug
    }

    #[must_use]
    pub fn display_surface(&self) -> &SurfaceSet {
        &self.display
    }

    #[must_use]
    pub fn diagnostic_log(&self) -> DiagnosticLogId {
        self.log
    }

    #[must_use]
    pub fn log_capacity(&self) -> u32 {
        self.log_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use wgpu::TextureFormat;

    fn setup() -> (HeadlessDevice, DebugSurfaceRouter, SurfaceSet) {
        let mut gpu = HeadlessDevice::new();
        let router = DebugSurfaceRouter::new(&mut gpu, 4, 4, 8).unwrap();
        let src = allocate_surface_set(
            &mut gpu,
            &SurfaceDescriptor::color(TextureFormat::Rgba16Float, 4, 4),
            "src",
        )
        .unwrap();
        gpu.clear(&src, [0.25, 0.5, 0.75, 0.5], false);
        (gpu, router, src)
    }

    #[test]
    fn test_discovery_raises_rebuild_once() {
        let (mut gpu, mut router, src) = setup();
        assert!(router.take_ui_rebuild(), "initial UI build");
        assert!(!router.take_ui_rebuild());

        router.register(&mut gpu, "LinearDepth", &src);
        assert!(router.take_ui_rebuild());
        router.register(&mut gpu, "LinearDepth", &src);
        assert!(!router.take_ui_rebuild());
        assert_eq!(router.channels(), ["None", "LinearDepth"]);
    }

    #[test]
    fn test_selected_channel_copies_with_mode() {
        let (mut gpu, mut router, src) = setup();
        router.register(&mut gpu, "AO", &src);
        router.select("AO", DebugMode::Alpha);
        router.register(&mut gpu, "AO", &src);

        let t = gpu.texel(router.display_surface(), 1, 1);
        let expected = (0.5f32 * 255.0).round() / 255.0;
        assert!(t.iter().all(|&v| (v - expected).abs() < 1e-6), "{t:?}");
    }

    #[test]
    fn test_unselected_channel_is_not_copied() {
        let (mut gpu, mut router, src) = setup();
        router.register(&mut gpu, "AO", &src);
        router.register(&mut gpu, "Other", &src);
        router.select("Other", DebugMode::Raw);
        router.register(&mut gpu, "AO", &src);
        assert_eq!(gpu.texel(router.display_surface(), 0, 0), [0.0; 4]);
    }

    #[test]
    fn test_mode_ui_names() {
        for mode in DebugMode::ALL {
            assert_eq!(mode.ui_name().parse::<DebugMode>().unwrap(), mode);
        }
        let err = "RGBA".parse::<DebugMode>().unwrap_err();
        assert!(matches!(&err, RenderError::UnknownDebugMode(name) if name == "RGBA"));
        assert_eq!(err.kind(), vesper_core::ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Unknown debug mode: RGBA");
    }

    #[test]
    fn test_claim_first_call_resets_on_drain() {
        let (mut gpu, mut router, _) = setup();
        assert!(router.claim_first_call());
        assert!(!router.claim_first_call());
        router.drain(&mut gpu).unwrap();
        assert!(router.claim_first_call());
    }

    #[test]
    fn test_drain_disabled_reads_nothing() {
        let (mut gpu, mut router, _) = setup();
        assert_eq!(router.drain(&mut gpu).unwrap(), "");
        assert_eq!(gpu.wait_count(), 0);
    }
}
