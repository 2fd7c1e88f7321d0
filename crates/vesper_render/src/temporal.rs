//! Temporal Surface Manager
//!
//! Keeps a current/history pair of surface sets per logical name and flips
//! them once per frame. Passes write "current" and read "history"; after
//! [`advance`](TemporalSurfaceManager::advance) this frame's current becomes
//! next frame's history, so history always lags by exactly one frame.
//!
//! On the first frame history holds whatever the allocator left in it.
//! Blending passes treat frame 0 as degenerate history; this manager does
//! nothing special for it.

use rustc_hash::FxHashMap;
use vesper_core::errors::{RenderError, Result};

use crate::device::RenderDevice;
use crate::surface::{SurfaceDescriptor, SurfaceSet, allocate_surface_set};

/// Named current/history pair plus the phase bit.
struct TemporalSlot {
    surfaces: [SurfaceSet; 2],
    /// Index of the current side; toggles once per frame.
    phase: usize,
}

impl TemporalSlot {
    #[inline]
    fn current(&self) -> &SurfaceSet {
        &self.surfaces[self.phase]
    }

    #[inline]
    fn history(&self) -> &SurfaceSet {
        &self.surfaces[1 - self.phase]
    }
}

/// Owner of all temporal slots.
#[derive(Default)]
pub struct TemporalSurfaceManager {
    slots: FxHashMap<String, TemporalSlot>,
}

impl TemporalSurfaceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates two descriptor-identical sets for `name`.
    ///
    /// The pair is allocated directly rather than checked out of the frame
    /// pool: it lives for the whole run.
    pub fn initialize(
        &mut self,
        gpu: &mut dyn RenderDevice,
        name: &str,
        descriptor: &SurfaceDescriptor,
    ) -> Result<()> {
        if self.slots.contains_key(name) {
            return Err(RenderError::DuplicateTemporalSlot(name.to_string()));
        }

        let a = allocate_surface_set(gpu, descriptor, &format!("{name} (temporal A)"))?;
        let b = allocate_surface_set(gpu, descriptor, &format!("{name} (temporal B)"))?;
        log::debug!("Temporal slot '{name}' initialized with {:?} / {:?}", a.id(), b.id());

        self.slots.insert(
            name.to_string(),
            TemporalSlot {
                surfaces: [a, b],
                phase: 0,
            },
        );
        Ok(())
    }

    /// The side passes write this frame.
    pub fn current(&self, name: &str) -> Result<&SurfaceSet> {
        self.slot(name).map(TemporalSlot::current)
    }

    /// The side written last frame.
    pub fn history(&self, name: &str) -> Result<&SurfaceSet> {
        self.slot(name).map(TemporalSlot::history)
    }

    /// Phase bit of the slot (0 or 1).
    pub fn phase(&self, name: &str) -> Result<u32> {
        self.slot(name).map(|s| s.phase as u32)
    }

    /// Swaps current and history for one slot and toggles its phase.
    pub fn advance(&mut self, name: &str) -> Result<()> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| RenderError::UnknownTemporalSlot(name.to_string()))?;
        slot.phase = 1 - slot.phase;
        Ok(())
    }

    /// Advances every slot once.
    pub fn advance_all(&mut self) {
        for slot in self.slots.values_mut() {
            slot.phase = 1 - slot.phase;
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, name: &str) -> Result<&TemporalSlot> {
        self.slots
            .get(name)
            .ok_or_else(|| RenderError::UnknownTemporalSlot(name.to_string()))
    }
}
