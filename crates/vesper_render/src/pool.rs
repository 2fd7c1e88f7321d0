//! Surface Pool
//!
//! Descriptor-keyed cache of [`SurfaceSet`]s for short-lived, per-frame use.
//! The orchestrator acquires its working surfaces at the start of a frame and
//! releases them before the frame ends; released sets go back to the idle
//! bucket for their descriptor and are handed out again next frame.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   SurfacePool                        │
//! │                                                     │
//! │  idle:        FxHashMap<Descriptor, Vec<SurfaceSet>>│
//! │  outstanding: FxHashSet<SurfaceSetId>               │
//! │                                                     │
//! │  acquire(desc) → SurfaceSet   (moves out)           │
//! │  release(set)                 (moves back)          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Memory Strategy
//!
//! - Sets are **never** destroyed; they stay idle until requested again.
//!   Descriptor cardinality is small and fixed by the passes that exist, so
//!   the pool's high-water mark is reached after the first frame.
//! - The pool grows on demand. An optional cap turns growth past a limit
//!   into [`RenderError::PoolExhausted`].
//!
//! # Thread Safety
//!
//! Single caller (the render thread); no locking.

use rustc_hash::{FxHashMap, FxHashSet};
use vesper_core::errors::{RenderError, Result};

use crate::device::RenderDevice;
use crate::surface::{SurfaceDescriptor, SurfaceSet, SurfaceSetId, allocate_surface_set};

/// Snapshot of pool bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Sets ever allocated by this pool.
    pub allocated: usize,
    /// Sets currently idle.
    pub idle: usize,
    /// Sets currently checked out.
    pub outstanding: usize,
    /// Total successful acquires.
    pub acquires: u64,
    /// Total accepted releases.
    pub releases: u64,
}

/// Descriptor-keyed pool of reusable surface sets.
#[derive(Default)]
pub struct SurfacePool {
    /// Idle sets grouped by descriptor.
    idle: FxHashMap<SurfaceDescriptor, Vec<SurfaceSet>>,
    /// Sets handed out and not yet returned.
    outstanding: FxHashSet<SurfaceSetId>,
    max_sets: Option<usize>,
    allocated: usize,
    acquires: u64,
    releases: u64,
}

impl SurfacePool {
    /// Creates an empty, uncapped pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool that refuses to grow past `max_sets` allocations.
    #[must_use]
    pub fn with_max_sets(max_sets: usize) -> Self {
        Self {
            max_sets: Some(max_sets),
            ..Self::default()
        }
    }

    /// Hands out an idle set matching `descriptor`, allocating one if none is
    /// idle.
    ///
    /// A malformed descriptor is a configuration error; a cap or device
    /// failure is resource exhaustion. Neither is retried.
    pub fn acquire(
        &mut self,
        gpu: &mut dyn RenderDevice,
        descriptor: &SurfaceDescriptor,
    ) -> Result<SurfaceSet> {
        let set = if let Some(set) = self.idle.get_mut(descriptor).and_then(Vec::pop) {
            set
        } else {
            descriptor.validate()?;
            if let Some(limit) = self.max_sets
                && self.allocated >= limit
            {
                return Err(RenderError::PoolExhausted { limit });
            }

            log::debug!(
                "Surface pool miss: allocating {:?} {}x{} (x{}, depth: {})",
                descriptor.format,
                descriptor.width,
                descriptor.height,
                descriptor.surface_count,
                descriptor.has_depth,
            );
            let label = format!("Pooled {:?} {}x{}", descriptor.format, descriptor.width, descriptor.height);
            let set = allocate_surface_set(gpu, descriptor, &label)?;
            self.allocated += 1;
            set
        };

        log::trace!("Surface pool acquire {:?}", set.id());
        self.outstanding.insert(set.id());
        self.acquires += 1;
        Ok(set)
    }

    /// Returns a set to the idle bucket for its descriptor.
    ///
    /// A set this pool did not hand out is logged and dropped; the pool's
    /// state is left untouched.
    pub fn release(&mut self, set: SurfaceSet) {
        if !self.outstanding.remove(&set.id()) {
            log::warn!(
                "Ignoring release of surface set {:?}: not checked out from this pool",
                set.id()
            );
            return;
        }

        log::trace!("Surface pool release {:?}", set.id());
        self.releases += 1;
        self.idle.entry(*set.descriptor()).or_default().push(set);
    }

    /// Whether the set with this id is currently checked out.
    #[must_use]
    pub fn is_outstanding(&self, id: SurfaceSetId) -> bool {
        self.outstanding.contains(&id)
    }

    /// Number of idle sets for one descriptor.
    #[must_use]
    pub fn idle_count(&self, descriptor: &SurfaceDescriptor) -> usize {
        self.idle.get(descriptor).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated,
            idle: self.idle.values().map(Vec::len).sum(),
            outstanding: self.outstanding.len(),
            acquires: self.acquires,
            releases: self.releases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use wgpu::TextureFormat;

    fn desc() -> SurfaceDescriptor {
        SurfaceDescriptor::color(TextureFormat::Rgba16Float, 8, 8)
    }

    #[test]
    fn test_release_then_acquire_reuses() {
        let mut gpu = HeadlessDevice::new();
        let mut pool = SurfacePool::new();

        let a = pool.acquire(&mut gpu, &desc()).unwrap();
        let id = a.id();
        pool.release(a);
        let b = pool.acquire(&mut gpu, &desc()).unwrap();

        assert_eq!(b.id(), id);
        assert_eq!(gpu.surface_sets_created(), 1);
        assert_eq!(pool.stats().allocated, 1);
    }

    #[test]
    fn test_concurrent_borrows_get_distinct_sets() {
        let mut gpu = HeadlessDevice::new();
        let mut pool = SurfacePool::new();

        let a = pool.acquire(&mut gpu, &desc()).unwrap();
        let b = pool.acquire(&mut gpu, &desc()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.stats().outstanding, 2);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.stats().outstanding, 0);
        assert_eq!(pool.idle_count(&desc()), 2);
    }

    #[test]
    fn test_buckets_do_not_mix() {
        let mut gpu = HeadlessDevice::new();
        let mut pool = SurfacePool::new();

        let a = pool.acquire(&mut gpu, &desc()).unwrap();
        pool.release(a);
        let other = SurfaceDescriptor::color_depth(TextureFormat::Rgba16Float, 8, 8);
        let b = pool.acquire(&mut gpu, &other).unwrap();
        assert!(b.depth().is_some());
        assert_eq!(pool.stats().allocated, 2);
        assert_eq!(pool.idle_count(&desc()), 1);
    }

    #[test]
    fn test_foreign_release_is_ignored() {
        let mut gpu = HeadlessDevice::new();
        let mut pool = SurfacePool::new();
        let foreign = allocate_surface_set(&mut gpu, &desc(), "foreign").unwrap();

        pool.release(foreign);
        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.releases, 0);
    }

    #[test]
    fn test_malformed_descriptor_is_configuration_error() {
        let mut gpu = HeadlessDevice::new();
        let mut pool = SurfacePool::new();
        let bad = SurfaceDescriptor::color(TextureFormat::Rgba8Unorm, 0, 4);
        assert!(pool.acquire(&mut gpu, &bad).unwrap_err().is_configuration());
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn test_cap_exhaustion() {
        let mut gpu = HeadlessDevice::new();
        let mut pool = SurfacePool::with_max_sets(1);
        let a = pool.acquire(&mut gpu, &desc()).unwrap();
        let err = pool.acquire(&mut gpu, &desc()).unwrap_err();
        assert!(matches!(err, RenderError::PoolExhausted { limit: 1 }));

        // An idle match is still served at the cap.
        pool.release(a);
        assert!(pool.acquire(&mut gpu, &desc()).is_ok());
    }
}
