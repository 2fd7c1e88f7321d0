//! Surface Descriptors and Surface Sets
//!
//! A [`SurfaceDescriptor`] is the structural key that matches pool requests to
//! reusable allocations. A [`SurfaceSet`] is one allocation: one or more
//! same-sized colour targets plus an optional depth buffer.
//!
//! `SurfaceSet` is deliberately move-only. Acquiring from the pool moves the
//! set out to the borrower and releasing moves it back, so a set cannot be
//! returned twice from safe code.

use smallvec::SmallVec;
use vesper_core::errors::{RenderError, Result};

use crate::device::RenderDevice;

pub use wgpu::TextureFormat;

/// Maximum colour targets in one set (wgpu's colour attachment limit).
pub const MAX_SURFACES_PER_SET: u32 = 8;

/// Device-side identifier of a single texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureId(pub(crate) u32);

impl TextureId {
    /// For [`RenderDevice`] implementations.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Identifier of a whole surface set, unique per device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct SurfaceSetId(pub(crate) u32);

impl SurfaceSetId {
    /// For [`RenderDevice`] implementations.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }
}

// ─── Descriptor ───────────────────────────────────────────────────────────────

/// Structural description of a surface set; the pool key.
///
/// Two descriptors are equal iff every field matches exactly. There is no
/// format promotion and no size tolerance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SurfaceDescriptor {
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub surface_count: u32,
    pub has_depth: bool,
}

impl SurfaceDescriptor {
    /// Single colour target without depth.
    #[must_use]
    pub const fn color(format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            surface_count: 1,
            has_depth: false,
        }
    }

    /// Single colour target with a depth buffer.
    #[must_use]
    pub const fn color_depth(format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            surface_count: 1,
            has_depth: true,
        }
    }

    /// Checks dimensions, surface count and format support.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDescriptor(format!(
                "zero dimension {}x{}",
                self.width, self.height
            )));
        }
        if self.surface_count == 0 || self.surface_count > MAX_SURFACES_PER_SET {
            return Err(RenderError::InvalidDescriptor(format!(
                "surface count {} outside 1..={MAX_SURFACES_PER_SET}",
                self.surface_count
            )));
        }
        if channel_count(self.format).is_none() {
            return Err(RenderError::InvalidDescriptor(format!(
                "unsupported format {:?}",
                self.format
            )));
        }
        Ok(())
    }

    /// Number of texels in one colour target.
    #[inline]
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Channel count of a supported renderable colour format, `None` otherwise.
#[must_use]
pub fn channel_count(format: wgpu::TextureFormat) -> Option<u32> {
    use wgpu::TextureFormat as F;
    match format {
        F::R8Unorm | F::R16Float | F::R32Float => Some(1),
        F::Rg8Unorm | F::Rg16Float | F::Rg32Float => Some(2),
        F::Rgba8Unorm
        | F::Rgba8UnormSrgb
        | F::Bgra8Unorm
        | F::Bgra8UnormSrgb
        | F::Rgb10a2Unorm
        | F::Rgba16Float
        | F::Rgba32Float => Some(4),
        _ => None,
    }
}

/// Whether values written to `format` are clamped to `[0, 1]`.
#[must_use]
pub fn is_normalized(format: wgpu::TextureFormat) -> bool {
    use wgpu::TextureFormat as F;
    matches!(
        format,
        F::R8Unorm
            | F::Rg8Unorm
            | F::Rgba8Unorm
            | F::Rgba8UnormSrgb
            | F::Bgra8Unorm
            | F::Bgra8UnormSrgb
            | F::Rgb10a2Unorm
    )
}

// ─── Surface Set ──────────────────────────────────────────────────────────────

/// A group of same-sized render targets plus optional depth matching one
/// descriptor.
#[derive(Debug, PartialEq, Eq)]
pub struct SurfaceSet {
    pub(crate) id: SurfaceSetId,
    pub(crate) descriptor: SurfaceDescriptor,
    pub(crate) colors: SmallVec<[TextureId; 4]>,
    pub(crate) depth: Option<TextureId>,
}

impl SurfaceSet {
    /// Assembles a set. Called by [`RenderDevice::create_surface_set`]
    /// implementations; everything else obtains sets from a device.
    #[must_use]
    pub fn new(
        id: SurfaceSetId,
        descriptor: SurfaceDescriptor,
        colors: SmallVec<[TextureId; 4]>,
        depth: Option<TextureId>,
    ) -> Self {
        debug_assert_eq!(colors.len(), descriptor.surface_count as usize);
        debug_assert_eq!(depth.is_some(), descriptor.has_depth);
        Self {
            id,
            descriptor,
            colors,
            depth,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SurfaceSetId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &SurfaceDescriptor {
        &self.descriptor
    }

    /// All colour targets.
    #[inline]
    #[must_use]
    pub fn colors(&self) -> &[TextureId] {
        &self.colors
    }

    /// First colour target; every set has at least one.
    #[inline]
    #[must_use]
    pub fn color(&self) -> TextureId {
        self.colors[0]
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> Option<TextureId> {
        self.depth
    }
}

/// Validates `descriptor` and allocates a fresh set on `gpu`.
///
/// Shared by the pool, the temporal manager and the orchestrator's
/// persistent surfaces so all allocations go through the same checks.
pub fn allocate_surface_set(
    gpu: &mut dyn RenderDevice,
    descriptor: &SurfaceDescriptor,
    label: &str,
) -> Result<SurfaceSet> {
    descriptor.validate()?;
    gpu.create_surface_set(descriptor, label)
}
