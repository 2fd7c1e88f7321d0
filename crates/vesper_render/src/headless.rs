//! Headless Render Device
//!
//! A CPU implementation of [`RenderDevice`] that stores every texture as a
//! grid of `[f32; 4]` texels. Writes are quantised the way the GPU would
//! store them (normalised formats clamp, 8-bit formats round to 1/255,
//! missing channels read back as `(r, 0, 0, 1)`), so copy-mode behaviour is
//! observable exactly.
//!
//! Textures that were only ever cleared are stored as a single value, so
//! full-resolution frames stay cheap as long as nothing writes individual
//! texels.
//!
//! Shader appends to the diagnostic log are simulated with
//! [`HeadlessDevice::append_diagnostic`]; the append counter keeps counting
//! past capacity like a GPU atomic would, while the extra entries are
//! dropped.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use vesper_core::errors::{RenderError, Result};

use crate::device::{CopyMode, DiagnosticLogId, RenderDevice};
use crate::surface::{
    SurfaceDescriptor, SurfaceSet, SurfaceSetId, TextureId, channel_count, is_normalized,
};

/// Profiling scope boundary recorded by the headless device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent {
    Begin(String),
    End,
}

/// Texel storage. Cleared textures stay a single value until a write
/// touches one texel.
#[derive(Clone)]
enum Texels {
    Uniform([f32; 4]),
    Dense(Vec<[f32; 4]>),
}

struct HeadlessTexture {
    label: String,
    format: Option<wgpu::TextureFormat>,
    width: u32,
    height: u32,
    texels: Texels,
}

impl HeadlessTexture {
    fn get(&self, x: u32, y: u32) -> [f32; 4] {
        match &self.texels {
            Texels::Uniform(v) => *v,
            Texels::Dense(texels) => texels[(y * self.width + x) as usize],
        }
    }

    fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let stored = self.store(value);
        let len = self.width as usize * self.height as usize;
        if let Texels::Uniform(v) = self.texels {
            self.texels = Texels::Dense(vec![v; len]);
        }
        if let Texels::Dense(texels) = &mut self.texels {
            texels[(y * self.width + x) as usize] = stored;
        }
    }

    fn to_vec(&self) -> Vec<[f32; 4]> {
        match &self.texels {
            Texels::Uniform(v) => vec![*v; self.width as usize * self.height as usize],
            Texels::Dense(texels) => texels.clone(),
        }
    }

    fn store(&self, value: [f32; 4]) -> [f32; 4] {
        let Some(format) = self.format else {
            // Depth: single channel, no clamping.
            return [value[0], 0.0, 0.0, 1.0];
        };
        let channels = channel_count(format).unwrap_or(4) as usize;
        let normalized = is_normalized(format);
        let eight_bit = !matches!(format, wgpu::TextureFormat::Rgb10a2Unorm) && normalized;

        let mut out = [0.0, 0.0, 0.0, 1.0];
        for (i, slot) in out.iter_mut().enumerate().take(channels) {
            let mut v = value[i];
            if normalized {
                v = v.clamp(0.0, 1.0);
            }
            if eight_bit {
                v = (v * 255.0).round() / 255.0;
            }
            *slot = v;
        }
        out
    }
}

struct HeadlessLog {
    capacity: u32,
    stride: u32,
    bytes: Vec<u8>,
    append_count: u32,
}

/// CPU reference implementation of [`RenderDevice`].
#[derive(Default)]
pub struct HeadlessDevice {
    textures: Vec<HeadlessTexture>,
    next_set_id: u32,
    sets_created: usize,
    max_sets: Option<usize>,
    constants: FxHashMap<&'static str, Vec<u8>>,
    logs: Vec<HeadlessLog>,
    bound_log: Option<DiagnosticLogId>,
    scope_events: Vec<ScopeEvent>,
    open_scopes: usize,
    wait_count: usize,
    submit_count: usize,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that fails with `OutOfMemory` after `max_sets` allocations.
    #[must_use]
    pub fn with_memory_budget(max_sets: usize) -> Self {
        Self {
            max_sets: Some(max_sets),
            ..Self::default()
        }
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// Number of surface sets allocated over the device's lifetime.
    #[must_use]
    pub fn surface_sets_created(&self) -> usize {
        self.sets_created
    }

    /// All texels of one texture, row-major.
    #[must_use]
    pub fn texels(&self, texture: TextureId) -> Vec<[f32; 4]> {
        self.textures[texture.0 as usize].to_vec()
    }

    /// Whether every texel of the texture holds the same value.
    #[must_use]
    pub fn is_uniform(&self, texture: TextureId) -> bool {
        matches!(self.textures[texture.0 as usize].texels, Texels::Uniform(_))
    }

    /// One texel of the first colour target of `set`.
    #[must_use]
    pub fn texel(&self, set: &SurfaceSet, x: u32, y: u32) -> [f32; 4] {
        self.textures[set.color().0 as usize].get(x, y)
    }

    /// Debug label the texture was created with.
    #[must_use]
    pub fn label(&self, texture: TextureId) -> &str {
        &self.textures[texture.0 as usize].label
    }

    /// Last bytes uploaded under a constant-buffer name.
    #[must_use]
    pub fn constants(&self, name: &str) -> Option<&[u8]> {
        self.constants.get(name).map(Vec::as_slice)
    }

    /// Every profiling scope boundary recorded so far.
    #[must_use]
    pub fn scope_events(&self) -> &[ScopeEvent] {
        &self.scope_events
    }

    /// Names of the scopes opened so far, in order.
    #[must_use]
    pub fn scope_names(&self) -> Vec<&str> {
        self.scope_events
            .iter()
            .filter_map(|e| match e {
                ScopeEvent::Begin(name) => Some(name.as_str()),
                ScopeEvent::End => None,
            })
            .collect()
    }

    /// Scopes currently open.
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        self.open_scopes
    }

    #[must_use]
    pub fn wait_count(&self) -> usize {
        self.wait_count
    }

    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.submit_count
    }

    // ── Simulated shader work ──────────────────────────────────────────────

    /// Writes one texel of the first colour target of `set`.
    pub fn write_texel(&mut self, set: &SurfaceSet, x: u32, y: u32, value: [f32; 4]) {
        self.textures[set.color().0 as usize].set(x, y, value);
    }

    fn push_texture(
        &mut self,
        label: String,
        format: Option<wgpu::TextureFormat>,
        width: u32,
        height: u32,
        fill: [f32; 4],
    ) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(HeadlessTexture {
            label,
            format,
            width,
            height,
            texels: Texels::Uniform(fill),
        });
        id
    }

    fn log_mut(&mut self, id: DiagnosticLogId) -> Result<&mut HeadlessLog> {
        self.logs
            .get_mut(id.0 as usize)
            .ok_or_else(|| RenderError::DiagnosticReadback(format!("unknown log {id:?}")))
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_surface_set(
        &mut self,
        descriptor: &SurfaceDescriptor,
        label: &str,
    ) -> Result<SurfaceSet> {
        if let Some(max) = self.max_sets
            && self.sets_created >= max
        {
            return Err(RenderError::OutOfMemory(format!(
                "headless budget of {max} surface sets spent allocating '{label}'"
            )));
        }

        let zero = [0.0, 0.0, 0.0, 0.0];
        let colors: SmallVec<[TextureId; 4]> = (0..descriptor.surface_count)
            .map(|i| {
                self.push_texture(
                    format!("{label}[{i}]"),
                    Some(descriptor.format),
                    descriptor.width,
                    descriptor.height,
                    zero,
                )
            })
            .collect();
        let depth = descriptor.has_depth.then(|| {
            self.push_texture(
                format!("{label}.depth"),
                None,
                descriptor.width,
                descriptor.height,
                [1.0, 0.0, 0.0, 1.0],
            )
        });

        let id = SurfaceSetId(self.next_set_id);
        self.next_set_id += 1;
        self.sets_created += 1;
        Ok(SurfaceSet::new(id, *descriptor, colors, depth))
    }

    fn clear(&mut self, target: &SurfaceSet, color: [f32; 4], clear_depth: bool) {
        for &tex_id in target.colors() {
            let tex = &mut self.textures[tex_id.0 as usize];
            tex.texels = Texels::Uniform(tex.store(color));
        }
        if clear_depth && let Some(depth) = target.depth() {
            self.textures[depth.0 as usize].texels = Texels::Uniform([1.0, 0.0, 0.0, 1.0]);
        }
    }

    fn copy(&mut self, mode: CopyMode, dst: &SurfaceSet, src: &SurfaceSet) {
        let (src_id, dst_id) = (src.color().0 as usize, dst.color().0 as usize);
        let source = self.textures[src_id].texels.clone();
        let (sw, sh) = (self.textures[src_id].width, self.textures[src_id].height);
        let dst_tex = &mut self.textures[dst_id];

        let dense = match source {
            Texels::Uniform(v) => {
                dst_tex.texels = Texels::Uniform(dst_tex.store(mode.apply(v)));
                return;
            }
            Texels::Dense(texels) => texels,
        };

        let (dw, dh) = (dst_tex.width, dst_tex.height);
        let mut out = Vec::with_capacity(dw as usize * dh as usize);
        for y in 0..dh {
            let sy = (u64::from(y) * u64::from(sh) / u64::from(dh)) as u32;
            for x in 0..dw {
                let sx = (u64::from(x) * u64::from(sw) / u64::from(dw)) as u32;
                out.push(dst_tex.store(mode.apply(dense[(sy * sw + sx) as usize])));
            }
        }
        dst_tex.texels = Texels::Dense(out);
    }

    fn upload_constants(&mut self, name: &'static str, bytes: &[u8]) {
        self.constants.insert(name, bytes.to_vec());
    }

    fn create_diagnostic_log(&mut self, capacity: u32, stride: u32) -> Result<DiagnosticLogId> {
        let id = DiagnosticLogId(self.logs.len() as u32);
        self.logs.push(HeadlessLog {
            capacity,
            stride,
            bytes: vec![0; capacity as usize * stride as usize],
            append_count: 0,
        });
        Ok(id)
    }

    fn bind_diagnostic_log(&mut self, log: DiagnosticLogId) {
        self.bound_log = Some(log);
    }

    fn append_diagnostic(&mut self, entry: &[u8]) -> bool {
        let Some(id) = self.bound_log else {
            return false;
        };
        let log = &mut self.logs[id.0 as usize];
        let slot = log.append_count;
        log.append_count = log.append_count.saturating_add(1);
        if slot >= log.capacity {
            return false;
        }
        let stride = log.stride as usize;
        let start = slot as usize * stride;
        let len = entry.len().min(stride);
        log.bytes[start..start + len].copy_from_slice(&entry[..len]);
        true
    }

    fn diagnostic_append_count(&mut self, log: DiagnosticLogId) -> Result<u32> {
        Ok(self.log_mut(log)?.append_count)
    }

    fn read_diagnostic_log(&mut self, log: DiagnosticLogId, count: u32) -> Result<Vec<u8>> {
        let log = self.log_mut(log)?;
        let count = count.min(log.capacity) as usize;
        Ok(log.bytes[..count * log.stride as usize].to_vec())
    }

    fn reset_diagnostic_log(&mut self, log: DiagnosticLogId) {
        if let Ok(log) = self.log_mut(log) {
            log.append_count = 0;
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.wait_count += 1;
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) {
        self.open_scopes += 1;
        self.scope_events.push(ScopeEvent::Begin(name.to_string()));
    }

    fn end_scope(&mut self) {
        self.open_scopes = self.open_scopes.saturating_sub(1);
        self.scope_events.push(ScopeEvent::End);
    }

    fn submit(&mut self) -> Result<()> {
        self.submit_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    fn set(gpu: &mut HeadlessDevice, format: TextureFormat) -> SurfaceSet {
        gpu.create_surface_set(&SurfaceDescriptor::color(format, 4, 2), "test")
            .unwrap()
    }

    #[test]
    fn test_unorm_targets_clamp_and_quantize() {
        let mut gpu = HeadlessDevice::new();
        let rt = set(&mut gpu, TextureFormat::Rgba8Unorm);
        gpu.clear(&rt, [1.5, -0.5, 0.5, 0.25], false);
        let t = gpu.texel(&rt, 0, 0);
        assert_eq!(t[0], 1.0);
        assert_eq!(t[1], 0.0);
        assert!((t[2] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_channel_reads_back_with_unit_alpha() {
        let mut gpu = HeadlessDevice::new();
        let rt = set(&mut gpu, TextureFormat::R32Float);
        gpu.clear(&rt, [7.5, 3.0, 2.0, 0.0], false);
        assert_eq!(gpu.texel(&rt, 3, 1), [7.5, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_copy_scales_between_sizes() {
        let mut gpu = HeadlessDevice::new();
        let src = gpu
            .create_surface_set(&SurfaceDescriptor::color(TextureFormat::Rgba32Float, 2, 1), "src")
            .unwrap();
        let dst = set(&mut gpu, TextureFormat::Rgba32Float);
        gpu.write_texel(&src, 0, 0, [1.0; 4]);
        gpu.write_texel(&src, 1, 0, [2.0; 4]);
        gpu.copy(CopyMode::Raw, &dst, &src);
        assert_eq!(gpu.texel(&dst, 0, 0), [1.0; 4]);
        assert_eq!(gpu.texel(&dst, 1, 1), [1.0; 4]);
        assert_eq!(gpu.texel(&dst, 3, 0), [2.0; 4]);
        assert!(!gpu.is_uniform(dst.color()));
    }

    #[test]
    fn test_cleared_textures_stay_uniform_through_copies() {
        let mut gpu = HeadlessDevice::new();
        let src = set(&mut gpu, TextureFormat::Rgba16Float);
        let dst = set(&mut gpu, TextureFormat::Rgba8Unorm);
        gpu.clear(&src, [2.0, 0.5, 0.0, 1.0], false);
        gpu.copy(CopyMode::Raw, &dst, &src);
        assert!(gpu.is_uniform(dst.color()));
        assert_eq!(gpu.texel(&dst, 2, 1), [1.0, 128.0 / 255.0, 0.0, 1.0]);
        assert_eq!(gpu.texels(dst.color()).len(), 8);
    }

    #[test]
    fn test_textures_carry_set_labels() {
        let mut gpu = HeadlessDevice::new();
        let desc = SurfaceDescriptor {
            surface_count: 2,
            ..SurfaceDescriptor::color_depth(TextureFormat::Rgba16Float, 2, 2)
        };
        let rt = gpu.create_surface_set(&desc, "Main").unwrap();
        assert_eq!(gpu.label(rt.colors()[0]), "Main[0]");
        assert_eq!(gpu.label(rt.colors()[1]), "Main[1]");
        assert_eq!(gpu.label(rt.depth().unwrap()), "Main.depth");
    }

    #[test]
    fn test_append_past_capacity_counts_but_drops() {
        let mut gpu = HeadlessDevice::new();
        let log = gpu.create_diagnostic_log(2, 4).unwrap();
        assert!(!gpu.append_diagnostic(&[1, 2, 3, 4]), "nothing bound yet");
        gpu.bind_diagnostic_log(log);
        assert!(gpu.append_diagnostic(&[1, 1, 1, 1]));
        assert!(gpu.append_diagnostic(&[2, 2, 2, 2]));
        assert!(!gpu.append_diagnostic(&[3, 3, 3, 3]));
        assert_eq!(gpu.diagnostic_append_count(log).unwrap(), 3);
        assert_eq!(gpu.read_diagnostic_log(log, 3).unwrap(), vec![1, 1, 1, 1, 2, 2, 2, 2]);
        gpu.reset_diagnostic_log(log);
        assert_eq!(gpu.diagnostic_append_count(log).unwrap(), 0);
    }

    #[test]
    fn test_memory_budget() {
        let mut gpu = HeadlessDevice::with_memory_budget(1);
        let desc = SurfaceDescriptor::color(TextureFormat::R8Unorm, 1, 1);
        assert!(gpu.create_surface_set(&desc, "a").is_ok());
        let err = gpu.create_surface_set(&desc, "b").unwrap_err();
        assert_eq!(err.kind(), vesper_core::ErrorKind::ResourceExhaustion);
    }
}
