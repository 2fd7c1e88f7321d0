//! wgpu Render Device
//!
//! [`RenderDevice`] on a real GPU. Work is recorded onto one lazily created
//! command encoder and flushed on [`submit`](RenderDevice::submit), before
//! any readback, and whenever the CPU must wait.
//!
//! Constant buffers become uniform buffers keyed by name and diagnostic logs
//! become storage buffers with an atomic counter. Shading passes bind them
//! through [`WgpuDevice::uniform_buffer`] and
//! [`WgpuDevice::diagnostic_log_buffers`].

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use vesper_core::errors::{RenderError, Result};

use crate::device::{CopyMode, DiagnosticLogId, RenderDevice};
use crate::surface::{SurfaceDescriptor, SurfaceSet, SurfaceSetId, TextureId};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuLog {
    entries: wgpu::Buffer,
    counter: wgpu::Buffer,
    capacity: u32,
    stride: u32,
    /// Host appends since the last reset. Host writes go through the queue,
    /// so they land ahead of any shader append recorded in the same submit.
    host_appends: u32,
}

// ============================================================================
// Copy Blitter
// ============================================================================

struct CopyBlitter {
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shader: wgpu::ShaderModule,
    pipelines: FxHashMap<(CopyMode, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

impl CopyBlitter {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Debug Copy Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("copy.wgsl"))),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Debug Copy Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Debug Copy Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        Self {
            layout,
            pipeline_layout,
            shader,
            pipelines: FxHashMap::default(),
        }
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        mode: CopyMode,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let Self {
            pipeline_layout,
            shader,
            pipelines,
            ..
        } = self;
        pipelines.entry((mode, format)).or_insert_with(|| {
            log::debug!("Creating copy pipeline {mode:?} -> {format:?}");
            let entry_point = match mode {
                CopyMode::Raw => "fs_raw",
                CopyMode::Alpha => "fs_alpha",
                CopyMode::Frac => "fs_frac",
            };
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("Debug Copy {mode:?} {format:?}")),
                layout: Some(pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })
    }
}

// ============================================================================
// Device
// ============================================================================

/// [`RenderDevice`] backed by a wgpu device and queue.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    encoder: Option<wgpu::CommandEncoder>,
    textures: Vec<GpuTexture>,
    next_set_id: u32,
    blitter: CopyBlitter,
    uniforms: FxHashMap<&'static str, wgpu::Buffer>,
    logs: Vec<GpuLog>,
    bound_log: Option<DiagnosticLogId>,
    /// Debug groups currently open, re-pushed onto each new encoder.
    open_scopes: Vec<String>,
}

impl WgpuDevice {
    /// Opens the default adapter without a surface.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Device(format!("adapter request failed: {e}")))?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Vesper Device"),
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::Device(format!("device request failed: {e}")))?;

        Ok(Self::from_parts(device, queue))
    }

    /// Wraps an existing device, e.g. one shared with a windowing layer.
    #[must_use]
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let blitter = CopyBlitter::new(&device);
        Self {
            device,
            queue,
            encoder: None,
            textures: Vec::new(),
            next_set_id: 0,
            blitter,
            uniforms: FxHashMap::default(),
            logs: Vec::new(),
            bound_log: None,
            open_scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Uniform buffer last uploaded under `name`.
    #[must_use]
    pub fn uniform_buffer(&self, name: &str) -> Option<&wgpu::Buffer> {
        self.uniforms.get(name)
    }

    /// `(entries, counter)` of the bound diagnostic log.
    #[must_use]
    pub fn diagnostic_log_buffers(&self) -> Option<(&wgpu::Buffer, &wgpu::Buffer)> {
        let log = self.logs.get(self.bound_log?.0 as usize)?;
        Some((&log.entries, &log.counter))
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        let scopes = &self.open_scopes;
        self.encoder.get_or_insert_with(|| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Vesper Encoder"),
            });
            for scope in scopes {
                encoder.push_debug_group(scope);
            }
            encoder
        })
    }

    /// Submits recorded work, closing open debug groups on this encoder.
    fn flush(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            for _ in &self.open_scopes {
                encoder.pop_debug_group();
            }
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn texture(&self, id: TextureId) -> &GpuTexture {
        &self.textures[id.index() as usize]
    }

    fn push_texture(&mut self, label: &str, format: wgpu::TextureFormat, width: u32, height: u32) -> TextureId {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId::from_raw(self.textures.len() as u32);
        self.textures.push(GpuTexture { texture, view });
        id
    }

    /// Copies `size` bytes of `source` into CPU memory. Blocks.
    fn read_buffer(&mut self, source: &wgpu::Buffer, size: u64) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        self.flush();

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Diagnostic Readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Diagnostic Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::DiagnosticReadback(format!("poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| RenderError::DiagnosticReadback("readback channel closed".into()))?
            .map_err(|e| RenderError::DiagnosticReadback(format!("map failed: {e:?}")))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn log(&self, id: DiagnosticLogId) -> Result<&GpuLog> {
        self.logs
            .get(id.0 as usize)
            .ok_or_else(|| RenderError::DiagnosticReadback(format!("unknown log {id:?}")))
    }
}

impl RenderDevice for WgpuDevice {
    fn create_surface_set(
        &mut self,
        descriptor: &SurfaceDescriptor,
        label: &str,
    ) -> Result<SurfaceSet> {
        let colors: SmallVec<[TextureId; 4]> = (0..descriptor.surface_count)
            .map(|i| {
                self.push_texture(
                    &format!("{label}[{i}]"),
                    descriptor.format,
                    descriptor.width,
                    descriptor.height,
                )
            })
            .collect();
        let depth = descriptor.has_depth.then(|| {
            self.push_texture(
                &format!("{label}.depth"),
                DEPTH_FORMAT,
                descriptor.width,
                descriptor.height,
            )
        });

        let id = SurfaceSetId::from_raw(self.next_set_id);
        self.next_set_id += 1;
        Ok(SurfaceSet::new(id, *descriptor, colors, depth))
    }

    fn clear(&mut self, target: &SurfaceSet, color: [f32; 4], clear_depth: bool) {
        let clear = wgpu::Color {
            r: f64::from(color[0]),
            g: f64::from(color[1]),
            b: f64::from(color[2]),
            a: f64::from(color[3]),
        };
        let views: SmallVec<[wgpu::TextureView; 4]> =
            target.colors().iter().map(|&id| self.texture(id).view.clone()).collect();
        let depth_view = target
            .depth()
            .filter(|_| clear_depth)
            .map(|id| self.texture(id).view.clone());

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 4]> = views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_view.as_ref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn copy(&mut self, mode: CopyMode, dst: &SurfaceSet, src: &SurfaceSet) {
        if src.color() == dst.color() {
            log::warn!("In-place copy of {:?} skipped on the GPU backend", src.id());
            return;
        }

        let src_view = self.texture(src.color()).view.clone();
        let dst_view = self.texture(dst.color()).view.clone();
        let format = self.texture(dst.color()).texture.format();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Debug Copy BG"),
            layout: &self.blitter.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&src_view),
            }],
        });
        let pipeline = self.blitter.pipeline(&self.device, mode, format).clone();

        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Debug Copy"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &dst_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn upload_constants(&mut self, name: &'static str, bytes: &[u8]) {
        let size = (bytes.len() as u64).next_multiple_of(16).max(16);
        let stale = self.uniforms.get(name).is_none_or(|b| b.size() != size);
        if stale {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(name),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.uniforms.insert(name, buffer);
        }
        if let Some(buffer) = self.uniforms.get(name) {
            self.queue.write_buffer(buffer, 0, bytes);
        }
    }

    fn create_diagnostic_log(&mut self, capacity: u32, stride: u32) -> Result<DiagnosticLogId> {
        let entries = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Diagnostic Log Entries"),
            size: u64::from(capacity) * u64::from(stride),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let counter = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Diagnostic Log Counter"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let id = DiagnosticLogId::from_raw(self.logs.len() as u32);
        self.logs.push(GpuLog {
            entries,
            counter,
            capacity,
            stride,
            host_appends: 0,
        });
        Ok(id)
    }

    fn bind_diagnostic_log(&mut self, log: DiagnosticLogId) {
        self.bound_log = Some(log);
    }

    fn append_diagnostic(&mut self, entry: &[u8]) -> bool {
        let Some(log) = self.bound_log.and_then(|id| self.logs.get_mut(id.0 as usize)) else {
            return false;
        };
        let slot = log.host_appends;
        log.host_appends = log.host_appends.saturating_add(1);
        self.queue.write_buffer(&log.counter, 0, &log.host_appends.to_le_bytes());
        if slot >= log.capacity {
            return false;
        }

        let mut padded = vec![0u8; log.stride as usize];
        let len = entry.len().min(padded.len());
        padded[..len].copy_from_slice(&entry[..len]);
        let offset = u64::from(slot) * u64::from(log.stride);
        self.queue.write_buffer(&log.entries, offset, &padded);
        true
    }

    fn diagnostic_append_count(&mut self, log: DiagnosticLogId) -> Result<u32> {
        let counter = self.log(log)?.counter.clone();
        let bytes = self.read_buffer(&counter, 4)?;
        let word: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RenderError::DiagnosticReadback("short counter read".into()))?;
        Ok(u32::from_le_bytes(word))
    }

    fn read_diagnostic_log(&mut self, log: DiagnosticLogId, count: u32) -> Result<Vec<u8>> {
        let (entries, capacity, stride) = {
            let log = self.log(log)?;
            (log.entries.clone(), log.capacity, log.stride)
        };
        let size = u64::from(count.min(capacity)) * u64::from(stride);
        self.read_buffer(&entries, size)
    }

    fn reset_diagnostic_log(&mut self, log: DiagnosticLogId) {
        let Some(log) = self.logs.get_mut(log.0 as usize) else {
            return;
        };
        log.host_appends = 0;
        // Through the queue, so it stays ordered with host appends.
        self.queue.write_buffer(&log.counter, 0, &0u32.to_le_bytes());
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.flush();
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| RenderError::Device(format!("poll failed: {e:?}")))
    }

    fn begin_scope(&mut self, name: &str) {
        self.encoder().push_debug_group(name);
        self.open_scopes.push(name.to_string());
    }

    fn end_scope(&mut self) {
        // A flushed encoder already closed its groups.
        if self.open_scopes.pop().is_some()
            && let Some(encoder) = self.encoder.as_mut()
        {
            encoder.pop_debug_group();
        }
    }

    fn submit(&mut self) -> Result<()> {
        self.flush();
        Ok(())
    }
}
