//! Headless frame driver.
//!
//! ```text
//! headless_frame [settings.json] [frames]
//! ```
//!
//! Renders `frames` frames (default 4) of the reference pass set, selects the
//! `LinearDepth` debug channel once it has been discovered, and prints pool
//! statistics and the drained diagnostic log after every frame. The final
//! pass logs the centre pixel, so each frame prints one log line. Built with
//! `--features gpu` the frames go through wgpu instead of the CPU device.

use anyhow::Context;
use vesper::frame::DEBUG_LINEAR_DEPTH;
use vesper::prelude::*;
use vesper::surface::{TextureFormat, allocate_surface_set};

const DEFAULT_FRAMES: u32 = 4;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => RendererSettings::from_path(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => RendererSettings::with_resolution(640, 360),
    };
    let frames = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid frame count '{n}'"))?,
        None => DEFAULT_FRAMES,
    };

    #[cfg(feature = "gpu")]
    let mut gpu = vesper::WgpuDevice::new()?;
    #[cfg(not(feature = "gpu"))]
    let mut gpu = HeadlessDevice::new();

    run(&mut gpu, settings, frames)
}

fn run(gpu: &mut dyn RenderDevice, mut settings: RendererSettings, frames: u32) -> anyhow::Result<()> {
    settings.gpu_debug = true;
    let scene = StaticScene::default();
    let target = allocate_surface_set(
        gpu,
        &SurfaceDescriptor::color(TextureFormat::Rgba8Unorm, settings.width, settings.height),
        "Output",
    )?;
    let passes = PassSet::reference_with_pixel_log(settings.width / 2, settings.height / 2);
    let mut orchestrator = FrameOrchestrator::new(gpu, settings, passes, &scene)?;
    let mut timer = Timer::new();

    for _ in 0..frames {
        let time = timer.tick();
        orchestrator.render_frame(gpu, &scene, time, &target)?;

        if orchestrator.debug_mut().take_ui_rebuild() {
            log::info!("Debug channels: {:?}", orchestrator.debug().channels());
            orchestrator
                .debug_mut()
                .select(DEBUG_LINEAR_DEPTH, DebugMode::Raw);
        }

        let stats = orchestrator.pool().stats();
        println!(
            "frame {:>3}: pooled sets {} (idle {}, outstanding {}), acquires {}",
            orchestrator.frame_number(),
            stats.allocated,
            stats.idle,
            stats.outstanding,
            stats.acquires,
        );

        let log = orchestrator.drain_diagnostics(gpu)?;
        if !log.is_empty() {
            print!("{log}");
        }
    }

    log::info!("Rendered {} frames", orchestrator.frame_number());
    Ok(())
}
