//! Frame Orchestration Tests
//!
//! Tests for:
//! - End-to-end frames on the headless device
//! - Pass ordering, with and without depth of field
//! - One-time shadow rendering
//! - Profiling scopes
//! - Pool balance after successful and failed frames
//! - Temporal slot advance and constant updates across frames

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use wgpu::TextureFormat;

use vesper::frame::{MOTION_VECTORS, RESOLVED_COLOR};
use vesper::passes::reference::{FnPass, StaticScene};
use vesper::surface::allocate_surface_set;
use vesper::{
    FrameOrchestrator, FrameTime, HeadlessDevice, PassSet, RenderError, RendererSettings,
    SurfaceDescriptor, SurfaceSet, SurfaceSetId,
};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn target(gpu: &mut HeadlessDevice, width: u32, height: u32) -> SurfaceSet {
    allocate_surface_set(
        gpu,
        &SurfaceDescriptor::color(TextureFormat::Rgba8Unorm, width, height),
        "Swapchain",
    )
    .unwrap()
}

fn frame_time(frame: u32) -> FrameTime {
    FrameTime::new(1.0 / 60.0, frame as f32 / 60.0)
}

/// Quantises like an RGBA8 store.
fn rgba8(color: [f32; 4]) -> [f32; 4] {
    color.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() / 255.0)
}

type PassLog = Rc<RefCell<Vec<&'static str>>>;

fn recording_pass(log: &PassLog, name: &'static str) -> Box<FnPass> {
    let log = Rc::clone(log);
    Box::new(FnPass::new(name, move |_, _, _| {
        log.borrow_mut().push(name);
        Ok(())
    }))
}

fn recording_set(log: &PassLog) -> PassSet {
    PassSet {
        shadow: recording_pass(log, "Shadow"),
        depth_prepass: recording_pass(log, "DepthPrepass"),
        motion_vectors: recording_pass(log, "MotionVectors"),
        linearize_depth: recording_pass(log, "LinearizeDepth"),
        ambient_occlusion: recording_pass(log, "SSAO"),
        volumetric_fog: recording_pass(log, "Fog"),
        forward: recording_pass(log, "Forward"),
        sky: recording_pass(log, "Sky"),
        depth_of_field: recording_pass(log, "DOF"),
        luminance: recording_pass(log, "Luminance"),
        hdr_resolve: recording_pass(log, "HDR"),
        temporal_resolve: recording_pass(log, "Temporal"),
        anti_aliasing: recording_pass(log, "FXAA"),
    }
}

/// Destination and source ids seen by one pass invocation.
type WiringLog = Rc<RefCell<Vec<(&'static str, SurfaceSetId, Vec<SurfaceSetId>)>>>;

fn wiring_pass(log: &WiringLog, name: &'static str) -> Box<FnPass> {
    let log = Rc::clone(log);
    Box::new(FnPass::new(name, move |_, dst, sources| {
        let ids = sources.iter().map(|s| s.id()).collect();
        log.borrow_mut().push((name, dst.id(), ids));
        Ok(())
    }))
}

// ============================================================================
// End-to-End
// ============================================================================

#[test]
fn full_hd_frame_balances_pool() {
    init_logger();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(1920, 1080),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 1920, 1080);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    let stats = orchestrator.pool().stats();
    assert_eq!(stats.outstanding, 0);
    assert_eq!(stats.acquires, stats.releases);
    assert_eq!(orchestrator.frame_number(), 1);
    assert_eq!(gpu.submit_count(), 1);
}

#[test]
fn output_is_scene_color_in_output_format() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(32, 18),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 32, 18);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    let expected = rgba8(scene.color);
    let texel = gpu.texel(&output, 31, 17);
    for (got, want) in texel.iter().zip(expected) {
        assert!(approx(*got, want), "expected {expected:?}, got {texel:?}");
    }
}

#[test]
fn output_with_dof_matches_output_without() {
    let scene = StaticScene::default();
    let render = |coc: f32| {
        let mut gpu = HeadlessDevice::new();
        let mut settings = RendererSettings::with_resolution(16, 16);
        settings.dof_coc_scale = coc;
        let mut orchestrator =
            FrameOrchestrator::new(&mut gpu, settings, PassSet::reference(), &scene).unwrap();
        let output = target(&mut gpu, 16, 16);
        orchestrator
            .render_frame(&mut gpu, &scene, frame_time(0), &output)
            .unwrap();
        gpu.texel(&output, 0, 0)
    };

    assert_eq!(render(0.0), render(1.5));
}

// ============================================================================
// Pass Ordering
// ============================================================================

#[test]
fn pass_order_without_dof() {
    let log = PassLog::default();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        recording_set(&log),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    assert_eq!(
        *log.borrow(),
        [
            "Shadow",
            "DepthPrepass",
            "MotionVectors",
            "LinearizeDepth",
            "SSAO",
            "Fog",
            "Forward",
            "Sky",
            "Luminance",
            "HDR",
            "Temporal",
            "FXAA",
        ]
    );
}

#[test]
fn passes_receive_their_frame_graph_inputs() {
    let log = WiringLog::default();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut passes = PassSet::reference();
    passes.motion_vectors = wiring_pass(&log, "MotionVectors");
    passes.linearize_depth = wiring_pass(&log, "LinearizeDepth");
    passes.ambient_occlusion = wiring_pass(&log, "SSAO");
    passes.temporal_resolve = wiring_pass(&log, "Temporal");
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        passes,
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);
    let mv_current = orchestrator.temporal().current(MOTION_VECTORS).unwrap().id();
    let mv_history = orchestrator.temporal().history(MOTION_VECTORS).unwrap().id();

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    let log = log.borrow();
    let find = |name: &str| log.iter().find(|(n, _, _)| *n == name).unwrap();
    let (_, mv_dst, _) = find("MotionVectors");
    let (_, linear_depth, _) = find("LinearizeDepth");
    let (_, _, ssao_sources) = find("SSAO");
    let (_, _, temporal_sources) = find("Temporal");

    assert_eq!(*mv_dst, mv_current);
    assert_eq!(*ssao_sources, [*linear_depth, mv_current]);
    assert_eq!(temporal_sources.len(), 4);
    assert_eq!(temporal_sources[2..], [mv_current, mv_history]);
}

#[test]
fn dof_runs_between_sky_and_luminance() {
    let log = PassLog::default();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut settings = RendererSettings::with_resolution(8, 8);
    settings.dof_coc_scale = 2.0;
    let mut orchestrator =
        FrameOrchestrator::new(&mut gpu, settings, recording_set(&log), &scene).unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    let order = log.borrow();
    let position = |name| order.iter().position(|n| *n == name).unwrap();
    assert_eq!(position("DOF"), position("Sky") + 1);
    assert_eq!(position("Luminance"), position("DOF") + 1);
}

#[test]
fn dof_toggled_at_runtime() {
    let log = PassLog::default();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        recording_set(&log),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();
    assert!(!log.borrow().contains(&"DOF"));

    orchestrator.set_dof_coc_scale(0.5);
    log.borrow_mut().clear();
    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(1), &output)
        .unwrap();
    assert!(log.borrow().contains(&"DOF"));
    assert!(approx(
        orchestrator.constants().post_effects.data.dof_coc_scale,
        0.5
    ));
}

#[test]
fn shadow_rendered_only_on_first_frame() {
    let log = PassLog::default();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        recording_set(&log),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);
    assert!(!orchestrator.shadows_initialized());

    for frame in 0..3 {
        orchestrator
            .render_frame(&mut gpu, &scene, frame_time(frame), &output)
            .unwrap();
    }

    assert!(orchestrator.shadows_initialized());
    let shadows = log.borrow().iter().filter(|n| **n == "Shadow").count();
    assert_eq!(shadows, 1);
    let fxaa = log.borrow().iter().filter(|n| **n == "FXAA").count();
    assert_eq!(fxaa, 3);
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn frame_opens_three_named_scopes() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    assert_eq!(
        gpu.scope_names(),
        ["DepthPrepass", "MainForwardRender", "PostEffects"]
    );
    assert_eq!(gpu.open_scopes(), 0);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn failing_pass_releases_surfaces_and_skips_advance() {
    init_logger();
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut passes = PassSet::reference();
    passes.temporal_resolve = Box::new(FnPass::new("ResolveTemporal", |_, _, _| {
        Err(RenderError::pass("ResolveTemporal", "shader compile failed"))
    }));
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        passes,
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    let err = orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap_err();

    assert!(matches!(
        err,
        RenderError::PassFailed {
            pass: "ResolveTemporal",
            ..
        }
    ));
    assert_eq!(orchestrator.pool().stats().outstanding, 0);
    assert_eq!(orchestrator.frame_number(), 0);
    assert_eq!(orchestrator.temporal().phase(RESOLVED_COLOR).unwrap(), 0);
    assert_eq!(gpu.open_scopes(), 0);
    assert_eq!(gpu.submit_count(), 0);
}

#[test]
fn exhausted_pool_cap_fails_frame() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut settings = RendererSettings::with_resolution(8, 8);
    settings.max_pooled_sets = Some(2);
    let mut orchestrator =
        FrameOrchestrator::new(&mut gpu, settings, PassSet::reference(), &scene).unwrap();
    let output = target(&mut gpu, 8, 8);

    let err = orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap_err();

    assert!(matches!(err, RenderError::PoolExhausted { limit: 2 }));
    assert_eq!(orchestrator.pool().stats().outstanding, 0);
    assert_eq!(orchestrator.pool().stats().idle, 2);
}

// ============================================================================
// Cross-Frame State
// ============================================================================

#[test]
fn pool_reaches_steady_state_after_first_frame() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();
    let after_first = gpu.surface_sets_created();
    let allocated = orchestrator.pool().stats().allocated;

    for frame in 1..10 {
        orchestrator
            .render_frame(&mut gpu, &scene, frame_time(frame), &output)
            .unwrap();
    }

    assert_eq!(gpu.surface_sets_created(), after_first);
    assert_eq!(orchestrator.pool().stats().allocated, allocated);
    assert_eq!(orchestrator.pool().stats().outstanding, 0);
}

#[test]
fn temporal_slots_advance_once_per_frame() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);
    let first_current = orchestrator.temporal().current(RESOLVED_COLOR).unwrap().id();

    for frame in 0..5 {
        orchestrator
            .render_frame(&mut gpu, &scene, frame_time(frame), &output)
            .unwrap();
        let expected_phase = (frame + 1) % 2;
        assert_eq!(
            orchestrator.temporal().phase(RESOLVED_COLOR).unwrap(),
            expected_phase
        );
        assert_eq!(
            orchestrator.temporal().phase(MOTION_VECTORS).unwrap(),
            expected_phase
        );
    }

    // Odd number of frames: last frame's current is now history.
    assert_eq!(
        orchestrator.temporal().history(RESOLVED_COLOR).unwrap().id(),
        first_current
    );
}

#[test]
fn frame_jitter_flag_follows_phase() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    let mut flags = Vec::new();
    for frame in 0..4 {
        orchestrator
            .render_frame(&mut gpu, &scene, frame_time(frame), &output)
            .unwrap();
        flags.push(orchestrator.constants().viewport.data.frame_jitter);
    }

    assert_eq!(flags, [1.0, 0.0, 1.0, 0.0]);
}

#[test]
fn previous_view_projection_lags_camera_motion() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut settings = RendererSettings::with_resolution(8, 8);
    settings.temporal_aa = false;
    let mut orchestrator =
        FrameOrchestrator::new(&mut gpu, settings, PassSet::reference(), &scene).unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();
    let first_vp = orchestrator.constants().current_viewport.data.view_projection;

    orchestrator.viewport_camera_mut().move_input = Vec3::X;
    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(1), &output)
        .unwrap();

    let constants = orchestrator.constants();
    assert_eq!(constants.viewport.data.prev_view_projection, first_vp);
    assert_ne!(constants.current_viewport.data.view_projection, first_vp);
}

#[test]
fn constant_buffers_uploaded_every_frame() {
    let mut gpu = HeadlessDevice::new();
    let scene = StaticScene::default();
    let mut orchestrator = FrameOrchestrator::new(
        &mut gpu,
        RendererSettings::with_resolution(8, 8),
        PassSet::reference(),
        &scene,
    )
    .unwrap();
    let output = target(&mut gpu, 8, 8);

    orchestrator
        .render_frame(&mut gpu, &scene, frame_time(0), &output)
        .unwrap();

    for name in [
        "GlobalViewportBuffer",
        "CurrentViewport",
        "ForwardPassBuffer",
        "PostEffects",
    ] {
        assert!(gpu.constants(name).is_some(), "missing upload of {name}");
    }
    assert_eq!(
        gpu.constants("GlobalViewportBuffer").unwrap().len(),
        std::mem::size_of::<vesper::constants::ViewportConstants>()
    );
}
