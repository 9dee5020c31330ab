use std::io::Cursor;

use crossbeam_channel::bounded;
use lensing::{ManualTimeSource, Parameter, PlaybackClock, ViewportConfig};
use renderer::types::TextureData;
use renderer::{
    BackgroundSource, FrameOutcome, HeadlessDevice, ModeCoordinator, PipelineOptions, RenderContext, RenderDevice,
    RenderMode, SurfaceState, TextureLoad,
};

fn context(background: BackgroundSource) -> RenderContext<HeadlessDevice> {
    let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(1.0 / 60.0)));
    RenderContext::new(HeadlessDevice::new(640, 360), clock, ViewportConfig::default())
        .with_background(background)
}

fn uniforms_of(coordinator: &ModeCoordinator<HeadlessDevice>, label: &str) -> renderer::SurfaceUniforms {
    let buffer = coordinator
        .pipeline()
        .and_then(|pipeline| pipeline.surface(label))
        .and_then(|surface| surface.uniform_buffer())
        .unwrap();
    coordinator
        .device()
        .last_frame()
        .unwrap()
        .draws
        .iter()
        .find(|draw| draw.call.uniforms == buffer)
        .and_then(|draw| draw.uniforms)
        .unwrap()
}

#[test]
fn never_resolving_background_keeps_quad_uninitialized() {
    let mut coordinator = ModeCoordinator::new(context(BackgroundSource::Loader(Box::new(TextureLoad::never))));
    coordinator.activate(RenderMode::Flat).unwrap();
    for _ in 0..100 {
        assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Presented { drawn: 0 });
    }
    let quad = coordinator.pipeline().unwrap().surface("lens-quad").unwrap();
    assert_eq!(quad.state(), SurfaceState::Uninitialized);
    assert_eq!(coordinator.scheduler().frames(), 100);
    assert_eq!(coordinator.device().presented_frames(), 100);
}

#[test]
fn background_arriving_later_makes_quad_ready() {
    let (sender, receiver) = bounded(1);
    let mut receiver = Some(receiver);
    let loader = move || match receiver.take() {
        Some(receiver) => TextureLoad::from_receiver(receiver),
        None => TextureLoad::never(),
    };
    let mut coordinator = ModeCoordinator::new(context(BackgroundSource::Loader(Box::new(loader))));
    coordinator.activate(RenderMode::Flat).unwrap();
    assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Presented { drawn: 0 });

    sender
        .send(Ok(TextureData {
            width: 2,
            height: 1,
            rgba: vec![255; 8],
        }))
        .unwrap();
    assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Presented { drawn: 1 });
    let frame = coordinator.device().last_frame().unwrap();
    assert!(frame.draws[0].call.texture.is_some());
    assert_eq!(uniforms_of(&coordinator, "lens-quad").background[0], 1.0);
}

#[test]
fn failed_background_skips_quad_but_frames_continue() {
    let (sender, receiver) = bounded(1);
    let mut receiver = Some(receiver);
    let loader = move || match receiver.take() {
        Some(receiver) => TextureLoad::from_receiver(receiver),
        None => TextureLoad::never(),
    };
    let mut coordinator = ModeCoordinator::new(context(BackgroundSource::Loader(Box::new(loader))));
    coordinator.activate(RenderMode::Flat).unwrap();
    sender.send(Err("corrupt image".to_string())).unwrap();
    for _ in 0..5 {
        assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Presented { drawn: 0 });
    }
    let quad = coordinator.pipeline().unwrap().surface("lens-quad").unwrap();
    assert!(quad.is_skipped());
}

#[test]
fn procedural_background_draws_immediately() {
    let mut coordinator = ModeCoordinator::new(
        context(BackgroundSource::Procedural).with_options(PipelineOptions {
            texture_backed: false,
            ..PipelineOptions::default()
        }),
    );
    coordinator.activate(RenderMode::Flat).unwrap();
    assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Presented { drawn: 1 });
    assert_eq!(uniforms_of(&coordinator, "lens-quad").background[0], 0.0);
}

#[test]
fn background_file_is_decoded_off_thread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sky.png");
    let mut bytes = Vec::new();
    image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(&path, bytes).unwrap();

    let mut coordinator = ModeCoordinator::new(context(BackgroundSource::File(path)));
    coordinator.activate(RenderMode::Flat).unwrap();
    let mut drawn = 0;
    for _ in 0..500 {
        if let FrameOutcome::Presented { drawn: count } = coordinator.tick().unwrap() {
            drawn = count;
        }
        if drawn == 1 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert_eq!(drawn, 1);
    assert!(coordinator
        .device()
        .live_inventory()
        .iter()
        .any(|(_, label)| label == "lens-quad.background"));
}

#[test]
fn parameter_changes_apply_on_the_next_frame() {
    let mut coordinator = ModeCoordinator::new(context(BackgroundSource::Procedural));
    coordinator.activate(RenderMode::Orbit).unwrap();

    coordinator.set_parameter(Parameter::DiskOpacity, 0.1).unwrap();
    coordinator.tick().unwrap();
    assert!((uniforms_of(&coordinator, "accretion-disk").opacity() - 0.1).abs() < 1.0e-6);

    coordinator.set_parameter(Parameter::DiskOpacity, 1.0).unwrap();
    coordinator.tick().unwrap();
    assert!((uniforms_of(&coordinator, "accretion-disk").opacity() - 1.0).abs() < 1.0e-6);
    // The warped disk keeps its own fixed opacity.
    assert!((uniforms_of(&coordinator, "warped-disk").opacity() - 0.3).abs() < 1.0e-6);
}

#[test]
fn playback_speed_scales_shader_time() {
    let mut coordinator = ModeCoordinator::new(context(BackgroundSource::Procedural));
    coordinator.activate(RenderMode::Orbit).unwrap();
    coordinator.set_parameter(Parameter::PlaybackSpeed, 3.0).unwrap();
    // The first frame has a zero delta; ten more advance 10/60 s of raw time.
    for _ in 0..11 {
        coordinator.tick().unwrap();
    }
    let time = uniforms_of(&coordinator, "accretion-disk").params[0];
    assert!((time - 0.5).abs() < 1.0e-4, "time was {time}");
}
