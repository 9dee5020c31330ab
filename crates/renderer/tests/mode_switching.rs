use lensing::{ManualTimeSource, PlaybackClock, ViewportConfig};
use renderer::{
    FrameOutcome, HeadlessDevice, ModeCoordinator, ModeState, RenderContext, RenderDevice, RenderMode,
};

fn coordinator(width: u32, height: u32) -> ModeCoordinator<HeadlessDevice> {
    let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(1.0 / 60.0)));
    let mut coordinator = ModeCoordinator::new(RenderContext::new(
        HeadlessDevice::new(width, height),
        clock,
        ViewportConfig::default(),
    ));
    coordinator.resize(width, height, 1.0).unwrap();
    coordinator
}

#[test]
fn round_trip_leaves_identical_inventory() {
    let mut coordinator = coordinator(800, 600);
    coordinator.activate(RenderMode::Orbit).unwrap();
    for _ in 0..3 {
        coordinator.tick().unwrap();
    }
    let before = coordinator.device().live_inventory();

    coordinator.activate(RenderMode::Flat).unwrap();
    coordinator.tick().unwrap();
    coordinator.activate(RenderMode::Orbit).unwrap();
    coordinator.tick().unwrap();

    assert_eq!(coordinator.device().live_inventory(), before);
    assert_eq!(coordinator.state(), ModeState::Mode3DActive);
}

#[test]
fn orbit_mode_draws_every_layer_through_bloom() {
    let mut coordinator = coordinator(800, 600);
    coordinator.activate(RenderMode::Orbit).unwrap();
    let outcome = coordinator.tick().unwrap();
    assert_eq!(outcome, FrameOutcome::Presented { drawn: 4 });

    let pipeline = coordinator.pipeline().unwrap();
    let frame = coordinator.device().last_frame().unwrap();
    assert!(frame.post.is_some());
    assert_eq!(frame.post, pipeline.post_chain());

    let order: Vec<_> = frame
        .draws
        .iter()
        .map(|draw| {
            pipeline
                .surfaces()
                .iter()
                .find(|surface| surface.uniform_buffer() == Some(draw.call.uniforms))
                .map(|surface| surface.label().to_string())
                .unwrap()
        })
        .collect();
    assert_eq!(
        order,
        ["event-horizon", "photon-sphere", "warped-disk", "accretion-disk"]
    );
}

#[test]
fn flat_mode_presents_without_post_chain() {
    let mut coordinator = coordinator(640, 480);
    coordinator.activate(RenderMode::Flat).unwrap();
    coordinator.tick().unwrap();
    let frame = coordinator.device().last_frame().unwrap();
    assert_eq!(frame.post, None);
    assert_eq!(frame.clear_color, [0.0, 0.0, 0.0, 1.0]);
    assert!(coordinator
        .device()
        .live_inventory()
        .iter()
        .all(|(_, label)| label.starts_with("lens-quad")));
}

#[test]
fn resize_between_switches_reaches_the_device() {
    let mut coordinator = coordinator(640, 480);
    coordinator.activate(RenderMode::Orbit).unwrap();
    coordinator.resize(1920, 1080, 1.0).unwrap();
    coordinator.activate(RenderMode::Flat).unwrap();
    assert_eq!(coordinator.device().size(), (1920, 1080));

    let viewport = coordinator.context().viewport().state();
    assert_eq!(viewport.resolution(), (1920, 1080));
    assert!((viewport.aspect_ratio - 16.0 / 9.0).abs() < 1.0e-6);
}

#[test]
fn shutdown_and_reactivate() {
    let mut coordinator = coordinator(320, 240);
    coordinator.activate(RenderMode::Flat).unwrap();
    coordinator.shutdown();
    assert_eq!(coordinator.device().live_count(), 0);
    assert_eq!(coordinator.toggle().unwrap(), RenderMode::Orbit);
    assert!(coordinator.device().live_count() > 0);
}
