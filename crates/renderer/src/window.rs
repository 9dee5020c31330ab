use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use lensing::{LensingParameters, OrbitCamera, Parameter, PlaybackClock, ViewportConfig};
use tracing::{debug, error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::context::{BackgroundSource, RenderContext};
use crate::error::RenderError;
use crate::gpu::WgpuDevice;
use crate::mode::ModeCoordinator;
use crate::scheduler::FramePacer;
use crate::types::{Antialiasing, PipelineOptions, PostSettings, RenderMode};

/// Pixels of trackpad scrolling that count as one wheel notch.
const PIXELS_PER_ZOOM_STEP: f64 = 50.0;

/// Everything the interactive window needs to start rendering.
#[derive(Debug)]
pub struct WindowConfig {
    pub title: String,
    pub size: (u32, u32),
    pub mode: RenderMode,
    pub target_fps: Option<f32>,
    pub antialiasing: Antialiasing,
    pub viewport: ViewportConfig,
    pub params: LensingParameters,
    pub options: PipelineOptions,
    pub post: PostSettings,
    pub background: BackgroundSource,
    pub camera: OrbitCamera,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Gargantua".to_string(),
            size: (1280, 720),
            mode: RenderMode::default(),
            target_fps: None,
            antialiasing: Antialiasing::default(),
            viewport: ViewportConfig::default(),
            params: LensingParameters::default(),
            options: PipelineOptions::default(),
            post: PostSettings::default(),
            background: BackgroundSource::Procedural,
            camera: OrbitCamera::default(),
        }
    }
}

/// Keyboard shortcuts of the interactive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    ToggleMode,
    ToggleAnnotations,
    Adjust(Parameter, i32),
    Exit,
}

pub(crate) fn action_for_key(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Tab) => Some(KeyAction::ToggleMode),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Exit),
        Key::Character(value) => match value.as_str() {
            "m" | "M" => Some(KeyAction::ToggleMode),
            "a" | "A" => Some(KeyAction::ToggleAnnotations),
            "[" => Some(KeyAction::Adjust(Parameter::DeflectionStrength, -1)),
            "]" => Some(KeyAction::Adjust(Parameter::DeflectionStrength, 1)),
            "-" => Some(KeyAction::Adjust(Parameter::DiskOpacity, -1)),
            "=" | "+" => Some(KeyAction::Adjust(Parameter::DiskOpacity, 1)),
            "," => Some(KeyAction::Adjust(Parameter::RotationSpeed, -1)),
            "." => Some(KeyAction::Adjust(Parameter::RotationSpeed, 1)),
            ";" => Some(KeyAction::Adjust(Parameter::PlaybackSpeed, -1)),
            "'" => Some(KeyAction::Adjust(Parameter::PlaybackSpeed, 1)),
            _ => None,
        },
        _ => None,
    }
}

/// Tracks the left-button drag that orbits the 3D camera.
#[derive(Debug, Default)]
struct MouseState {
    position: Option<PhysicalPosition<f64>>,
    is_pressed: bool,
}

impl MouseState {
    /// Returns the drag delta since the previous cursor event, if dragging.
    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
        let previous = self.position.replace(position);
        match (self.is_pressed, previous) {
            (true, Some(previous)) => Some(((position.x - previous.x) as f32, (position.y - previous.y) as f32)),
            _ => None,
        }
    }

    fn handle_button(&mut self, state: ElementState) {
        self.is_pressed = state == ElementState::Pressed;
    }
}

fn zoom_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => (position.y / PIXELS_PER_ZOOM_STEP) as f32,
    }
}

/// Field order matters: the coordinator owns the swapchain, which must be
/// dropped before the window it was created from.
struct WindowApp {
    coordinator: ModeCoordinator<WgpuDevice>,
    pacer: FramePacer,
    mouse: MouseState,
    scale_factor: f64,
    title: String,
    window: Arc<Window>,
}

impl WindowApp {
    fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return true;
        }
        let Some(action) = action_for_key(&event.logical_key) else {
            return true;
        };
        match action {
            KeyAction::Exit => return false,
            KeyAction::ToggleMode => {
                if event.repeat {
                    return true;
                }
                match self.coordinator.toggle() {
                    Ok(mode) => self.window.set_title(&format!("{} ({mode})", self.title)),
                    Err(err) => {
                        error!(error = %err, "failed to switch render mode");
                        return false;
                    }
                }
            }
            KeyAction::ToggleAnnotations => {
                if !event.repeat {
                    self.coordinator.toggle_annotations();
                }
            }
            KeyAction::Adjust(parameter, steps) => {
                self.coordinator.nudge_parameter(parameter, steps);
            }
        }
        true
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Err(err) = self.coordinator.resize(size.width, size.height, self.scale_factor) {
            warn!(error = %err, "failed to resize render targets");
        }
    }

    fn orbit(&mut self, dx: f32, dy: f32) {
        if self.coordinator.mode() != Some(RenderMode::Orbit) {
            return;
        }
        let height = self.coordinator.context().viewport().state().surface_size.1 as f32;
        self.coordinator.context_mut().camera_mut().rotate(dx, dy, height);
    }

    fn zoom(&mut self, steps: f32) {
        if self.coordinator.mode() == Some(RenderMode::Orbit) {
            self.coordinator.context_mut().camera_mut().zoom(steps);
        }
    }

    /// Renders one frame; returns false when the window should close.
    fn redraw(&mut self) -> bool {
        match self.coordinator.tick() {
            Ok(_) => {
                self.pacer.mark_rendered(Instant::now());
                true
            }
            Err(RenderError::Surface(loss)) if loss.needs_reconfigure() => {
                debug!(?loss, "reconfiguring surface");
                self.coordinator.context_mut().device_mut().reconfigure();
                true
            }
            Err(RenderError::Surface(loss)) if loss.is_fatal() => {
                error!("surface out of memory; exiting");
                false
            }
            Err(RenderError::Surface(loss)) => {
                warn!(?loss, "surface error; retrying next frame");
                true
            }
            Err(err) => {
                error!(error = %err, "frame failed");
                false
            }
        }
    }
}

/// Opens the interactive window and blocks until it is closed.
pub fn run_window(config: WindowConfig, clock: PlaybackClock) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(format!("{} ({})", config.title, config.mode))
        .with_inner_size(PhysicalSize::new(config.size.0.max(1), config.size.1.max(1)))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let size = window.inner_size();
    let device = WgpuDevice::new(window.as_ref(), size, config.antialiasing)?;
    info!(
        adapter = device.adapter_name(),
        sample_count = device.sample_count(),
        "renderer initialised"
    );
    let context = RenderContext::new(device, clock, config.viewport)
        .with_parameters(config.params)
        .with_options(config.options)
        .with_post_settings(config.post)
        .with_background(config.background)
        .with_camera(config.camera);
    let mut coordinator = ModeCoordinator::new(context);
    let scale_factor = window.scale_factor();
    coordinator.resize(size.width, size.height, scale_factor)?;
    coordinator.activate(config.mode)?;

    let mut app = WindowApp {
        coordinator,
        pacer: FramePacer::new(config.target_fps),
        mouse: MouseState::default(),
        scale_factor,
        title: config.title,
        window,
    };
    app.window.request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == app.window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    app.coordinator.shutdown();
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if !app.handle_key(&event) {
                        app.coordinator.shutdown();
                        elwt.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    if let Some((dx, dy)) = app.mouse.handle_cursor_moved(position) {
                        app.orbit(dx, dy);
                    }
                }
                WindowEvent::MouseInput {
                    state: button_state,
                    button: MouseButton::Left,
                    ..
                } => app.mouse.handle_button(button_state),
                WindowEvent::MouseWheel { delta, .. } => app.zoom(zoom_steps(delta)),
                WindowEvent::Resized(new_size) => app.resize(new_size),
                WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                    app.scale_factor = scale_factor;
                    let size = app.window.inner_size();
                    app.resize(size);
                }
                WindowEvent::RedrawRequested => {
                    if !app.redraw() {
                        app.coordinator.shutdown();
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                if app.pacer.ready_for_frame(now) {
                    app.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = app.pacer.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotkeys_map_to_actions() {
        let key = |value: &str| Key::Character(value.into());
        assert_eq!(action_for_key(&key("m")), Some(KeyAction::ToggleMode));
        assert_eq!(action_for_key(&Key::Named(NamedKey::Tab)), Some(KeyAction::ToggleMode));
        assert_eq!(
            action_for_key(&key("]")),
            Some(KeyAction::Adjust(Parameter::DeflectionStrength, 1))
        );
        assert_eq!(action_for_key(&key("-")), Some(KeyAction::Adjust(Parameter::DiskOpacity, -1)));
        assert_eq!(action_for_key(&key("'")), Some(KeyAction::Adjust(Parameter::PlaybackSpeed, 1)));
        assert_eq!(action_for_key(&Key::Named(NamedKey::Escape)), Some(KeyAction::Exit));
        assert_eq!(action_for_key(&key("q")), None);
    }

    #[test]
    fn drag_reports_deltas_only_while_pressed() {
        let mut mouse = MouseState::default();
        assert_eq!(mouse.handle_cursor_moved(PhysicalPosition::new(10.0, 10.0)), None);
        mouse.handle_button(ElementState::Pressed);
        assert_eq!(
            mouse.handle_cursor_moved(PhysicalPosition::new(14.0, 7.0)),
            Some((4.0, -3.0))
        );
        mouse.handle_button(ElementState::Released);
        assert_eq!(mouse.handle_cursor_moved(PhysicalPosition::new(20.0, 20.0)), None);
    }

    #[test]
    fn pixel_scrolling_is_scaled_to_notches() {
        assert_eq!(zoom_steps(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
        assert_eq!(
            zoom_steps(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -100.0))),
            -2.0
        );
    }
}
