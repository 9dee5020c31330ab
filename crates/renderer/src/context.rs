//! Explicit state shared by the scheduler and the mode coordinator.

use std::path::PathBuf;

use lensing::{
    LensingParameters, OrbitCamera, PlaybackClock, Projection, ViewportConfig, ViewportTracker,
};

use crate::bridge::{CameraState, UniformBridge};
use crate::device::RenderDevice;
use crate::pipeline::{ModePipeline, PipelineSetup};
use crate::texture::TextureLoad;
use crate::types::{PipelineOptions, PostSettings, RenderMode};

/// Where the 2D background comes from.
pub enum BackgroundSource {
    Procedural,
    File(PathBuf),
    /// Caller-supplied loads, one per pipeline build.
    Loader(Box<dyn FnMut() -> TextureLoad + Send>),
}

impl std::fmt::Debug for BackgroundSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundSource::Procedural => f.write_str("Procedural"),
            BackgroundSource::File(path) => f.debug_tuple("File").field(path).finish(),
            BackgroundSource::Loader(_) => f.write_str("Loader(..)"),
        }
    }
}

pub(crate) fn projection_for(mode: RenderMode) -> Projection {
    match mode {
        RenderMode::Flat => Projection::Quad,
        RenderMode::Orbit => Projection::Orbit,
    }
}

/// Device, parameters, clock, viewport and the active pipeline.
pub struct RenderContext<D: RenderDevice> {
    pub(crate) device: D,
    pub(crate) params: LensingParameters,
    pub(crate) clock: PlaybackClock,
    pub(crate) viewport: ViewportTracker,
    pub(crate) camera: OrbitCamera,
    pub(crate) options: PipelineOptions,
    pub(crate) post: PostSettings,
    pub(crate) background: BackgroundSource,
    pub(crate) bridge: UniformBridge,
    pub(crate) pipeline: Option<ModePipeline>,
}

impl<D: RenderDevice> RenderContext<D> {
    pub fn new(device: D, clock: PlaybackClock, viewport: ViewportConfig) -> Self {
        Self {
            device,
            params: LensingParameters::default(),
            clock,
            viewport: ViewportTracker::new(viewport, Projection::Orbit),
            camera: OrbitCamera::default(),
            options: PipelineOptions::default(),
            post: PostSettings::default(),
            background: BackgroundSource::Procedural,
            bridge: UniformBridge,
            pipeline: None,
        }
    }

    pub fn with_parameters(mut self, params: LensingParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_background(mut self, background: BackgroundSource) -> Self {
        self.background = background;
        self
    }

    pub fn with_post_settings(mut self, post: PostSettings) -> Self {
        self.post = post;
        self
    }

    pub fn with_camera(mut self, camera: OrbitCamera) -> Self {
        self.camera = camera;
        self
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn params(&self) -> &LensingParameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut LensingParameters {
        &mut self.params
    }

    pub fn viewport(&self) -> &ViewportTracker {
        &self.viewport
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn pipeline(&self) -> Option<&ModePipeline> {
        self.pipeline.as_ref()
    }

    /// Playback speed the clock runs at this frame.
    pub fn effective_playback_speed(&self) -> f32 {
        if self.options.speed_controllable {
            self.params.playback_speed()
        } else {
            1.0
        }
    }

    /// Camera for the active mode at the current viewport.
    pub(crate) fn camera_state(&mut self, mode: RenderMode) -> CameraState {
        let state = self.viewport.state();
        match mode {
            RenderMode::Flat => ModePipeline::flat_camera(state),
            RenderMode::Orbit => {
                self.camera.update();
                CameraState {
                    view_projection: self.camera.view_projection(state.aspect_ratio),
                    position: self.camera.eye(),
                }
            }
        }
    }

    pub(crate) fn pipeline_setup(&mut self, mode: RenderMode) -> PipelineSetup {
        let background = match (mode, self.options.texture_backed) {
            (RenderMode::Flat, true) => self.background_load(),
            _ => None,
        };
        PipelineSetup {
            options: self.options,
            post: self.post,
            background,
        }
    }

    fn background_load(&mut self) -> Option<TextureLoad> {
        match &mut self.background {
            BackgroundSource::Procedural => None,
            BackgroundSource::File(path) => {
                match TextureLoad::spawn(path.clone(), self.device.max_texture_dimension()) {
                    Ok(load) => Some(load),
                    Err(err) => {
                        tracing::warn!(error = %err, "could not start background load");
                        None
                    }
                }
            }
            BackgroundSource::Loader(loader) => Some(loader()),
        }
    }

    /// Disposes the active pipeline, if any.
    pub(crate) fn teardown(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.dispose(&mut self.device);
        }
    }
}

impl<D: RenderDevice + std::fmt::Debug> std::fmt::Debug for RenderContext<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("device", &self.device)
            .field("params", &self.params)
            .field("options", &self.options)
            .field("background", &self.background)
            .field("pipeline", &self.pipeline.as_ref().map(ModePipeline::mode))
            .finish_non_exhaustive()
    }
}
