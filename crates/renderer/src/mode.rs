//! Mode coordinator: owns the render context and switches between the 2D and
//! 3D pipelines.
//!
//! Only one pipeline holds device resources at a time. A switch cancels the
//! scheduler, disposes the current pipeline, reconfigures the viewport for the
//! new camera model, builds the new pipeline and resumes.

use lensing::{LensingParameters, Parameter, ParameterError, ResizeOutcome};

use crate::annotations;
use crate::context::{projection_for, RenderContext};
use crate::device::{RenderDevice, RenderExtent};
use crate::error::RenderError;
use crate::pipeline::ModePipeline;
use crate::scheduler::{FrameOutcome, FrameScheduler};
use crate::types::RenderMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Inactive,
    Mode2DActive,
    Mode3DActive,
}

impl ModeState {
    pub fn mode(self) -> Option<RenderMode> {
        match self {
            ModeState::Inactive => None,
            ModeState::Mode2DActive => Some(RenderMode::Flat),
            ModeState::Mode3DActive => Some(RenderMode::Orbit),
        }
    }

    fn active(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Flat => ModeState::Mode2DActive,
            RenderMode::Orbit => ModeState::Mode3DActive,
        }
    }
}

pub struct ModeCoordinator<D: RenderDevice> {
    context: RenderContext<D>,
    scheduler: FrameScheduler,
    state: ModeState,
    annotations_shown: bool,
}

impl<D: RenderDevice> ModeCoordinator<D> {
    pub fn new(context: RenderContext<D>) -> Self {
        Self {
            context,
            scheduler: FrameScheduler::new(),
            state: ModeState::Inactive,
            annotations_shown: false,
        }
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn mode(&self) -> Option<RenderMode> {
        self.state.mode()
    }

    pub fn context(&self) -> &RenderContext<D> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<D> {
        &mut self.context
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn pipeline(&self) -> Option<&ModePipeline> {
        self.context.pipeline()
    }

    pub fn device(&self) -> &D {
        self.context.device()
    }

    /// Makes `mode` the active pipeline. Activating the current mode is a
    /// no-op.
    pub fn activate(&mut self, mode: RenderMode) -> Result<(), RenderError> {
        if self.state.mode() == Some(mode) {
            return Ok(());
        }
        let previous = self.state.mode();
        self.scheduler.cancel();
        self.context.teardown();
        self.state = ModeState::Inactive;

        if let ResizeOutcome::Changed = self.context.viewport.reconfigure(projection_for(mode)) {
            let extent = RenderExtent::from_viewport(self.context.viewport.state());
            self.context.device.resize(extent)?;
        }
        let setup = self.context.pipeline_setup(mode);
        let pipeline = ModePipeline::build(mode, &mut self.context.device, setup);
        self.context.pipeline = Some(pipeline);
        self.state = ModeState::active(mode);
        self.scheduler.resume();
        tracing::info!(from = ?previous, to = %mode, "render mode activated");
        if !self.annotations_shown && self.annotations_enabled() {
            annotations::log_annotations();
            self.annotations_shown = true;
        }
        Ok(())
    }

    /// Switches to the other mode; from Inactive this activates 3D.
    pub fn toggle(&mut self) -> Result<RenderMode, RenderError> {
        let next = match self.state.mode() {
            Some(mode) => mode.other(),
            None => RenderMode::default(),
        };
        self.activate(next)?;
        Ok(next)
    }

    /// Tears down the active pipeline and stops rendering.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel();
        self.context.teardown();
        if self.state != ModeState::Inactive {
            tracing::info!("renderer shut down");
        }
        self.state = ModeState::Inactive;
        self.annotations_shown = false;
    }

    pub fn tick(&mut self) -> Result<FrameOutcome, RenderError> {
        if self.state == ModeState::Inactive {
            return Ok(FrameOutcome::Skipped);
        }
        self.scheduler.tick(&mut self.context)
    }

    /// Applies a window resize in physical pixels.
    pub fn resize(&mut self, width: u32, height: u32, scale_factor: f64) -> Result<ResizeOutcome, RenderError> {
        let outcome = self.context.viewport.resize(width, height, scale_factor);
        match outcome {
            ResizeOutcome::Changed => {
                let extent = RenderExtent::from_viewport(self.context.viewport.state());
                self.context.device.resize(extent)?;
                tracing::debug!(output = ?extent.output, scene = ?extent.scene, "viewport resized");
            }
            ResizeOutcome::Degenerate => {
                tracing::debug!(width, height, "ignoring degenerate resize");
            }
            ResizeOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    pub fn params(&self) -> &LensingParameters {
        self.context.params()
    }

    pub fn set_parameter(&mut self, parameter: Parameter, value: f32) -> Result<f32, ParameterError> {
        let applied = self.context.params_mut().set(parameter, value)?;
        tracing::debug!(parameter = parameter.name(), value = applied, "parameter set");
        Ok(applied)
    }

    /// Moves a parameter by `steps` increments and logs the new value.
    pub fn nudge_parameter(&mut self, parameter: Parameter, steps: i32) -> f32 {
        let value = self.context.params_mut().adjust(parameter, steps);
        tracing::info!(parameter = parameter.name(), value, "parameter adjusted");
        value
    }

    pub fn toggle_annotations(&mut self) -> bool {
        let visible = self.context.params_mut().toggle_annotations();
        if !self.context.options().annotations {
            tracing::debug!("annotations are disabled for this pipeline");
        } else if visible {
            annotations::log_annotations();
        } else {
            tracing::info!("annotations hidden");
        }
        self.annotations_shown = self.annotations_enabled();
        visible
    }

    /// Whether the annotation list is currently on display.
    pub fn annotations_shown(&self) -> bool {
        self.annotations_shown
    }

    fn annotations_enabled(&self) -> bool {
        self.context.options().annotations && self.context.params().annotations_visible()
    }
}

impl<D: RenderDevice> Drop for ModeCoordinator<D> {
    fn drop(&mut self) {
        self.context.teardown();
    }
}

#[cfg(test)]
mod tests {
    use lensing::{ManualTimeSource, PlaybackClock, ViewportConfig};

    use super::*;
    use crate::headless::HeadlessDevice;

    fn coordinator() -> ModeCoordinator<HeadlessDevice> {
        let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(1.0 / 60.0)));
        ModeCoordinator::new(RenderContext::new(
            HeadlessDevice::new(640, 480),
            clock,
            ViewportConfig::default(),
        ))
    }

    #[test]
    fn starts_inactive_and_toggles_into_3d() {
        let mut coordinator = coordinator();
        assert_eq!(coordinator.state(), ModeState::Inactive);
        assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Skipped);
        assert_eq!(coordinator.toggle().unwrap(), RenderMode::Orbit);
        assert_eq!(coordinator.state(), ModeState::Mode3DActive);
        assert_eq!(coordinator.toggle().unwrap(), RenderMode::Flat);
        assert_eq!(coordinator.state(), ModeState::Mode2DActive);
    }

    #[test]
    fn switching_releases_previous_mode() {
        let mut coordinator = coordinator();
        coordinator.activate(RenderMode::Orbit).unwrap();
        assert!(coordinator
            .device()
            .live_inventory()
            .iter()
            .any(|(_, label)| label.starts_with("accretion-disk")));
        coordinator.activate(RenderMode::Flat).unwrap();
        let inventory = coordinator.device().live_inventory();
        assert!(inventory.iter().all(|(_, label)| label.starts_with("lens-quad")));
        assert_eq!(
            coordinator.context().viewport().projection(),
            lensing::Projection::Quad
        );
    }

    #[test]
    fn shutdown_leaves_nothing_alive() {
        let mut coordinator = coordinator();
        coordinator.activate(RenderMode::Orbit).unwrap();
        coordinator.tick().unwrap();
        coordinator.shutdown();
        assert_eq!(coordinator.device().live_count(), 0);
        assert_eq!(coordinator.tick().unwrap(), FrameOutcome::Skipped);
    }

    #[test]
    fn degenerate_resize_is_ignored() {
        let mut coordinator = coordinator();
        coordinator.resize(1024, 768, 1.0).unwrap();
        assert_eq!(coordinator.resize(1024, 0, 1.0).unwrap(), ResizeOutcome::Degenerate);
        assert_eq!(coordinator.device().size(), (1024, 768));
    }

    #[test]
    fn visible_annotations_are_shown_on_first_activation() {
        let mut params = LensingParameters::default();
        params.set_annotations_visible(true);
        let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(1.0 / 60.0)));
        let context = RenderContext::new(HeadlessDevice::new(640, 480), clock, ViewportConfig::default())
            .with_parameters(params);
        let mut coordinator = ModeCoordinator::new(context);
        assert!(!coordinator.annotations_shown());

        coordinator.activate(RenderMode::Orbit).unwrap();
        assert!(coordinator.annotations_shown());
        assert!(!coordinator.toggle_annotations());
        assert!(!coordinator.annotations_shown());
    }

    #[test]
    fn disabled_annotations_stay_hidden() {
        let mut params = LensingParameters::default();
        params.set_annotations_visible(true);
        let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(1.0 / 60.0)));
        let context = RenderContext::new(HeadlessDevice::new(640, 480), clock, ViewportConfig::default())
            .with_parameters(params)
            .with_options(crate::types::PipelineOptions {
                annotations: false,
                ..Default::default()
            });
        let mut coordinator = ModeCoordinator::new(context);
        coordinator.activate(RenderMode::Flat).unwrap();
        assert!(!coordinator.annotations_shown());
    }

    #[test]
    fn capped_pixel_ratio_shrinks_only_the_scene_targets() {
        let mut coordinator = coordinator();
        // 1000x500 logical at scale 3.0; the default cap is 2.0.
        coordinator.resize(3000, 1500, 3.0).unwrap();
        assert_eq!(coordinator.device().size(), (3000, 1500));
        assert_eq!(coordinator.device().scene_size(), (2000, 1000));
        assert_eq!(coordinator.context().viewport().state().resolution(), (2000, 1000));

        coordinator.resize(2000, 1000, 2.0).unwrap();
        assert_eq!(coordinator.device().size(), (2000, 1000));
        assert_eq!(coordinator.device().scene_size(), (2000, 1000));
    }
}
