//! Per-frame orchestration.
//!
//! [`FrameScheduler::tick`] runs one frame against a [`RenderContext`]:
//! advance the clock, snapshot the frame, poll pending loads, refresh and draw
//! every Ready surface in order, run the post chain and present.
//! [`FramePacer`] decides when the window loop should ask for the next frame.

use std::time::{Duration, Instant};

use lensing::FrameContext;
use tracing::debug;

use crate::context::RenderContext;
use crate::device::RenderDevice;
use crate::error::RenderError;
use crate::surface::FrameInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { drawn: usize },
    /// The scheduler is cancelled or no pipeline is active.
    Skipped,
}

#[derive(Debug)]
pub struct FrameScheduler {
    cancelled: bool,
    frames: u64,
    stats: FrameStats,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            cancelled: false,
            frames: 0,
            stats: FrameStats::new(Instant::now()),
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn resume(&mut self) {
        self.cancelled = false;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Frames presented since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tick<D: RenderDevice>(&mut self, ctx: &mut RenderContext<D>) -> Result<FrameOutcome, RenderError> {
        if self.cancelled {
            return Ok(FrameOutcome::Skipped);
        }
        let Some(mode) = ctx.pipeline.as_ref().map(|pipeline| pipeline.mode()) else {
            return Ok(FrameOutcome::Skipped);
        };

        let tick = ctx.clock.advance(ctx.effective_playback_speed());
        let frame = FrameContext::new(tick, ctx.viewport.state());
        let camera = ctx.camera_state(mode);
        let quad_size = ctx.viewport.state().quad_size;

        let RenderContext {
            device,
            params,
            bridge,
            pipeline,
            ..
        } = ctx;
        let Some(pipeline) = pipeline.as_mut() else {
            return Ok(FrameOutcome::Skipped);
        };

        pipeline.poll_pending(device);

        let inputs = FrameInputs {
            frame: &frame,
            params,
            camera,
            quad_size,
        };
        for surface in pipeline.surfaces_mut() {
            surface.refresh(bridge, device, &inputs)?;
        }

        device.begin_frame(pipeline.clear_color())?;
        let mut drawn = 0;
        for surface in pipeline.surfaces() {
            match surface.draw(device) {
                Ok(true) => drawn += 1,
                Ok(false) => {}
                Err(err) => {
                    device.abort_frame();
                    return Err(err);
                }
            }
        }
        device.end_frame(pipeline.post_chain())?;

        self.frames += 1;
        self.stats.record(Instant::now(), &frame, drawn);
        Ok(FrameOutcome::Presented { drawn })
    }
}

#[derive(Debug)]
struct FrameStats {
    last_update: Instant,
    frames_since_update: u32,
    frames_per_second: f32,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            last_update: now,
            frames_since_update: 0,
            frames_per_second: 0.0,
        }
    }

    fn record(&mut self, now: Instant, frame: &FrameContext, drawn: usize) {
        self.frames_since_update += 1;
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed >= Duration::from_secs(1) {
            self.frames_per_second = self.frames_since_update as f32 / elapsed.as_secs_f32();
            self.frames_since_update = 0;
            self.last_update = now;
            debug!(
                fps = self.frames_per_second.round(),
                frame_index = frame.frame_index,
                time = frame.elapsed_seconds,
                drawn,
                "render stats"
            );
        }
    }
}

/// Frame-rate cap for the window loop. `None` renders on every redraw.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_render: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: Option<f32>) -> Self {
        let interval = fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps));
        Self {
            interval,
            last_render: None,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_render) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.interval, self.last_render) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_render = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use lensing::{ManualTimeSource, PlaybackClock, ViewportConfig};

    use super::*;
    use crate::headless::HeadlessDevice;
    use crate::pipeline::ModePipeline;
    use crate::types::RenderMode;

    fn context() -> RenderContext<HeadlessDevice> {
        let clock = PlaybackClock::new(Box::new(ManualTimeSource::new(0.5)));
        let mut ctx = RenderContext::new(HeadlessDevice::new(800, 600), clock, ViewportConfig::default());
        ctx.viewport.resize(800, 600, 1.0);
        let setup = ctx.pipeline_setup(RenderMode::Orbit);
        ctx.pipeline = Some(ModePipeline::build(RenderMode::Orbit, &mut ctx.device, setup));
        ctx
    }

    #[test]
    fn tick_draws_ready_surfaces_in_order() {
        let mut ctx = context();
        let mut scheduler = FrameScheduler::new();
        let outcome = scheduler.tick(&mut ctx).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { drawn: 4 });
        let frame = ctx.device().last_frame().unwrap();
        assert_eq!(frame.draws.len(), 4);
        assert!(frame.post.is_some());
        assert!(frame.draws.iter().all(|draw| draw.uniforms.is_some()));
    }

    #[test]
    fn cancelled_scheduler_presents_nothing() {
        let mut ctx = context();
        let mut scheduler = FrameScheduler::new();
        scheduler.cancel();
        assert_eq!(scheduler.tick(&mut ctx).unwrap(), FrameOutcome::Skipped);
        assert_eq!(ctx.device().presented_frames(), 0);
        scheduler.resume();
        scheduler.tick(&mut ctx).unwrap();
        assert_eq!(scheduler.frames(), 1);
    }

    #[test]
    fn failed_draw_closes_the_frame() {
        let mut ctx = context();
        let mut scheduler = FrameScheduler::new();
        let program = ctx
            .pipeline()
            .and_then(|pipeline| pipeline.surface("photon-sphere"))
            .and_then(|surface| surface.descriptor().program)
            .unwrap();
        ctx.device_mut().release(program).unwrap();

        assert!(matches!(scheduler.tick(&mut ctx), Err(RenderError::UnknownResource(_))));
        assert_eq!(ctx.device().presented_frames(), 0);
        assert_eq!(scheduler.frames(), 0);
        ctx.device_mut().begin_frame([0.0; 4]).unwrap();
        ctx.device_mut().end_frame(None).unwrap();
        assert_eq!(ctx.device().presented_frames(), 1);
    }

    #[test]
    fn pinned_speed_ignores_playback_parameter() {
        let mut ctx = context();
        ctx.options.speed_controllable = false;
        ctx.params_mut().set_playback_speed(3.0).unwrap();
        let mut scheduler = FrameScheduler::new();
        for _ in 0..3 {
            scheduler.tick(&mut ctx).unwrap();
        }
        assert!((ctx.clock().elapsed() - 1.0).abs() < 1.0e-9);
    }

    #[test]
    fn pacer_waits_for_interval() {
        let mut pacer = FramePacer::new(Some(4.0));
        let start = Instant::now();
        assert!(pacer.ready_for_frame(start));
        pacer.mark_rendered(start);
        assert!(!pacer.ready_for_frame(start + Duration::from_millis(100)));
        assert!(pacer.ready_for_frame(start + Duration::from_millis(250)));
        assert_eq!(pacer.next_deadline(), Some(start + Duration::from_millis(250)));

        let unpaced = FramePacer::new(None);
        assert!(unpaced.next_deadline().is_none());
    }
}
