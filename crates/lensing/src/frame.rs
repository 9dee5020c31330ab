use crate::clock::ClockTick;
use crate::viewport::ViewportState;

/// Per-frame snapshot handed to every consumer of one frame.
///
/// Built once by the frame scheduler and dropped when the frame completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub elapsed_seconds: f64,
    pub delta_seconds: f64,
    pub resolution: (u32, u32),
    pub device_pixel_scale: f32,
    pub frame_index: u64,
}

impl FrameContext {
    pub fn new(tick: ClockTick, viewport: &ViewportState) -> Self {
        Self {
            elapsed_seconds: tick.elapsed,
            delta_seconds: tick.delta,
            resolution: viewport.resolution(),
            device_pixel_scale: viewport.device_pixel_scale,
            frame_index: tick.frame_index,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.resolution;
        width.max(1) as f32 / height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::{Projection, ViewportConfig, ViewportTracker};

    #[test]
    fn context_mirrors_tick_and_viewport() {
        let mut tracker = ViewportTracker::new(ViewportConfig::default(), Projection::Quad);
        tracker.resize(1280, 720, 1.0);
        let tick = ClockTick {
            elapsed: 12.5,
            delta: 0.016,
            frame_index: 7,
        };
        let frame = FrameContext::new(tick, tracker.state());
        assert_eq!(frame.resolution, (1280, 720));
        assert_eq!(frame.elapsed_seconds, 12.5);
        assert_eq!(frame.frame_index, 7);
        assert!((frame.aspect_ratio() - 16.0 / 9.0).abs() < 1.0e-6);
    }
}
