use std::time::Instant;

/// Snapshot of the raw time state at the start of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f64,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f64, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f64(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Deterministic source advancing by a fixed step per sample.
///
/// Used by headless simulation and tests in place of the wall clock.
#[derive(Debug, Clone, Copy)]
pub struct ManualTimeSource {
    step: f64,
    now: f64,
    frame: u64,
}

impl ManualTimeSource {
    pub fn new(step_seconds: f64) -> Self {
        Self {
            step: step_seconds.max(0.0),
            now: 0.0,
            frame: 0,
        }
    }

    #[cfg(test)]
    fn starting_at(start_seconds: f64, step_seconds: f64) -> Self {
        Self {
            now: start_seconds,
            ..Self::new(step_seconds)
        }
    }
}

impl TimeSource for ManualTimeSource {
    fn reset(&mut self) {
        self.now = 0.0;
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.now, self.frame);
        self.now += self.step;
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Result of advancing the [`PlaybackClock`] by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    /// Playback-scaled time since the clock started.
    pub elapsed: f64,
    /// Playback-scaled time since the previous tick.
    pub delta: f64,
    pub frame_index: u64,
}

/// Scales the raw source by the playback multiplier.
///
/// The multiplier applies to each raw delta rather than to absolute time, so
/// changing speed mid-session never makes the animation jump. Accumulation
/// stays in `f64`.
pub struct PlaybackClock {
    source: BoxedTimeSource,
    last_raw: Option<f64>,
    elapsed: f64,
    frames: u64,
}

impl PlaybackClock {
    pub fn new(source: BoxedTimeSource) -> Self {
        Self {
            source,
            last_raw: None,
            elapsed: 0.0,
            frames: 0,
        }
    }

    pub fn system() -> Self {
        Self::new(Box::new(SystemTimeSource::new()))
    }

    /// Samples the source and advances by `raw_delta * playback_speed`.
    ///
    /// The first tick after construction or [`reset`](Self::reset) has a
    /// zero delta. Backwards steps of the source are treated as zero.
    pub fn advance(&mut self, playback_speed: f32) -> ClockTick {
        let sample = self.source.sample();
        let raw_delta = match self.last_raw {
            Some(previous) => (sample.seconds - previous).max(0.0),
            None => 0.0,
        };
        self.last_raw = Some(sample.seconds);
        let delta = raw_delta * f64::from(playback_speed.max(0.0));
        self.elapsed += delta;
        let tick = ClockTick {
            elapsed: self.elapsed,
            delta,
            frame_index: self.frames,
        };
        self.frames = self.frames.saturating_add(1);
        tick
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        self.source.reset();
        self.last_raw = None;
        self.elapsed = 0.0;
        self.frames = 0;
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("elapsed", &self.elapsed)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}
