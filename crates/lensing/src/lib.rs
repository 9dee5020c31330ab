//! GPU-free core of the Gargantua renderer.
//!
//! Everything in this crate is plain math and state so it can be exercised
//! without a device:
//! - `kernel` approximates light deflection near the hole and the emission of
//!   the horizon, photon sphere and accretion disk. The GLSL programs in the
//!   `renderer` crate mirror these formulas.
//! - `params` holds the user-facing `LensingParameters` and their ranges.
//! - `clock` provides monotonic time sources and the playback-scaled clock.
//! - `viewport` tracks output size changes and derives quad/camera geometry.
//! - `frame` defines the per-frame `FrameContext`.
//! - `orbit` implements the damped orbit camera used by the 3D view.

pub mod clock;
pub mod frame;
pub mod kernel;
pub mod orbit;
pub mod params;
pub mod viewport;

pub use clock::{
    BoxedTimeSource, ClockTick, ManualTimeSource, PlaybackClock, SystemTimeSource, TimeSample,
    TimeSource,
};
pub use frame::FrameContext;
pub use kernel::{Emission, LensProfile};
pub use orbit::{OrbitCamera, OrbitSettings};
pub use params::{LensingParameters, Parameter, ParameterError, ParameterRange};
pub use viewport::{Projection, ResizeOutcome, ViewportConfig, ViewportState, ViewportTracker};
