//! Rendering side of Gargantua.
//!
//! Two pipelines share one device: a full-screen 2D lensing pass over a
//! background, and a 3D scene of layered surfaces (horizon, photon sphere,
//! accretion disks) composited through a bloom chain. The flow per frame is:
//!
//! ```text
//!   winit event loop ──▶ ModeCoordinator::tick ──▶ FrameScheduler
//!                                                     │ FrameContext
//!                                                     ▼
//!                         UniformBridge::refresh ──▶ RenderDevice::draw
//! ```
//!
//! Everything above [`RenderDevice`] is backend-agnostic. [`gpu::WgpuDevice`]
//! drives a real swapchain; [`HeadlessDevice`] records frames for simulation
//! and tests.

pub mod annotations;
pub mod bridge;
pub mod context;
pub mod device;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub mod mode;
pub mod pipeline;
pub mod scheduler;
pub mod surface;
pub mod texture;
pub mod types;
mod window;

pub use bridge::{SurfaceDescriptor, SurfaceUniforms, UniformBridge};
pub use context::{BackgroundSource, RenderContext};
pub use device::{DrawCall, RenderDevice, RenderExtent};
pub use error::{RenderError, SurfaceLoss};
pub use headless::HeadlessDevice;
pub use mode::{ModeCoordinator, ModeState};
pub use pipeline::ModePipeline;
pub use scheduler::{FrameOutcome, FramePacer, FrameScheduler};
pub use surface::{RenderSurface, SurfaceState};
pub use texture::{TextureLoad, TexturePoll};
pub use types::{Antialiasing, PipelineOptions, PostSettings, RenderMode};
pub use window::{run_window, WindowConfig};
