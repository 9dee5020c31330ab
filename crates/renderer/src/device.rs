//! Backend seam between the frame logic and the GPU.
//!
//! Everything above this trait (surfaces, pipelines, the scheduler, mode
//! switching) is backend-agnostic; `gpu::WgpuDevice` drives a real swapchain
//! and [`HeadlessDevice`](crate::headless::HeadlessDevice) records calls for
//! simulation and tests.

use lensing::ViewportState;

use crate::bridge::SurfaceUniforms;
use crate::error::RenderError;
use crate::geometry::MeshData;
use crate::types::{PostSettings, ProgramDescriptor, ResourceHandle, ResourceKind, TextureData};

/// One surface draw queued between `begin_frame` and `end_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub program: ResourceHandle,
    pub geometry: ResourceHandle,
    pub uniforms: ResourceHandle,
    pub texture: Option<ResourceHandle>,
}

/// Sizes a device is resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderExtent {
    /// Physical window size; the swapchain is configured at exactly this.
    pub output: (u32, u32),
    /// Offscreen scene targets. Smaller than `output` when the pixel ratio
    /// is capped; the post chain scales the result up to `output`.
    pub scene: (u32, u32),
}

impl RenderExtent {
    pub fn from_viewport(state: &ViewportState) -> Self {
        Self {
            output: state.surface_size,
            scene: state.resolution(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.output.0 == 0 || self.output.1 == 0 || self.scene.0 == 0 || self.scene.1 == 0
    }
}

pub trait RenderDevice {
    fn create_geometry(&mut self, label: &str, mesh: &MeshData) -> Result<ResourceHandle, RenderError>;

    fn create_program(
        &mut self,
        label: &str,
        descriptor: &ProgramDescriptor,
    ) -> Result<ResourceHandle, RenderError>;

    fn create_uniform_buffer(&mut self, label: &str) -> Result<ResourceHandle, RenderError>;

    fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<ResourceHandle, RenderError>;

    /// Bloom and tone-mapping chain rendering from the HDR scene target.
    fn create_post_chain(&mut self, label: &str, settings: &PostSettings)
        -> Result<ResourceHandle, RenderError>;

    fn write_uniforms(&mut self, buffer: ResourceHandle, uniforms: &SurfaceUniforms) -> Result<(), RenderError>;

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<(), RenderError>;

    /// Queues a draw; draws execute in submission order.
    fn draw(&mut self, call: DrawCall) -> Result<(), RenderError>;

    /// Executes the queued draws, runs `post` if given and presents.
    fn end_frame(&mut self, post: Option<ResourceHandle>) -> Result<(), RenderError>;

    /// Drops the open frame without presenting. No-op when none is open.
    fn abort_frame(&mut self);

    /// Frees one resource. Releasing an unknown handle is an error.
    fn release(&mut self, handle: ResourceHandle) -> Result<(), RenderError>;

    /// Labels of every live resource, sorted by kind then label.
    fn live_inventory(&self) -> Vec<(ResourceKind, String)>;

    fn resize(&mut self, extent: RenderExtent) -> Result<(), RenderError>;

    /// Largest texture edge the device accepts.
    fn max_texture_dimension(&self) -> u32;
}
