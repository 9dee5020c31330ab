//! wgpu backend: surface setup, GLSL programs, the bloom chain and the
//! [`RenderDevice`](crate::device::RenderDevice) implementation driving them.

mod context;
mod device;
mod post;
mod programs;
mod shaders;

pub use device::WgpuDevice;
