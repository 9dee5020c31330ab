//! [`RenderDevice`] backed by a wgpu swapchain.

use std::collections::HashMap;

use anyhow::Result;
use bytemuck::Zeroable;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::bridge::SurfaceUniforms;
use crate::device::{DrawCall, RenderDevice, RenderExtent};
use crate::error::{RenderError, SurfaceLoss};
use crate::geometry::MeshData;
use crate::types::{
    Antialiasing, ColorTarget, PostSettings, ProgramDescriptor, ResourceHandle, ResourceKind, TextureData,
};

use super::context::{GpuContext, DEPTH_FORMAT, HDR_FORMAT};
use super::post::PostChain;
use super::programs::{build_surface_pipeline, capture_errors, SurfaceLayouts};

impl From<wgpu::SurfaceError> for SurfaceLoss {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost => SurfaceLoss::Lost,
            wgpu::SurfaceError::Outdated => SurfaceLoss::Outdated,
            wgpu::SurfaceError::Timeout => SurfaceLoss::Timeout,
            wgpu::SurfaceError::OutOfMemory => SurfaceLoss::OutOfMemory,
            _ => SurfaceLoss::Other,
        }
    }
}

struct Geometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct Program {
    pipeline: wgpu::RenderPipeline,
    target: ColorTarget,
}

struct Uniforms {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct Texture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

enum GpuResource {
    Geometry(Geometry),
    Program(Program),
    Uniforms(Uniforms),
    Texture(Texture),
    PostChain(Box<PostChain>),
}

impl GpuResource {
    fn kind(&self) -> ResourceKind {
        match self {
            GpuResource::Geometry(_) => ResourceKind::Geometry,
            GpuResource::Program(_) => ResourceKind::Program,
            GpuResource::Uniforms(_) => ResourceKind::UniformBuffer,
            GpuResource::Texture(_) => ResourceKind::Texture,
            GpuResource::PostChain(_) => ResourceKind::PostChain,
        }
    }
}

struct Entry {
    label: String,
    resource: GpuResource,
}

/// Depth and multisampled colour buffers for one scene pass.
struct PassTargets {
    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
}

/// Surface pass buffers match the swapchain; HDR pass buffers match the
/// capped scene size of the post chain.
struct FrameTargets {
    surface: PassTargets,
    hdr: PassTargets,
}

impl FrameTargets {
    fn new(gpu: &GpuContext, scene: (u32, u32)) -> Self {
        let output = (gpu.config.width, gpu.config.height);
        Self {
            surface: PassTargets::new(gpu, "surface pass", output, gpu.surface_format),
            hdr: PassTargets::new(gpu, "hdr pass", scene, HDR_FORMAT),
        }
    }

    fn for_target(&self, target: ColorTarget) -> &PassTargets {
        match target {
            ColorTarget::Surface => &self.surface,
            ColorTarget::Hdr => &self.hdr,
        }
    }
}

impl PassTargets {
    fn new(gpu: &GpuContext, label: &str, size: (u32, u32), format: wgpu::TextureFormat) -> Self {
        let size = wgpu::Extent3d {
            width: size.0.max(1),
            height: size.1.max(1),
            depth_or_array_layers: 1,
        };
        let make = |label: String, format: wgpu::TextureFormat| {
            gpu.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label.as_str()),
                    size,
                    mip_level_count: 1,
                    sample_count: gpu.sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        Self {
            depth_view: make(format!("{label} depth"), DEPTH_FORMAT),
            msaa_view: (gpu.sample_count > 1).then(|| make(format!("{label} msaa colour"), format)),
        }
    }
}

struct PendingFrame {
    clear_color: [f32; 4],
    draws: Vec<DrawCall>,
}

pub struct WgpuDevice {
    gpu: GpuContext,
    layouts: SurfaceLayouts,
    sampler: wgpu::Sampler,
    placeholder: Texture,
    targets: FrameTargets,
    scene_size: (u32, u32),
    resources: HashMap<ResourceHandle, Entry>,
    next_id: u64,
    frame: Option<PendingFrame>,
}

impl WgpuDevice {
    pub fn new<T>(target: &T, size: PhysicalSize<u32>, antialiasing: Antialiasing) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let gpu = GpuContext::new(target, size, antialiasing)?;
        let layouts = SurfaceLayouts::new(&gpu.device);
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("background sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let placeholder = upload_texture(
            &gpu,
            &layouts,
            &sampler,
            "placeholder texture",
            &TextureData {
                width: 1,
                height: 1,
                rgba: vec![0, 0, 0, 255],
            },
        );
        let scene_size = (gpu.config.width, gpu.config.height);
        let targets = FrameTargets::new(&gpu, scene_size);
        debug!(
            adapter = %gpu.adapter_name,
            format = ?gpu.surface_format,
            sample_count = gpu.sample_count,
            "GPU device ready"
        );
        Ok(Self {
            gpu,
            layouts,
            sampler,
            placeholder,
            targets,
            scene_size,
            resources: HashMap::new(),
            next_id: 1,
            frame: None,
        })
    }

    pub fn sample_count(&self) -> u32 {
        self.gpu.sample_count
    }

    pub fn adapter_name(&self) -> &str {
        &self.gpu.adapter_name
    }

    /// Reconfigures the swapchain at its current size after a lost or
    /// outdated surface.
    pub fn reconfigure(&mut self) {
        self.gpu.reconfigure();
    }

    fn insert(&mut self, kind: ResourceKind, label: &str, resource: GpuResource) -> ResourceHandle {
        let handle = ResourceHandle::new(kind, self.next_id);
        self.next_id += 1;
        self.resources.insert(
            handle,
            Entry {
                label: label.to_string(),
                resource,
            },
        );
        handle
    }

    fn format_for(&self, target: ColorTarget) -> wgpu::TextureFormat {
        match target {
            ColorTarget::Surface => self.gpu.surface_format,
            ColorTarget::Hdr => HDR_FORMAT,
        }
    }

    fn post_chain(&self, handle: ResourceHandle) -> Result<&PostChain, RenderError> {
        match self.resources.get(&handle).map(|entry| &entry.resource) {
            Some(GpuResource::PostChain(chain)) => Ok(chain),
            _ => Err(RenderError::UnknownResource(handle)),
        }
    }

    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &PendingFrame,
        target: ColorTarget,
        view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let pass_targets = self.targets.for_target(target);
        let (attachment, resolve_target) = match pass_targets.msaa_view.as_ref() {
            Some(msaa) => (msaa, Some(view)),
            None => (view, None),
        };
        let [r, g, b, a] = frame.clear_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: attachment,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(r),
                        g: f64::from(g),
                        b: f64::from(b),
                        a: f64::from(a),
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &pass_targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for call in &frame.draws {
            let program = match self.resources.get(&call.program).map(|entry| &entry.resource) {
                Some(GpuResource::Program(program)) => program,
                _ => return Err(RenderError::UnknownResource(call.program)),
            };
            if program.target != target {
                warn!(
                    program = ?call.program,
                    expected = ?target,
                    actual = ?program.target,
                    "skipping draw compiled for another colour target"
                );
                continue;
            }
            let geometry = match self.resources.get(&call.geometry).map(|entry| &entry.resource) {
                Some(GpuResource::Geometry(geometry)) => geometry,
                _ => return Err(RenderError::UnknownResource(call.geometry)),
            };
            let uniforms = match self.resources.get(&call.uniforms).map(|entry| &entry.resource) {
                Some(GpuResource::Uniforms(uniforms)) => uniforms,
                _ => return Err(RenderError::UnknownResource(call.uniforms)),
            };
            let texture = match call.texture {
                Some(handle) => match self.resources.get(&handle).map(|entry| &entry.resource) {
                    Some(GpuResource::Texture(texture)) => texture,
                    _ => return Err(RenderError::UnknownResource(handle)),
                },
                None => &self.placeholder,
            };

            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &uniforms.bind_group, &[]);
            pass.set_bind_group(1, &texture.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.vertices.slice(..));
            pass.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..geometry.index_count, 0, 0..1);
        }
        Ok(())
    }
}

fn upload_texture(
    gpu: &GpuContext,
    layouts: &SurfaceLayouts,
    sampler: &wgpu::Sampler,
    label: &str,
    data: &TextureData,
) -> Texture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layouts.texture_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Texture {
        _texture: texture,
        bind_group,
    }
}

impl RenderDevice for WgpuDevice {
    fn create_geometry(&mut self, label: &str, mesh: &MeshData) -> Result<ResourceHandle, RenderError> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RenderError::acquisition(ResourceKind::Geometry, label, "mesh has no vertices"));
        }
        let device = &self.gpu.device;
        let geometry = capture_errors(device, || Geometry {
            vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: mesh.indices.len() as u32,
        })
        .map_err(|reason| RenderError::acquisition(ResourceKind::Geometry, label, reason))?;
        Ok(self.insert(ResourceKind::Geometry, label, GpuResource::Geometry(geometry)))
    }

    fn create_program(
        &mut self,
        label: &str,
        descriptor: &ProgramDescriptor,
    ) -> Result<ResourceHandle, RenderError> {
        let format = self.format_for(descriptor.target);
        let pipeline = build_surface_pipeline(
            &self.gpu.device,
            &self.layouts,
            label,
            descriptor,
            format,
            self.gpu.sample_count,
        )
        .map_err(|reason| RenderError::acquisition(ResourceKind::Program, label, reason))?;
        let program = Program {
            pipeline,
            target: descriptor.target,
        };
        Ok(self.insert(ResourceKind::Program, label, GpuResource::Program(program)))
    }

    fn create_uniform_buffer(&mut self, label: &str) -> Result<ResourceHandle, RenderError> {
        let device = &self.gpu.device;
        let layout = &self.layouts.uniform_layout;
        let uniforms = capture_errors(device, || {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&SurfaceUniforms::zeroed()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            Uniforms { buffer, bind_group }
        })
        .map_err(|reason| RenderError::acquisition(ResourceKind::UniformBuffer, label, reason))?;
        Ok(self.insert(ResourceKind::UniformBuffer, label, GpuResource::Uniforms(uniforms)))
    }

    fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<ResourceHandle, RenderError> {
        let max = self.max_texture_dimension();
        if data.width == 0 || data.height == 0 || data.width > max || data.height > max {
            return Err(RenderError::acquisition(
                ResourceKind::Texture,
                label,
                format!("{}x{} exceeds device limit {max}", data.width, data.height),
            ));
        }
        if data.rgba.len() != (data.width as usize) * (data.height as usize) * 4 {
            return Err(RenderError::acquisition(
                ResourceKind::Texture,
                label,
                "pixel buffer does not match dimensions",
            ));
        }
        let (gpu, layouts, sampler) = (&self.gpu, &self.layouts, &self.sampler);
        let texture = capture_errors(&gpu.device, || upload_texture(gpu, layouts, sampler, label, data))
            .map_err(|reason| RenderError::acquisition(ResourceKind::Texture, label, reason))?;
        Ok(self.insert(ResourceKind::Texture, label, GpuResource::Texture(texture)))
    }

    fn create_post_chain(
        &mut self,
        label: &str,
        settings: &PostSettings,
    ) -> Result<ResourceHandle, RenderError> {
        let chain = PostChain::new(
            &self.gpu.device,
            &self.gpu.queue,
            *settings,
            self.gpu.surface_format,
            self.scene_size.0,
            self.scene_size.1,
        )
        .map_err(|reason| RenderError::acquisition(ResourceKind::PostChain, label, reason))?;
        Ok(self.insert(ResourceKind::PostChain, label, GpuResource::PostChain(Box::new(chain))))
    }

    fn write_uniforms(&mut self, buffer: ResourceHandle, uniforms: &SurfaceUniforms) -> Result<(), RenderError> {
        match self.resources.get(&buffer).map(|entry| &entry.resource) {
            Some(GpuResource::Uniforms(target)) => {
                self.gpu
                    .queue
                    .write_buffer(&target.buffer, 0, bytemuck::bytes_of(uniforms));
                Ok(())
            }
            _ => Err(RenderError::UnknownResource(buffer)),
        }
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<(), RenderError> {
        if self.frame.is_some() {
            return Err(RenderError::Device("begin_frame called twice".to_string()));
        }
        self.frame = Some(PendingFrame {
            clear_color,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, call: DrawCall) -> Result<(), RenderError> {
        match self.frame.as_mut() {
            Some(frame) => {
                frame.draws.push(call);
                Ok(())
            }
            None => Err(RenderError::Device("draw outside of a frame".to_string())),
        }
    }

    fn end_frame(&mut self, post: Option<ResourceHandle>) -> Result<(), RenderError> {
        let Some(frame) = self.frame.take() else {
            return Err(RenderError::Device("end_frame without begin_frame".to_string()));
        };
        let chain = post.map(|handle| self.post_chain(handle)).transpose()?;

        let output = self
            .gpu
            .surface
            .get_current_texture()
            .map_err(|err| RenderError::Surface(err.into()))?;
        let surface_view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });

        match chain {
            Some(chain) => {
                self.encode_scene(&mut encoder, &frame, ColorTarget::Hdr, chain.hdr_view())?;
                chain.encode(&mut encoder, &surface_view);
            }
            None => self.encode_scene(&mut encoder, &frame, ColorTarget::Surface, &surface_view)?,
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }

    fn abort_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            debug!(queued = frame.draws.len(), "frame aborted");
        }
    }

    fn release(&mut self, handle: ResourceHandle) -> Result<(), RenderError> {
        match self.resources.remove(&handle) {
            Some(entry) => {
                debug!(kind = ?entry.resource.kind(), label = %entry.label, "released GPU resource");
                Ok(())
            }
            None => Err(RenderError::UnknownResource(handle)),
        }
    }

    fn live_inventory(&self) -> Vec<(ResourceKind, String)> {
        let mut inventory: Vec<_> = self
            .resources
            .values()
            .map(|entry| (entry.resource.kind(), entry.label.clone()))
            .collect();
        inventory.sort();
        inventory
    }

    fn resize(&mut self, extent: RenderExtent) -> Result<(), RenderError> {
        if extent.is_degenerate() {
            let (width, height) = extent.output;
            return Err(RenderError::DegenerateViewport { width, height });
        }
        let max = self.max_texture_dimension();
        let output = PhysicalSize::new(extent.output.0.min(max), extent.output.1.min(max));
        let scene = (
            extent.scene.0.min(output.width),
            extent.scene.1.min(output.height),
        );
        if output == self.gpu.size && scene == self.scene_size {
            return Ok(());
        }
        if output != self.gpu.size {
            self.gpu.resize(output);
        }
        self.scene_size = scene;
        self.targets = FrameTargets::new(&self.gpu, scene);
        for entry in self.resources.values_mut() {
            if let GpuResource::PostChain(chain) = &mut entry.resource {
                chain.resize(&self.gpu.device, &self.gpu.queue, scene.0, scene.1);
            }
        }
        debug!(output = ?extent.output, scene = ?scene, "render targets resized");
        Ok(())
    }

    fn max_texture_dimension(&self) -> u32 {
        self.gpu.max_texture_dimension()
    }
}
