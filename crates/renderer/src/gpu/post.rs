//! Bloom and tone-mapping chain of the 3D pipeline.
//!
//! The scene renders into a full-resolution `Rgba16Float` target. A bright
//! pass extracts luminance above the threshold into a half-resolution buffer,
//! a separable Gaussian blur ping-pongs between two half-resolution buffers,
//! and the composite adds the bloom to the scene and applies ACES filmic tone
//! mapping into the swapchain. Each pass has its own uniform buffer, so all
//! four can be encoded into one command buffer.

use bytemuck::{Pod, Zeroable};
use wgpu::naga::ShaderStage;

use crate::types::PostSettings;

use super::context::HDR_FORMAT;
use super::programs::{compile_glsl, make_post_pipeline};
use super::shaders::{self, PostPass};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct PostUniforms {
    /// Source texel size in xy, blur direction in zw.
    texel_direction: [f32; 4],
    /// Threshold, smoothing, bloom intensity, exposure.
    settings: [f32; 4],
}

impl PostUniforms {
    fn new(settings: &PostSettings, source_size: (u32, u32), direction: [f32; 2]) -> Self {
        Self {
            texel_direction: [
                1.0 / source_size.0.max(1) as f32,
                1.0 / source_size.1.max(1) as f32,
                direction[0],
                direction[1],
            ],
            settings: [
                settings.luminance_threshold,
                settings.luminance_smoothing,
                settings.bloom_intensity,
                settings.exposure,
            ],
        }
    }
}

/// Offscreen colour targets: the HDR scene and two half-resolution bloom
/// buffers.
struct RenderTargets {
    _hdr: wgpu::Texture,
    hdr_view: wgpu::TextureView,
    _bloom_a: wgpu::Texture,
    bloom_a_view: wgpu::TextureView,
    _bloom_b: wgpu::Texture,
    bloom_b_view: wgpu::TextureView,
    size: (u32, u32),
    bloom_size: (u32, u32),
}

impl RenderTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let bloom_size = ((width / 2).max(1), (height / 2).max(1));
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let (hdr, hdr_view) = create_color_texture(device, "hdr scene", width, height, usage);
        let (bloom_a, bloom_a_view) = create_color_texture(device, "bloom a", bloom_size.0, bloom_size.1, usage);
        let (bloom_b, bloom_b_view) = create_color_texture(device, "bloom b", bloom_size.0, bloom_size.1, usage);
        Self {
            _hdr: hdr,
            hdr_view,
            _bloom_a: bloom_a,
            bloom_a_view,
            _bloom_b: bloom_b,
            bloom_b_view,
            size: (width, height),
            bloom_size,
        }
    }
}

fn create_color_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

struct PassUniforms {
    bright: wgpu::Buffer,
    blur_horizontal: wgpu::Buffer,
    blur_vertical: wgpu::Buffer,
    composite: wgpu::Buffer,
}

struct PassBindGroups {
    bright: wgpu::BindGroup,
    blur_horizontal: wgpu::BindGroup,
    blur_vertical: wgpu::BindGroup,
    composite_scene: wgpu::BindGroup,
    composite_bloom: wgpu::BindGroup,
}

pub(crate) struct PostChain {
    settings: PostSettings,
    source_layout: wgpu::BindGroupLayout,
    bloom_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    uniforms: PassUniforms,
    targets: RenderTargets,
    bind_groups: PassBindGroups,
}

impl PostChain {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: PostSettings,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, String> {
        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post source layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let bloom_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post bloom layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let single_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post pass layout"),
            bind_group_layouts: &[&source_layout],
            push_constant_ranges: &[],
        });
        let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post composite layout"),
            bind_group_layouts: &[&source_layout, &bloom_layout],
            push_constant_ranges: &[],
        });

        let vertex = compile_glsl(
            device,
            "post fullscreen vertex",
            ShaderStage::Vertex,
            shaders::FULLSCREEN_VERTEX.to_string(),
        )?;
        let bright_fragment = compile_glsl(
            device,
            "bright pass",
            ShaderStage::Fragment,
            shaders::post_fragment_source(PostPass::Bright),
        )?;
        let blur_fragment = compile_glsl(
            device,
            "blur pass",
            ShaderStage::Fragment,
            shaders::post_fragment_source(PostPass::Blur),
        )?;
        let composite_fragment = compile_glsl(
            device,
            "composite pass",
            ShaderStage::Fragment,
            shaders::post_fragment_source(PostPass::Composite),
        )?;

        let bright_pipeline =
            make_post_pipeline(device, "bright pipeline", &single_layout, &vertex, &bright_fragment, HDR_FORMAT)?;
        let blur_pipeline =
            make_post_pipeline(device, "blur pipeline", &single_layout, &vertex, &blur_fragment, HDR_FORMAT)?;
        let composite_pipeline = make_post_pipeline(
            device,
            "composite pipeline",
            &composite_layout,
            &vertex,
            &composite_fragment,
            output_format,
        )?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("post sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<PostUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let uniforms = PassUniforms {
            bright: uniform_buffer("bright uniforms"),
            blur_horizontal: uniform_buffer("blur horizontal uniforms"),
            blur_vertical: uniform_buffer("blur vertical uniforms"),
            composite: uniform_buffer("composite uniforms"),
        };

        let targets = RenderTargets::new(device, width, height);
        let bind_groups = create_bind_groups(device, &source_layout, &bloom_layout, &sampler, &uniforms, &targets);

        let chain = Self {
            settings,
            source_layout,
            bloom_layout,
            sampler,
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            uniforms,
            targets,
            bind_groups,
        };
        chain.write_uniforms(queue);
        Ok(chain)
    }

    pub(crate) fn hdr_view(&self) -> &wgpu::TextureView {
        &self.targets.hdr_view
    }

    pub(crate) fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        if (width.max(1), height.max(1)) == self.targets.size {
            return;
        }
        self.targets = RenderTargets::new(device, width, height);
        self.bind_groups = create_bind_groups(
            device,
            &self.source_layout,
            &self.bloom_layout,
            &self.sampler,
            &self.uniforms,
            &self.targets,
        );
        self.write_uniforms(queue);
    }

    fn write_uniforms(&self, queue: &wgpu::Queue) {
        let settings = &self.settings;
        let writes = [
            (&self.uniforms.bright, PostUniforms::new(settings, self.targets.size, [0.0, 0.0])),
            (
                &self.uniforms.blur_horizontal,
                PostUniforms::new(settings, self.targets.bloom_size, [1.0, 0.0]),
            ),
            (
                &self.uniforms.blur_vertical,
                PostUniforms::new(settings, self.targets.bloom_size, [0.0, 1.0]),
            ),
            (&self.uniforms.composite, PostUniforms::new(settings, self.targets.size, [0.0, 0.0])),
        ];
        for (buffer, uniforms) in writes {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        }
    }

    /// Encodes bright, blur and composite passes ending in `output`.
    pub(crate) fn encode(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let clear = wgpu::Color::BLACK;
        let groups = &self.bind_groups;
        blit(encoder, "bright pass", &self.targets.bloom_a_view, clear, &self.bright_pipeline, &groups.bright, None);
        blit(
            encoder,
            "blur horizontal",
            &self.targets.bloom_b_view,
            clear,
            &self.blur_pipeline,
            &groups.blur_horizontal,
            None,
        );
        blit(
            encoder,
            "blur vertical",
            &self.targets.bloom_a_view,
            clear,
            &self.blur_pipeline,
            &groups.blur_vertical,
            None,
        );
        blit(
            encoder,
            "composite",
            output,
            clear,
            &self.composite_pipeline,
            &groups.composite_scene,
            Some(&groups.composite_bloom),
        );
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_bind_groups(
    device: &wgpu::Device,
    source_layout: &wgpu::BindGroupLayout,
    bloom_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    uniforms: &PassUniforms,
    targets: &RenderTargets,
) -> PassBindGroups {
    let source = |label: &str, view: &wgpu::TextureView, buffer: &wgpu::Buffer| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: source_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
        })
    };
    PassBindGroups {
        bright: source("bright source", &targets.hdr_view, &uniforms.bright),
        blur_horizontal: source("blur horizontal source", &targets.bloom_a_view, &uniforms.blur_horizontal),
        blur_vertical: source("blur vertical source", &targets.bloom_b_view, &uniforms.blur_vertical),
        composite_scene: source("composite scene", &targets.hdr_view, &uniforms.composite),
        composite_bloom: device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite bloom"),
            layout: bloom_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.bloom_a_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }),
    }
}

fn blit(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    clear: wgpu::Color,
    pipeline: &wgpu::RenderPipeline,
    bind_group0: &wgpu::BindGroup,
    bind_group1: Option<&wgpu::BindGroup>,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group0, &[]);
    if let Some(group) = bind_group1 {
        pass.set_bind_group(1, group, &[]);
    }
    pass.draw(0..3, 0..1);
}
