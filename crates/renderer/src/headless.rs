//! Recording device with no GPU behind it.
//!
//! Used by `gargantua simulate` and the test-suite: every resource is tracked
//! by label, uniform writes are kept, and each presented frame is recorded with
//! the uniforms its draws saw at submission time.

use std::collections::{BTreeMap, HashMap};

use crate::bridge::SurfaceUniforms;
use crate::device::{DrawCall, RenderDevice, RenderExtent};
use crate::error::RenderError;
use crate::geometry::MeshData;
use crate::types::{PostSettings, ProgramDescriptor, ResourceHandle, ResourceKind, TextureData};

pub const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub call: DrawCall,
    pub uniforms: Option<SurfaceUniforms>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub clear_color: [f32; 4],
    pub draws: Vec<RecordedDraw>,
    pub post: Option<ResourceHandle>,
}

#[derive(Debug, Clone)]
struct Resource {
    kind: ResourceKind,
    label: String,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    resources: BTreeMap<ResourceHandle, Resource>,
    uniforms: HashMap<ResourceHandle, SurfaceUniforms>,
    next_id: u64,
    open_frame: Option<RecordedFrame>,
    last_frame: Option<RecordedFrame>,
    presented: u64,
    extent: RenderExtent,
    max_texture_dimension: u32,
    failing: Option<ResourceKind>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl HeadlessDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resources: BTreeMap::new(),
            uniforms: HashMap::new(),
            next_id: 1,
            open_frame: None,
            last_frame: None,
            presented: 0,
            extent: RenderExtent {
                output: (width.max(1), height.max(1)),
                scene: (width.max(1), height.max(1)),
            },
            max_texture_dimension: DEFAULT_MAX_TEXTURE_DIMENSION,
            failing: None,
        }
    }

    pub fn with_max_texture_dimension(mut self, dimension: u32) -> Self {
        self.max_texture_dimension = dimension.max(1);
        self
    }

    /// Makes every later creation of `kind` fail until cleared with `None`.
    pub fn fail_creation_of(&mut self, kind: Option<ResourceKind>) {
        self.failing = kind;
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.last_frame.as_ref()
    }

    pub fn uniforms(&self, buffer: ResourceHandle) -> Option<&SurfaceUniforms> {
        self.uniforms.get(&buffer)
    }

    /// Swapchain size.
    pub fn size(&self) -> (u32, u32) {
        self.extent.output
    }

    /// Size of the offscreen scene targets.
    pub fn scene_size(&self) -> (u32, u32) {
        self.extent.scene
    }

    pub fn live_count(&self) -> usize {
        self.resources.len()
    }

    fn allocate(&mut self, kind: ResourceKind, label: &str) -> Result<ResourceHandle, RenderError> {
        if self.failing == Some(kind) {
            return Err(RenderError::acquisition(kind, label, "injected failure"));
        }
        let handle = ResourceHandle::new(kind, self.next_id);
        self.next_id += 1;
        self.resources.insert(
            handle,
            Resource {
                kind,
                label: label.to_string(),
            },
        );
        Ok(handle)
    }

    fn require(&self, handle: ResourceHandle, kind: ResourceKind) -> Result<(), RenderError> {
        match self.resources.get(&handle) {
            Some(resource) if resource.kind == kind => Ok(()),
            _ => Err(RenderError::UnknownResource(handle)),
        }
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_geometry(&mut self, label: &str, mesh: &MeshData) -> Result<ResourceHandle, RenderError> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RenderError::acquisition(
                ResourceKind::Geometry,
                label,
                "mesh has no vertices",
            ));
        }
        self.allocate(ResourceKind::Geometry, label)
    }

    fn create_program(
        &mut self,
        label: &str,
        _descriptor: &ProgramDescriptor,
    ) -> Result<ResourceHandle, RenderError> {
        self.allocate(ResourceKind::Program, label)
    }

    fn create_uniform_buffer(&mut self, label: &str) -> Result<ResourceHandle, RenderError> {
        self.allocate(ResourceKind::UniformBuffer, label)
    }

    fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<ResourceHandle, RenderError> {
        let expected = data.width as usize * data.height as usize * 4;
        if data.width == 0 || data.height == 0 || data.rgba.len() != expected {
            return Err(RenderError::acquisition(
                ResourceKind::Texture,
                label,
                format!("{}x{} image with {} bytes", data.width, data.height, data.rgba.len()),
            ));
        }
        if data.width.max(data.height) > self.max_texture_dimension {
            return Err(RenderError::acquisition(
                ResourceKind::Texture,
                label,
                format!("exceeds {} pixel limit", self.max_texture_dimension),
            ));
        }
        self.allocate(ResourceKind::Texture, label)
    }

    fn create_post_chain(
        &mut self,
        label: &str,
        _settings: &PostSettings,
    ) -> Result<ResourceHandle, RenderError> {
        self.allocate(ResourceKind::PostChain, label)
    }

    fn write_uniforms(&mut self, buffer: ResourceHandle, uniforms: &SurfaceUniforms) -> Result<(), RenderError> {
        self.require(buffer, ResourceKind::UniformBuffer)?;
        self.uniforms.insert(buffer, *uniforms);
        Ok(())
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<(), RenderError> {
        if self.open_frame.is_some() {
            return Err(RenderError::Device("frame already in progress".into()));
        }
        self.open_frame = Some(RecordedFrame {
            clear_color,
            draws: Vec::new(),
            post: None,
        });
        Ok(())
    }

    fn draw(&mut self, call: DrawCall) -> Result<(), RenderError> {
        self.require(call.program, ResourceKind::Program)?;
        self.require(call.geometry, ResourceKind::Geometry)?;
        self.require(call.uniforms, ResourceKind::UniformBuffer)?;
        if let Some(texture) = call.texture {
            self.require(texture, ResourceKind::Texture)?;
        }
        let uniforms = self.uniforms.get(&call.uniforms).copied();
        let frame = self
            .open_frame
            .as_mut()
            .ok_or_else(|| RenderError::Device("draw outside of a frame".into()))?;
        frame.draws.push(RecordedDraw { call, uniforms });
        Ok(())
    }

    fn end_frame(&mut self, post: Option<ResourceHandle>) -> Result<(), RenderError> {
        if let Some(chain) = post {
            self.require(chain, ResourceKind::PostChain)?;
        }
        let mut frame = self
            .open_frame
            .take()
            .ok_or_else(|| RenderError::Device("end_frame without begin_frame".into()))?;
        frame.post = post;
        self.last_frame = Some(frame);
        self.presented += 1;
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.open_frame = None;
    }

    fn release(&mut self, handle: ResourceHandle) -> Result<(), RenderError> {
        self.resources
            .remove(&handle)
            .ok_or(RenderError::UnknownResource(handle))?;
        self.uniforms.remove(&handle);
        Ok(())
    }

    fn live_inventory(&self) -> Vec<(ResourceKind, String)> {
        let mut inventory: Vec<_> = self
            .resources
            .values()
            .map(|resource| (resource.kind, resource.label.clone()))
            .collect();
        inventory.sort();
        inventory
    }

    fn resize(&mut self, extent: RenderExtent) -> Result<(), RenderError> {
        if extent.is_degenerate() {
            let (width, height) = extent.output;
            return Err(RenderError::DegenerateViewport { width, height });
        }
        self.extent = extent;
        Ok(())
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }
}
