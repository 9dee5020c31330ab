//! Render surfaces: one drawable layer each, with its own GPU resources.
//!
//! A surface moves `Uninitialized -> Ready -> Disposed`. It only becomes
//! Ready once every resource it needs exists, including a background texture
//! that may still be decoding. Drawing anything but a Ready surface is a
//! no-op, so the frame loop never has to special-case half-built layers.

use glam::{Mat4, Vec2, Vec3};
use lensing::{kernel, FrameContext, LensingParameters};

use crate::bridge::{BridgeInputs, CameraState, LayerParams, SurfaceDescriptor, UniformBridge};
use crate::device::{DrawCall, RenderDevice};
use crate::error::RenderError;
use crate::geometry::MeshData;
use crate::texture::{TextureLoad, TexturePoll};
use crate::types::{ProgramDescriptor, ResourceHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Ready,
    Disposed,
}

/// How the model matrix evolves each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Static,
    /// Spin about +Y by the rotation phase.
    SpinY,
    /// Scale the unit quad to the visible frustum.
    FillViewport,
}

/// Per-frame inputs shared by every surface of a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub frame: &'a FrameContext,
    pub params: &'a LensingParameters,
    pub camera: CameraState,
    pub quad_size: Vec2,
}

#[derive(Debug, Default, Clone, Copy)]
struct SurfaceHandles {
    geometry: Option<ResourceHandle>,
    program: Option<ResourceHandle>,
    uniforms: Option<ResourceHandle>,
    texture: Option<ResourceHandle>,
}

impl SurfaceHandles {
    fn iter(&self) -> impl Iterator<Item = ResourceHandle> {
        [self.texture, self.uniforms, self.program, self.geometry]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug)]
pub struct RenderSurface {
    label: String,
    state: SurfaceState,
    skipped: bool,
    draw_order: i32,
    mesh: MeshData,
    program: ProgramDescriptor,
    descriptor: SurfaceDescriptor,
    base_model: Mat4,
    motion: Motion,
    handles: SurfaceHandles,
    pending_texture: Option<TextureLoad>,
    wants_texture: bool,
}

impl RenderSurface {
    pub fn new(label: impl Into<String>, mesh: MeshData, program: ProgramDescriptor) -> Self {
        let descriptor = SurfaceDescriptor::new(mesh.kind, program.kind, LayerParams::default());
        Self {
            label: label.into(),
            state: SurfaceState::Uninitialized,
            skipped: false,
            draw_order: 0,
            mesh,
            program,
            descriptor,
            base_model: Mat4::IDENTITY,
            motion: Motion::Static,
            handles: SurfaceHandles::default(),
            pending_texture: None,
            wants_texture: false,
        }
    }

    pub fn with_draw_order(mut self, order: i32) -> Self {
        self.draw_order = order;
        self
    }

    pub fn with_layer(mut self, layer: LayerParams) -> Self {
        self.descriptor.layer = layer;
        self
    }

    pub fn with_model(mut self, model: Mat4) -> Self {
        self.base_model = model;
        self
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    /// Surface stays Uninitialized until `load` resolves.
    pub fn with_background(mut self, load: TextureLoad) -> Self {
        self.pending_texture = Some(load);
        self.wants_texture = true;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// Set after a background load failed; the surface never becomes Ready.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready
    }

    pub fn draw_order(&self) -> i32 {
        self.draw_order
    }

    pub fn descriptor(&self) -> &SurfaceDescriptor {
        &self.descriptor
    }

    pub fn uniform_buffer(&self) -> Option<ResourceHandle> {
        self.handles.uniforms
    }

    pub fn owned_handles(&self) -> Vec<ResourceHandle> {
        self.handles.iter().collect()
    }

    /// Creates geometry, program and uniform buffer.
    ///
    /// On failure every resource created so far is released and the surface
    /// stays Uninitialized.
    pub fn acquire<D: RenderDevice>(&mut self, device: &mut D) -> Result<(), RenderError> {
        if self.state != SurfaceState::Uninitialized || self.handles.geometry.is_some() {
            return Ok(());
        }
        match self.create_core(device) {
            Ok(handles) => {
                self.handles = handles;
                self.descriptor.program = handles.program;
                self.promote();
                Ok(())
            }
            Err((partial, err)) => {
                for handle in partial.iter() {
                    if let Err(release_err) = device.release(handle) {
                        tracing::warn!(surface = %self.label, error = %release_err, "failed to release partial resource");
                    }
                }
                tracing::error!(surface = %self.label, error = %err, "surface resource acquisition failed");
                Err(err)
            }
        }
    }

    fn create_core<D: RenderDevice>(
        &self,
        device: &mut D,
    ) -> Result<SurfaceHandles, (SurfaceHandles, RenderError)> {
        let mut handles = SurfaceHandles::default();
        let label = &self.label;
        handles.geometry = Some(
            device
                .create_geometry(&format!("{label}.geometry"), &self.mesh)
                .map_err(|err| (handles, err))?,
        );
        handles.program = Some(
            device
                .create_program(&format!("{label}.program"), &self.program)
                .map_err(|err| (handles, err))?,
        );
        handles.uniforms = Some(
            device
                .create_uniform_buffer(&format!("{label}.uniforms"))
                .map_err(|err| (handles, err))?,
        );
        Ok(handles)
    }

    fn promote(&mut self) {
        let core_ready = self.handles.geometry.is_some()
            && self.handles.program.is_some()
            && self.handles.uniforms.is_some();
        let texture_ready = !self.wants_texture || self.handles.texture.is_some();
        if core_ready && texture_ready && !self.skipped {
            self.state = SurfaceState::Ready;
            tracing::debug!(surface = %self.label, "surface ready");
        }
    }

    /// Checks the background load. Never blocks.
    pub fn poll_pending<D: RenderDevice>(&mut self, device: &mut D) {
        if self.state == SurfaceState::Disposed {
            return;
        }
        let Some(load) = self.pending_texture.as_mut() else {
            return;
        };
        match load.poll() {
            TexturePoll::Pending => {}
            TexturePoll::Ready(data) => {
                self.pending_texture = None;
                match device.create_texture(&format!("{}.background", self.label), &data) {
                    Ok(handle) => {
                        tracing::info!(
                            surface = %self.label,
                            width = data.width,
                            height = data.height,
                            "background texture loaded"
                        );
                        self.handles.texture = Some(handle);
                        self.promote();
                    }
                    Err(err) => {
                        tracing::error!(surface = %self.label, error = %err, "background upload failed; skipping surface");
                        self.skipped = true;
                    }
                }
            }
            TexturePoll::Failed(err) => {
                self.pending_texture = None;
                tracing::warn!(surface = %self.label, error = %err, "background load failed; skipping surface");
                self.skipped = true;
            }
        }
    }

    /// Rewrites the surface uniforms and uploads them. No-op unless Ready.
    pub fn refresh<D: RenderDevice>(
        &mut self,
        bridge: &UniformBridge,
        device: &mut D,
        inputs: &FrameInputs<'_>,
    ) -> Result<(), RenderError> {
        if self.state != SurfaceState::Ready {
            return Ok(());
        }
        let Some(buffer) = self.handles.uniforms else {
            return Ok(());
        };
        let model = self.model_matrix(inputs);
        let block = bridge.refresh(
            &mut self.descriptor,
            &BridgeInputs {
                frame: inputs.frame,
                params: inputs.params,
                camera: inputs.camera,
                model,
                background: self.handles.texture,
            },
        );
        device.write_uniforms(buffer, &block)
    }

    pub fn model_matrix(&self, inputs: &FrameInputs<'_>) -> Mat4 {
        match self.motion {
            Motion::Static => self.base_model,
            Motion::SpinY => {
                let phase = kernel::wrap_phase(
                    inputs.frame.elapsed_seconds,
                    f64::from(inputs.params.rotation_speed()),
                );
                self.base_model * Mat4::from_rotation_y(phase)
            }
            Motion::FillViewport => {
                self.base_model * Mat4::from_scale(Vec3::new(inputs.quad_size.x, inputs.quad_size.y, 1.0))
            }
        }
    }

    /// Queues the draw. Returns whether anything was drawn.
    pub fn draw<D: RenderDevice>(&self, device: &mut D) -> Result<bool, RenderError> {
        if self.state != SurfaceState::Ready {
            return Ok(false);
        }
        let (Some(program), Some(geometry), Some(uniforms)) =
            (self.handles.program, self.handles.geometry, self.handles.uniforms)
        else {
            return Ok(false);
        };
        device.draw(DrawCall {
            program,
            geometry,
            uniforms,
            texture: self.handles.texture,
        })?;
        Ok(true)
    }

    /// Releases every owned resource. Safe to call more than once.
    pub fn dispose<D: RenderDevice>(&mut self, device: &mut D) {
        if self.state == SurfaceState::Disposed {
            return;
        }
        for handle in self.handles.iter() {
            if let Err(err) = device.release(handle) {
                tracing::warn!(surface = %self.label, error = %err, "failed to release surface resource");
            }
        }
        self.handles = SurfaceHandles::default();
        self.descriptor.program = None;
        self.descriptor.bound_uniforms.clear();
        self.pending_texture = None;
        self.state = SurfaceState::Disposed;
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;
    use crate::headless::HeadlessDevice;
    use crate::types::{BlendMode, ColorTarget, FaceCulling, ProgramKind, ResourceKind, TextureData};

    fn quad() -> RenderSurface {
        RenderSurface::new(
            "quad",
            MeshData::plane(),
            ProgramDescriptor {
                kind: ProgramKind::BackgroundLens,
                blend: BlendMode::Opaque,
                culling: FaceCulling::None,
                depth_write: false,
                target: ColorTarget::Surface,
            },
        )
    }

    #[test]
    fn acquire_makes_plain_surface_ready() {
        let mut device = HeadlessDevice::default();
        let mut surface = quad();
        surface.acquire(&mut device).unwrap();
        assert_eq!(surface.state(), SurfaceState::Ready);
        assert_eq!(device.live_count(), 3);
        assert!(surface.descriptor().program.is_some());
    }

    #[test]
    fn failed_acquire_releases_partial_resources() {
        let mut device = HeadlessDevice::default();
        device.fail_creation_of(Some(ResourceKind::UniformBuffer));
        let mut surface = quad();
        assert!(surface.acquire(&mut device).is_err());
        assert_eq!(surface.state(), SurfaceState::Uninitialized);
        assert_eq!(device.live_count(), 0);

        device.begin_frame([0.0; 4]).unwrap();
        assert!(!surface.draw(&mut device).unwrap());
        device.end_frame(None).unwrap();
        assert!(device.last_frame().unwrap().draws.is_empty());
    }

    #[test]
    fn background_resolution_promotes_to_ready() {
        let mut device = HeadlessDevice::default();
        let (sender, receiver) = bounded(1);
        let mut surface = quad().with_background(TextureLoad::from_receiver(receiver));
        surface.acquire(&mut device).unwrap();
        surface.poll_pending(&mut device);
        assert_eq!(surface.state(), SurfaceState::Uninitialized);

        sender
            .send(Ok(TextureData {
                width: 1,
                height: 1,
                rgba: vec![255; 4],
            }))
            .unwrap();
        surface.poll_pending(&mut device);
        assert_eq!(surface.state(), SurfaceState::Ready);
        assert_eq!(surface.owned_handles().len(), 4);
    }

    #[test]
    fn failed_background_skips_permanently() {
        let mut device = HeadlessDevice::default();
        let (sender, receiver) = bounded(1);
        let mut surface = quad().with_background(TextureLoad::from_receiver(receiver));
        surface.acquire(&mut device).unwrap();
        sender.send(Err("corrupt".to_string())).unwrap();
        surface.poll_pending(&mut device);
        assert!(surface.is_skipped());
        surface.poll_pending(&mut device);
        assert_eq!(surface.state(), SurfaceState::Uninitialized);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut device = HeadlessDevice::default();
        let mut surface = quad();
        surface.acquire(&mut device).unwrap();
        surface.dispose(&mut device);
        surface.dispose(&mut device);
        assert_eq!(surface.state(), SurfaceState::Disposed);
        assert_eq!(device.live_count(), 0);
        assert!(device.live_inventory().is_empty());
    }
}
