//! The two render pipelines and the surfaces they own.

use std::f32::consts::FRAC_PI_6;

use glam::{Mat4, Vec3};
use lensing::kernel::{
    DISK_INNER_RADIUS, DISK_OUTER_RADIUS, HORIZON_RADIUS, PHOTON_SPHERE_RADIUS, WARPED_DISK_INNER_RADIUS,
    WARPED_DISK_OUTER_RADIUS,
};
use lensing::ViewportState;

use crate::bridge::{CameraState, LayerParams};
use crate::device::RenderDevice;
use crate::geometry::MeshData;
use crate::surface::{Motion, RenderSurface};
use crate::texture::TextureLoad;
use crate::types::{
    BlendMode, ColorTarget, FaceCulling, GeometryKind, PipelineOptions, PostSettings, ProgramDescriptor,
    ProgramKind, RenderMode, ResourceHandle, FLAT_BACKGROUND, SCENE_BACKGROUND,
};

/// Fixed secondary-disk values; the sliders only drive the primary disk.
pub const WARPED_DISK_OPACITY: f32 = 0.3;
pub const WARPED_DISK_STRENGTH: f32 = 1.5;

/// Camera distance of the 2D view; the quad is scaled to fill its frustum.
const FLAT_CAMERA_Z: f32 = 1.0;

/// Everything a pipeline build needs besides the device.
#[derive(Debug, Default)]
pub struct PipelineSetup {
    pub options: PipelineOptions,
    pub post: PostSettings,
    /// Background decode for the texture-backed 2D pipeline.
    pub background: Option<TextureLoad>,
}

/// Surfaces and shared resources of one active mode.
#[derive(Debug)]
pub struct ModePipeline {
    mode: RenderMode,
    surfaces: Vec<RenderSurface>,
    post_chain: Option<ResourceHandle>,
    clear_color: [f32; 4],
    disposed: bool,
}

impl ModePipeline {
    /// Builds the pipeline for `mode` and acquires its resources.
    ///
    /// Surfaces whose acquisition fails stay Uninitialized and are skipped
    /// when drawing; the build itself does not fail.
    pub fn build<D: RenderDevice>(mode: RenderMode, device: &mut D, setup: PipelineSetup) -> Self {
        let mut pipeline = match mode {
            RenderMode::Flat => Self::flat(setup),
            RenderMode::Orbit => Self::orbit(device, &setup),
        };
        for surface in &mut pipeline.surfaces {
            if let Err(err) = surface.acquire(device) {
                tracing::debug!(surface = surface.label(), error = %err, "surface left uninitialized");
            }
        }
        pipeline.surfaces.sort_by_key(RenderSurface::draw_order);
        tracing::info!(
            mode = %mode,
            surfaces = pipeline.surfaces.len(),
            ready = pipeline.ready_count(),
            post = pipeline.post_chain.is_some(),
            "pipeline built"
        );
        pipeline
    }

    fn flat(setup: PipelineSetup) -> Self {
        let program = ProgramDescriptor {
            kind: ProgramKind::BackgroundLens,
            blend: BlendMode::Opaque,
            culling: FaceCulling::None,
            depth_write: false,
            target: ColorTarget::Surface,
        };
        let mut surface = RenderSurface::new("lens-quad", MeshData::plane(), program).with_motion(Motion::FillViewport);
        match (setup.options.texture_backed, setup.background) {
            (true, Some(load)) => surface = surface.with_background(load),
            (true, None) => {
                tracing::info!("no background configured; using procedural star field");
            }
            (false, _) => {}
        }
        Self {
            mode: RenderMode::Flat,
            surfaces: vec![surface],
            post_chain: None,
            clear_color: FLAT_BACKGROUND,
            disposed: false,
        }
    }

    fn orbit<D: RenderDevice>(device: &mut D, setup: &PipelineSetup) -> Self {
        let post_chain = match device.create_post_chain("bloom", &setup.post) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "post chain unavailable; rendering without bloom");
                None
            }
        };
        let target = if post_chain.is_some() {
            ColorTarget::Hdr
        } else {
            ColorTarget::Surface
        };
        let disk_program = ProgramDescriptor {
            kind: ProgramKind::AccretionDisk,
            blend: BlendMode::Additive,
            culling: FaceCulling::None,
            depth_write: false,
            target,
        };

        let surfaces = vec![
            RenderSurface::new(
                "event-horizon",
                MeshData::sphere(GeometryKind::SphereCore, HORIZON_RADIUS, 64, 32),
                ProgramDescriptor {
                    kind: ProgramKind::HorizonCore,
                    blend: BlendMode::Opaque,
                    culling: FaceCulling::Back,
                    depth_write: true,
                    target,
                },
            )
            .with_draw_order(0),
            RenderSurface::new(
                "photon-sphere",
                MeshData::sphere(GeometryKind::SphereShell, PHOTON_SPHERE_RADIUS, 32, 16),
                ProgramDescriptor {
                    kind: ProgramKind::PhotonShell,
                    blend: BlendMode::Additive,
                    culling: FaceCulling::Front,
                    depth_write: false,
                    target,
                },
            )
            .with_draw_order(1),
            RenderSurface::new(
                "warped-disk",
                MeshData::ring(WARPED_DISK_INNER_RADIUS, WARPED_DISK_OUTER_RADIUS, 64, 16),
                disk_program.clone(),
            )
            .with_layer(LayerParams::fixed(WARPED_DISK_OPACITY, WARPED_DISK_STRENGTH))
            .with_model(Mat4::from_rotation_x(FRAC_PI_6))
            .with_draw_order(2),
            RenderSurface::new(
                "accretion-disk",
                MeshData::ring(DISK_INNER_RADIUS, DISK_OUTER_RADIUS, 128, 32),
                disk_program,
            )
            .with_motion(Motion::SpinY)
            .with_draw_order(3),
        ];

        Self {
            mode: RenderMode::Orbit,
            surfaces,
            post_chain,
            clear_color: SCENE_BACKGROUND,
            disposed: false,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn surfaces(&self) -> &[RenderSurface] {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut [RenderSurface] {
        &mut self.surfaces
    }

    pub fn surface(&self, label: &str) -> Option<&RenderSurface> {
        self.surfaces.iter().find(|surface| surface.label() == label)
    }

    pub fn post_chain(&self) -> Option<ResourceHandle> {
        self.post_chain
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn ready_count(&self) -> usize {
        self.surfaces.iter().filter(|surface| surface.is_ready()).count()
    }

    pub fn poll_pending<D: RenderDevice>(&mut self, device: &mut D) {
        for surface in &mut self.surfaces {
            surface.poll_pending(device);
        }
    }

    /// Camera of the 2D view: fixed, looking down -Z at the quad.
    pub fn flat_camera(viewport: &ViewportState) -> CameraState {
        let eye = Vec3::new(0.0, 0.0, FLAT_CAMERA_Z);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        CameraState {
            view_projection: viewport.projection_matrix() * view,
            position: eye,
        }
    }

    /// Releases every surface and the post chain.
    pub fn dispose<D: RenderDevice>(&mut self, device: &mut D) {
        if self.disposed {
            return;
        }
        for surface in &mut self.surfaces {
            surface.dispose(device);
        }
        if let Some(chain) = self.post_chain.take() {
            if let Err(err) = device.release(chain) {
                tracing::warn!(error = %err, "failed to release post chain");
            }
        }
        self.disposed = true;
        tracing::info!(mode = %self.mode, "pipeline disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use crate::surface::SurfaceState;
    use crate::types::ResourceKind;

    #[test]
    fn orbit_pipeline_orders_surfaces_back_to_front() {
        let mut device = HeadlessDevice::default();
        let pipeline = ModePipeline::build(RenderMode::Orbit, &mut device, PipelineSetup::default());
        let labels: Vec<_> = pipeline.surfaces().iter().map(RenderSurface::label).collect();
        assert_eq!(labels, ["event-horizon", "photon-sphere", "warped-disk", "accretion-disk"]);
        assert_eq!(pipeline.ready_count(), 4);
        assert!(pipeline.post_chain().is_some());
    }

    #[test]
    fn orbit_pipeline_survives_missing_post_chain() {
        let mut device = HeadlessDevice::default();
        device.fail_creation_of(Some(ResourceKind::PostChain));
        let pipeline = ModePipeline::build(RenderMode::Orbit, &mut device, PipelineSetup::default());
        assert!(pipeline.post_chain().is_none());
        assert_eq!(pipeline.ready_count(), 4);
    }

    #[test]
    fn failed_acquisition_keeps_building_the_rest() {
        let mut device = HeadlessDevice::default();
        device.fail_creation_of(Some(ResourceKind::UniformBuffer));
        let pipeline = ModePipeline::build(RenderMode::Orbit, &mut device, PipelineSetup::default());
        assert_eq!(pipeline.surfaces().len(), 4);
        assert_eq!(pipeline.ready_count(), 0);
        assert!(pipeline
            .surfaces()
            .iter()
            .all(|surface| surface.state() == SurfaceState::Uninitialized));
        // Only the post chain survives; partial surface resources are rolled back.
        assert_eq!(device.live_inventory(), vec![(ResourceKind::PostChain, "bloom".to_string())]);
    }

    #[test]
    fn procedural_flat_pipeline_is_ready_immediately() {
        let mut device = HeadlessDevice::default();
        let setup = PipelineSetup {
            options: PipelineOptions {
                texture_backed: false,
                ..PipelineOptions::default()
            },
            background: Some(TextureLoad::never()),
            ..PipelineSetup::default()
        };
        let pipeline = ModePipeline::build(RenderMode::Flat, &mut device, setup);
        assert_eq!(pipeline.ready_count(), 1);
        assert_eq!(pipeline.clear_color(), FLAT_BACKGROUND);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut device = HeadlessDevice::default();
        let mut pipeline = ModePipeline::build(RenderMode::Orbit, &mut device, PipelineSetup::default());
        assert!(device.live_count() > 0);
        pipeline.dispose(&mut device);
        pipeline.dispose(&mut device);
        assert_eq!(device.live_count(), 0);
        assert!(pipeline.surfaces().iter().all(|s| s.state() == SurfaceState::Disposed));
    }
}
