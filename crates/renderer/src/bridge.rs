//! Shader uniform bridge.
//!
//! Once per frame and before a surface is drawn, [`UniformBridge::refresh`]
//! rewrites every uniform the surface's program declares from the current
//! [`FrameContext`] and [`LensingParameters`], then packs them into the
//! `SurfaceUniforms` block uploaded to the surface's uniform buffer. Inputs are
//! only read; the same inputs always produce the same block.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use lensing::kernel::{self, LensProfile, DISK_INNER_RADIUS, DISK_OUTER_RADIUS, MIN_SAMPLE_RADIUS};
use lensing::{FrameContext, LensingParameters, Parameter};

use crate::types::{GeometryKind, ProgramKind, ResourceHandle};

/// `time` is wrapped to this period; shaders only use integer multiples of it.
pub const TIME_WRAP_PERIOD: f64 = TAU * 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UniformName {
    Time,
    Resolution,
    DeflectionStrength,
    Opacity,
    DiskColor,
    RotationPhase,
    PulsePhase,
    ViewProjection,
    Model,
    CameraPosition,
    Background,
}

impl UniformName {
    pub fn as_str(self) -> &'static str {
        match self {
            UniformName::Time => "time",
            UniformName::Resolution => "resolution",
            UniformName::DeflectionStrength => "deflection_strength",
            UniformName::Opacity => "opacity",
            UniformName::DiskColor => "disk_color",
            UniformName::RotationPhase => "rotation_phase",
            UniformName::PulsePhase => "pulse_phase",
            UniformName::ViewProjection => "view_projection",
            UniformName::Model => "model",
            UniformName::CameraPosition => "camera_position",
            UniformName::Background => "background",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Texture(Option<ResourceHandle>),
}

pub type BoundUniforms = BTreeMap<UniformName, UniformValue>;

/// Uniforms each program reads. The bridge writes exactly these every frame.
pub fn declared_uniforms(kind: ProgramKind) -> &'static [UniformName] {
    use UniformName::*;
    match kind {
        ProgramKind::BackgroundLens => &[
            Time,
            Resolution,
            DeflectionStrength,
            ViewProjection,
            Model,
            Background,
        ],
        ProgramKind::HorizonCore => &[ViewProjection, Model, CameraPosition],
        ProgramKind::PhotonShell => &[ViewProjection, Model, CameraPosition, PulsePhase],
        ProgramKind::AccretionDisk => &[
            Time,
            ViewProjection,
            Model,
            CameraPosition,
            DeflectionStrength,
            Opacity,
            DiskColor,
            RotationPhase,
        ],
    }
}

/// Source of a per-layer scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerValue {
    /// Follow the user parameter.
    Parameter,
    Fixed(f32),
}

/// Opacity and strength of one layer, independent of the other layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerParams {
    pub opacity: LayerValue,
    pub strength: LayerValue,
}

impl Default for LayerParams {
    fn default() -> Self {
        Self {
            opacity: LayerValue::Parameter,
            strength: LayerValue::Parameter,
        }
    }
}

impl LayerParams {
    pub fn fixed(opacity: f32, strength: f32) -> Self {
        Self {
            opacity: LayerValue::Fixed(opacity),
            strength: LayerValue::Fixed(strength),
        }
    }

    fn resolve(value: LayerValue, parameter: Parameter, params: &LensingParameters) -> f32 {
        let raw = match value {
            LayerValue::Parameter => params.get(parameter),
            LayerValue::Fixed(value) => value,
        };
        parameter.range().clamp(raw)
    }
}

/// Per-surface binding state refreshed by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDescriptor {
    pub geometry_kind: GeometryKind,
    pub program_kind: ProgramKind,
    /// Set once the program has been acquired.
    pub program: Option<ResourceHandle>,
    pub bound_uniforms: BoundUniforms,
    pub layer: LayerParams,
}

impl SurfaceDescriptor {
    pub fn new(geometry_kind: GeometryKind, program_kind: ProgramKind, layer: LayerParams) -> Self {
        Self {
            geometry_kind,
            program_kind,
            program: None,
            bound_uniforms: BoundUniforms::new(),
            layer,
        }
    }

    pub fn value(&self, name: UniformName) -> Option<UniformValue> {
        self.bound_uniforms.get(&name).copied()
    }

    pub fn float(&self, name: UniformName) -> Option<f32> {
        match self.value(name)? {
            UniformValue::Float(value) => Some(value),
            _ => None,
        }
    }
}

/// Camera matrices shared by every surface of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub view_projection: Mat4,
    pub position: Vec3,
}

/// Read-only inputs to one surface refresh.
#[derive(Debug, Clone, Copy)]
pub struct BridgeInputs<'a> {
    pub frame: &'a FrameContext,
    pub params: &'a LensingParameters,
    pub camera: CameraState,
    pub model: Mat4,
    pub background: Option<ResourceHandle>,
}

/// std140 block shared by every surface program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SurfaceUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// Width, height, device pixel scale, aspect ratio.
    pub resolution: [f32; 4],
    /// Disk colour and opacity.
    pub color: [f32; 4],
    /// Wrapped time, deflection strength, rotation phase, pulse phase.
    pub params: [f32; 4],
    /// x: 1 when a background texture is bound.
    pub background: [f32; 4],
    /// Critical radius, fade-out radius, gain, disk warp gain.
    pub lens: [f32; 4],
    /// Minimum sample radius, disk inner and outer radius.
    pub shape: [f32; 4],
}

impl SurfaceUniforms {
    pub fn opacity(&self) -> f32 {
        self.color[3]
    }

    pub fn deflection_strength(&self) -> f32 {
        self.params[1]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UniformBridge;

impl UniformBridge {
    /// Rewrites every declared uniform of `descriptor` and returns the packed
    /// block to upload.
    pub fn refresh(&self, descriptor: &mut SurfaceDescriptor, inputs: &BridgeInputs<'_>) -> SurfaceUniforms {
        let mut bound = BoundUniforms::new();
        for &name in declared_uniforms(descriptor.program_kind) {
            bound.insert(name, self.evaluate(name, descriptor, inputs));
        }
        descriptor.bound_uniforms = bound;
        self.pack(descriptor)
    }

    fn evaluate(&self, name: UniformName, descriptor: &SurfaceDescriptor, inputs: &BridgeInputs<'_>) -> UniformValue {
        let frame = inputs.frame;
        let params = inputs.params;
        match name {
            UniformName::Time => {
                UniformValue::Float(frame.elapsed_seconds.rem_euclid(TIME_WRAP_PERIOD) as f32)
            }
            UniformName::Resolution => {
                let (width, height) = frame.resolution;
                UniformValue::Vec4(Vec4::new(
                    width as f32,
                    height as f32,
                    frame.device_pixel_scale,
                    frame.aspect_ratio(),
                ))
            }
            UniformName::DeflectionStrength => UniformValue::Float(LayerParams::resolve(
                descriptor.layer.strength,
                Parameter::DeflectionStrength,
                params,
            )),
            UniformName::Opacity => UniformValue::Float(LayerParams::resolve(
                descriptor.layer.opacity,
                Parameter::DiskOpacity,
                params,
            )),
            UniformName::DiskColor => UniformValue::Vec3(params.disk_color()),
            UniformName::RotationPhase => UniformValue::Float(kernel::wrap_phase(
                frame.elapsed_seconds,
                f64::from(params.rotation_speed()),
            )),
            UniformName::PulsePhase => UniformValue::Float(kernel::wrap_phase(
                frame.elapsed_seconds,
                kernel::PHOTON_PULSE_RATE,
            )),
            UniformName::ViewProjection => UniformValue::Mat4(inputs.camera.view_projection),
            UniformName::Model => UniformValue::Mat4(inputs.model),
            UniformName::CameraPosition => UniformValue::Vec3(inputs.camera.position),
            UniformName::Background => UniformValue::Texture(inputs.background),
        }
    }

    fn pack(&self, descriptor: &SurfaceDescriptor) -> SurfaceUniforms {
        let profile = match descriptor.program_kind {
            ProgramKind::BackgroundLens => LensProfile::screen(),
            _ => LensProfile::object(),
        };
        let mut block = SurfaceUniforms {
            view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            camera_position: [0.0; 4],
            resolution: [1.0, 1.0, 1.0, 1.0],
            color: [0.0; 4],
            params: [0.0; 4],
            background: [0.0; 4],
            lens: [
                profile.critical_radius,
                profile.max_radius,
                profile.gain,
                kernel::DISK_WARP_GAIN,
            ],
            shape: [MIN_SAMPLE_RADIUS, DISK_INNER_RADIUS, DISK_OUTER_RADIUS, 0.0],
        };

        for (name, value) in &descriptor.bound_uniforms {
            match (name, *value) {
                (UniformName::Time, UniformValue::Float(v)) => block.params[0] = v,
                (UniformName::DeflectionStrength, UniformValue::Float(v)) => block.params[1] = v,
                (UniformName::RotationPhase, UniformValue::Float(v)) => block.params[2] = v,
                (UniformName::PulsePhase, UniformValue::Float(v)) => block.params[3] = v,
                (UniformName::Opacity, UniformValue::Float(v)) => block.color[3] = v,
                (UniformName::DiskColor, UniformValue::Vec3(v)) => {
                    block.color[..3].copy_from_slice(&v.to_array());
                }
                (UniformName::Resolution, UniformValue::Vec4(v)) => block.resolution = v.to_array(),
                (UniformName::ViewProjection, UniformValue::Mat4(m)) => {
                    block.view_projection = m.to_cols_array_2d();
                }
                (UniformName::Model, UniformValue::Mat4(m)) => block.model = m.to_cols_array_2d(),
                (UniformName::CameraPosition, UniformValue::Vec3(v)) => {
                    block.camera_position = v.extend(1.0).to_array();
                }
                (UniformName::Background, UniformValue::Texture(texture)) => {
                    block.background[0] = if texture.is_some() { 1.0 } else { 0.0 };
                }
                (name, value) => {
                    tracing::warn!(uniform = name.as_str(), ?value, "uniform value has unexpected type");
                }
            }
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::types::ResourceKind;

    fn frame(elapsed: f64) -> FrameContext {
        FrameContext {
            elapsed_seconds: elapsed,
            delta_seconds: 1.0 / 60.0,
            resolution: (1920, 1080),
            device_pixel_scale: 1.0,
            frame_index: 0,
        }
    }

    fn camera() -> CameraState {
        CameraState {
            view_projection: Mat4::IDENTITY,
            position: Vec3::new(0.0, 8.0, 15.0),
        }
    }

    fn disk() -> SurfaceDescriptor {
        SurfaceDescriptor::new(GeometryKind::Ring, ProgramKind::AccretionDisk, LayerParams::default())
    }

    #[test]
    fn refresh_binds_exactly_the_declared_uniforms() {
        let bridge = UniformBridge;
        let params = LensingParameters::default();
        let frame = frame(1.0);
        for kind in [
            ProgramKind::BackgroundLens,
            ProgramKind::HorizonCore,
            ProgramKind::PhotonShell,
            ProgramKind::AccretionDisk,
        ] {
            let mut descriptor = SurfaceDescriptor::new(GeometryKind::Ring, kind, LayerParams::default());
            let inputs = BridgeInputs {
                frame: &frame,
                params: &params,
                camera: camera(),
                model: Mat4::IDENTITY,
                background: None,
            };
            bridge.refresh(&mut descriptor, &inputs);
            let bound: BTreeSet<_> = descriptor.bound_uniforms.keys().copied().collect();
            let declared: BTreeSet<_> = declared_uniforms(kind).iter().copied().collect();
            assert_eq!(bound, declared, "{kind:?}");
        }
    }

    #[test]
    fn refresh_is_idempotent_and_leaves_inputs_alone() {
        let bridge = UniformBridge;
        let params = LensingParameters::default();
        let snapshot = params.clone();
        let frame = frame(12.25);
        let inputs = BridgeInputs {
            frame: &frame,
            params: &params,
            camera: camera(),
            model: Mat4::from_rotation_y(0.3),
            background: None,
        };
        let mut descriptor = disk();
        let first = bridge.refresh(&mut descriptor, &inputs);
        let bound_once = descriptor.bound_uniforms.clone();
        let second = bridge.refresh(&mut descriptor, &inputs);
        assert_eq!(first, second);
        assert_eq!(bound_once, descriptor.bound_uniforms);
        assert_eq!(params, snapshot);
    }

    #[test]
    fn stale_values_are_replaced_every_refresh() {
        let bridge = UniformBridge;
        let mut params = LensingParameters::default();
        let mut descriptor = disk();
        descriptor
            .bound_uniforms
            .insert(UniformName::Background, UniformValue::Float(9.0));

        let frame = frame(0.5);
        params.set_disk_opacity(0.1).unwrap();
        let block = bridge.refresh(
            &mut descriptor,
            &BridgeInputs {
                frame: &frame,
                params: &params,
                camera: camera(),
                model: Mat4::IDENTITY,
                background: None,
            },
        );
        assert!(descriptor.value(UniformName::Background).is_none());
        assert_eq!(block.opacity(), 0.1);

        params.set_disk_opacity(1.0).unwrap();
        let block = bridge.refresh(
            &mut descriptor,
            &BridgeInputs {
                frame: &frame,
                params: &params,
                camera: camera(),
                model: Mat4::IDENTITY,
                background: None,
            },
        );
        assert_eq!(block.opacity(), 1.0);
        assert_eq!(descriptor.float(UniformName::Opacity), Some(1.0));
    }

    #[test]
    fn fixed_layer_values_ignore_parameters() {
        let bridge = UniformBridge;
        let mut params = LensingParameters::default();
        params.set_deflection_strength(4.0).unwrap();
        let mut descriptor = SurfaceDescriptor::new(
            GeometryKind::Ring,
            ProgramKind::AccretionDisk,
            LayerParams::fixed(0.3, 1.5),
        );
        let frame = frame(3.0);
        let block = bridge.refresh(
            &mut descriptor,
            &BridgeInputs {
                frame: &frame,
                params: &params,
                camera: camera(),
                model: Mat4::IDENTITY,
                background: None,
            },
        );
        assert_eq!(block.opacity(), 0.3);
        assert_eq!(block.deflection_strength(), 1.5);
    }

    #[test]
    fn rotation_phase_is_periodic_in_elapsed_time() {
        let bridge = UniformBridge;
        let mut params = LensingParameters::default();
        params.set_rotation_speed(0.7).unwrap();
        let period = TAU / f64::from(params.rotation_speed());
        let mut descriptor = disk();
        for start in [0.3_f64, 100.0, 86_400.0] {
            let a = frame(start);
            let b = frame(start + period);
            let inputs_a = BridgeInputs {
                frame: &a,
                params: &params,
                camera: camera(),
                model: Mat4::IDENTITY,
                background: None,
            };
            let phase_a = bridge.refresh(&mut descriptor, &inputs_a).params[2];
            let inputs_b = BridgeInputs { frame: &b, ..inputs_a };
            let phase_b = bridge.refresh(&mut descriptor, &inputs_b).params[2];
            let diff = (phase_a - phase_b).abs();
            let wrapped = diff.min(std::f32::consts::TAU - diff);
            assert!(wrapped < 1.0e-3, "start {start}: {phase_a} vs {phase_b}");
        }
    }

    #[test]
    fn background_flag_tracks_texture_binding() {
        let bridge = UniformBridge;
        let params = LensingParameters::default();
        let frame = frame(0.0);
        let mut descriptor = SurfaceDescriptor::new(
            GeometryKind::FullScreenQuad,
            ProgramKind::BackgroundLens,
            LayerParams::default(),
        );
        let texture = ResourceHandle::new(ResourceKind::Texture, 7);
        let block = bridge.refresh(
            &mut descriptor,
            &BridgeInputs {
                frame: &frame,
                params: &params,
                camera: camera(),
                model: Mat4::IDENTITY,
                background: Some(texture),
            },
        );
        assert_eq!(block.background[0], 1.0);
        assert_eq!(block.lens[0], lensing::kernel::SCREEN_CRITICAL_RADIUS);
        assert_eq!(
            descriptor.value(UniformName::Background),
            Some(UniformValue::Texture(Some(texture)))
        );
    }
}
