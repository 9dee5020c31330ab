//! User-facing lensing parameters.
//!
//! Values are clamped into [`ParameterRange`] on every write, so anything
//! reading a `LensingParameters` can forward it to a shader unchecked.

use glam::Vec3;
use thiserror::Error;

/// Step applied by one hotkey press or one `adjust` step.
pub const PARAMETER_STEP: f32 = 0.1;

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("{parameter} must be finite, got {value}")]
    NotFinite { parameter: Parameter, value: f32 },
    #[error("disk colour channels must be finite, got {0:?}")]
    NonFiniteColor([f32; 3]),
}

/// Scalar parameters a collaborator can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    DeflectionStrength,
    DiskOpacity,
    RotationSpeed,
    PlaybackSpeed,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::DeflectionStrength,
        Parameter::DiskOpacity,
        Parameter::RotationSpeed,
        Parameter::PlaybackSpeed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::DeflectionStrength => "deflection_strength",
            Parameter::DiskOpacity => "disk_opacity",
            Parameter::RotationSpeed => "rotation_speed",
            Parameter::PlaybackSpeed => "playback_speed",
        }
    }

    pub fn range(self) -> ParameterRange {
        match self {
            Parameter::DeflectionStrength => ParameterRange::new(0.5, 5.0, 2.0),
            Parameter::DiskOpacity => ParameterRange::new(0.1, 1.0, 0.8),
            Parameter::RotationSpeed => ParameterRange::new(0.1, 2.0, 0.5),
            Parameter::PlaybackSpeed => ParameterRange::new(0.1, 3.0, 1.0),
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive bounds plus the default value of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Parameters read by the uniform bridge every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LensingParameters {
    deflection_strength: f32,
    disk_opacity: f32,
    rotation_speed: f32,
    playback_speed: f32,
    disk_color: Vec3,
    annotations_visible: bool,
}

impl Default for LensingParameters {
    fn default() -> Self {
        Self {
            deflection_strength: Parameter::DeflectionStrength.range().default,
            disk_opacity: Parameter::DiskOpacity.range().default,
            rotation_speed: Parameter::RotationSpeed.range().default,
            playback_speed: Parameter::PlaybackSpeed.range().default,
            disk_color: Vec3::new(1.0, 0.6, 0.2),
            annotations_visible: false,
        }
    }
}

impl LensingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::DeflectionStrength => self.deflection_strength,
            Parameter::DiskOpacity => self.disk_opacity,
            Parameter::RotationSpeed => self.rotation_speed,
            Parameter::PlaybackSpeed => self.playback_speed,
        }
    }

    /// Stores `value` clamped into the parameter's range and returns what was
    /// stored. Non-finite input is rejected and the previous value kept.
    pub fn set(&mut self, parameter: Parameter, value: f32) -> Result<f32, ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NotFinite { parameter, value });
        }
        let clamped = parameter.range().clamp(value);
        let slot = match parameter {
            Parameter::DeflectionStrength => &mut self.deflection_strength,
            Parameter::DiskOpacity => &mut self.disk_opacity,
            Parameter::RotationSpeed => &mut self.rotation_speed,
            Parameter::PlaybackSpeed => &mut self.playback_speed,
        };
        *slot = clamped;
        Ok(clamped)
    }

    /// Moves a parameter by `steps` multiples of [`PARAMETER_STEP`].
    pub fn adjust(&mut self, parameter: Parameter, steps: i32) -> f32 {
        let target = self.get(parameter) + steps as f32 * PARAMETER_STEP;
        // Round to the step grid so repeated presses do not drift.
        let snapped = (target / PARAMETER_STEP).round() * PARAMETER_STEP;
        let clamped = parameter.range().clamp(snapped);
        match parameter {
            Parameter::DeflectionStrength => self.deflection_strength = clamped,
            Parameter::DiskOpacity => self.disk_opacity = clamped,
            Parameter::RotationSpeed => self.rotation_speed = clamped,
            Parameter::PlaybackSpeed => self.playback_speed = clamped,
        }
        clamped
    }

    pub fn deflection_strength(&self) -> f32 {
        self.deflection_strength
    }

    pub fn set_deflection_strength(&mut self, value: f32) -> Result<f32, ParameterError> {
        self.set(Parameter::DeflectionStrength, value)
    }

    pub fn disk_opacity(&self) -> f32 {
        self.disk_opacity
    }

    pub fn set_disk_opacity(&mut self, value: f32) -> Result<f32, ParameterError> {
        self.set(Parameter::DiskOpacity, value)
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn set_rotation_speed(&mut self, value: f32) -> Result<f32, ParameterError> {
        self.set(Parameter::RotationSpeed, value)
    }

    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    pub fn set_playback_speed(&mut self, value: f32) -> Result<f32, ParameterError> {
        self.set(Parameter::PlaybackSpeed, value)
    }

    pub fn disk_color(&self) -> Vec3 {
        self.disk_color
    }

    /// Colour channels are clamped into `[0, 1]`.
    pub fn set_disk_color(&mut self, rgb: [f32; 3]) -> Result<Vec3, ParameterError> {
        if rgb.iter().any(|c| !c.is_finite()) {
            return Err(ParameterError::NonFiniteColor(rgb));
        }
        self.disk_color = Vec3::from_array(rgb).clamp(Vec3::ZERO, Vec3::ONE);
        Ok(self.disk_color)
    }

    pub fn annotations_visible(&self) -> bool {
        self.annotations_visible
    }

    pub fn set_annotations_visible(&mut self, visible: bool) {
        self.annotations_visible = visible;
    }

    pub fn toggle_annotations(&mut self) -> bool {
        self.annotations_visible = !self.annotations_visible;
        self.annotations_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sit_inside_their_ranges() {
        let params = LensingParameters::default();
        for parameter in Parameter::ALL {
            assert!(parameter.range().contains(params.get(parameter)), "{parameter}");
        }
        assert_eq!(params.deflection_strength(), 2.0);
        assert_eq!(params.disk_opacity(), 0.8);
        assert!(!params.annotations_visible());
    }

    #[test]
    fn setters_clamp_out_of_range_values() {
        let mut params = LensingParameters::default();
        assert_eq!(params.set_deflection_strength(9.0), Ok(5.0));
        assert_eq!(params.set_deflection_strength(-1.0), Ok(0.5));
        assert_eq!(params.set_disk_opacity(0.0), Ok(0.1));
        assert_eq!(params.set_rotation_speed(3.0), Ok(2.0));
        assert_eq!(params.set_playback_speed(0.01), Ok(0.1));
    }

    #[test]
    fn non_finite_values_keep_previous_state() {
        let mut params = LensingParameters::default();
        params.set_disk_opacity(0.4).unwrap();
        let err = params.set_disk_opacity(f32::NAN).unwrap_err();
        assert!(matches!(err, ParameterError::NotFinite { parameter: Parameter::DiskOpacity, .. }));
        assert_eq!(params.disk_opacity(), 0.4);
        assert!(params.set_deflection_strength(f32::INFINITY).is_err());
        assert_eq!(params.deflection_strength(), 2.0);
    }

    #[test]
    fn adjust_moves_on_the_step_grid() {
        let mut params = LensingParameters::default();
        for _ in 0..3 {
            params.adjust(Parameter::DeflectionStrength, 1);
        }
        assert!((params.deflection_strength() - 2.3).abs() < 1.0e-5);
        for _ in 0..100 {
            params.adjust(Parameter::DiskOpacity, -1);
        }
        assert_eq!(params.disk_opacity(), 0.1);
    }

    #[test]
    fn disk_color_is_clamped() {
        let mut params = LensingParameters::default();
        let color = params.set_disk_color([2.0, -1.0, 0.5]).unwrap();
        assert_eq!(color, Vec3::new(1.0, 0.0, 0.5));
        assert!(params.set_disk_color([f32::NAN, 0.0, 0.0]).is_err());
        assert_eq!(params.disk_color(), Vec3::new(1.0, 0.0, 0.5));
    }
}
