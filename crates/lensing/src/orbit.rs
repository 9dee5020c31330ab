//! Damped orbit camera for the 3D view.
//!
//! Spherical coordinates around the origin with the polar angle measured from
//! +Y. Input accumulates into a pending delta that `update` bleeds off by the
//! damping factor each frame, so motion continues briefly after the pointer
//! stops. There is no panning; the target is always the origin.

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec3};

const POLAR_EPSILON: f32 = 1.0e-6;
const ZOOM_BASE: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSettings {
    pub initial_position: Vec3,
    pub field_of_view_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            initial_position: Vec3::new(0.0, 8.0, 15.0),
            field_of_view_degrees: 50.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            min_distance: 8.0,
            max_distance: 100.0,
            damping_factor: 0.03,
            rotate_speed: 0.5,
            zoom_speed: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    settings: OrbitSettings,
    radius: f32,
    polar: f32,
    azimuth: f32,
    pending_polar: f32,
    pending_azimuth: f32,
    pending_scale: f32,
}

impl OrbitCamera {
    pub fn new(settings: OrbitSettings) -> Self {
        let position = settings.initial_position;
        let radius = position.length().max(POLAR_EPSILON);
        let polar = (position.y / radius).clamp(-1.0, 1.0).acos();
        let azimuth = position.x.atan2(position.z);
        let mut camera = Self {
            settings,
            radius,
            polar,
            azimuth,
            pending_polar: 0.0,
            pending_azimuth: 0.0,
            pending_scale: 1.0,
        };
        camera.clamp_state();
        camera
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    /// Queues a drag of `(dx, dy)` pixels on a viewport `viewport_height` tall.
    ///
    /// A drag across the full height turns the camera by one revolution times
    /// the rotate speed.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.pending_azimuth -= TAU * dx / height * self.settings.rotate_speed;
        self.pending_polar -= TAU * dy / height * self.settings.rotate_speed;
    }

    /// Positive `steps` move the camera closer.
    pub fn zoom(&mut self, steps: f32) {
        if !steps.is_finite() || steps == 0.0 {
            return;
        }
        let factor = ZOOM_BASE.powf(self.settings.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.pending_scale *= factor;
        } else {
            self.pending_scale /= factor;
        }
    }

    /// Applies a damped share of the pending motion. Call once per frame.
    pub fn update(&mut self) {
        let damping = self.settings.damping_factor.clamp(0.0, 1.0);
        self.azimuth = (self.azimuth + self.pending_azimuth * damping).rem_euclid(TAU);
        self.polar += self.pending_polar * damping;
        self.radius *= self.pending_scale;
        self.clamp_state();

        self.pending_azimuth *= 1.0 - damping;
        self.pending_polar *= 1.0 - damping;
        self.pending_scale = 1.0;
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn eye(&self) -> Vec3 {
        let sin_polar = self.polar.sin();
        Vec3::new(
            self.radius * sin_polar * self.azimuth.sin(),
            self.radius * self.polar.cos(),
            self.radius * sin_polar * self.azimuth.cos(),
        )
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.settings.field_of_view_degrees.to_radians(),
            aspect_ratio.max(f32::EPSILON),
            self.settings.near_plane,
            self.settings.far_plane,
        )
    }

    pub fn view_projection(&self, aspect_ratio: f32) -> Mat4 {
        self.projection(aspect_ratio) * self.view()
    }

    fn clamp_state(&mut self) {
        self.polar = self.polar.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.radius = self
            .radius
            .clamp(self.settings.min_distance, self.settings.max_distance);
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(OrbitSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_configured_position() {
        let camera = OrbitCamera::default();
        let eye = camera.eye();
        assert!((eye - Vec3::new(0.0, 8.0, 15.0)).length() < 1.0e-4);
        assert!((camera.distance() - 17.0).abs() < 1.0e-4);
    }

    #[test]
    fn zoom_respects_distance_limits() {
        let mut camera = OrbitCamera::default();
        for _ in 0..200 {
            camera.zoom(1.0);
            camera.update();
        }
        assert!((camera.distance() - 8.0).abs() < 1.0e-4);
        for _ in 0..500 {
            camera.zoom(-1.0);
            camera.update();
        }
        assert!((camera.distance() - 100.0).abs() < 1.0e-3);
    }

    #[test]
    fn rotation_is_damped_and_keeps_distance() {
        let mut camera = OrbitCamera::default();
        let start = camera.eye();
        camera.rotate(100.0, 0.0, 800.0);
        camera.update();
        let after_one = camera.eye();
        assert!((after_one - start).length() > 0.0);
        for _ in 0..600 {
            camera.update();
        }
        let settled = camera.eye();
        camera.update();
        assert!((camera.eye() - settled).length() < 1.0e-4);
        assert!((settled.length() - 17.0).abs() < 1.0e-3);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let mut camera = OrbitCamera::default();
        for _ in 0..100 {
            camera.rotate(0.0, 10_000.0, 100.0);
            camera.update();
        }
        assert!(camera.eye().y > 0.0);
        assert!(camera.view_projection(1.5).is_finite());
    }
}
