//! Real-time approximation of light deflection around the hole.
//!
//! The curve is not a geodesic integration. It only has to satisfy a few
//! qualitative constraints: bending grows toward the critical radius, fades
//! to the identity mapping at `max_radius`, is continuous everywhere, and
//! never divides by a radius smaller than [`MIN_SAMPLE_RADIUS`].
//!
//! ```text
//!   magnitude(r) = gain * strength * rc^2 / max(r, r_min) * (1 - smoothstep(rc, r_max, r))
//! ```
//!
//! The GLSL programs in the renderer's `gpu::shaders` module reimplement the
//! same functions; keep both sides in step when changing a formula here.

use std::f64::consts::TAU;

use glam::{Vec2, Vec3};

/// Radius of the opaque event-horizon core in scene units.
pub const HORIZON_RADIUS: f32 = 1.5;
/// The photon sphere sits at 1.5x the horizon radius.
pub const PHOTON_SPHERE_RADIUS: f32 = HORIZON_RADIUS * 1.5;
pub const DISK_INNER_RADIUS: f32 = 2.5;
pub const DISK_OUTER_RADIUS: f32 = 8.0;
pub const WARPED_DISK_INNER_RADIUS: f32 = 3.0;
pub const WARPED_DISK_OUTER_RADIUS: f32 = 7.0;
/// Samples closer to the singularity than this are clamped before division.
pub const MIN_SAMPLE_RADIUS: f32 = 1.0e-3;
/// Angular rate of the photon-sphere pulse in radians per second.
pub const PHOTON_PULSE_RATE: f64 = 2.0;
/// Height of the disk warp relative to the deflection magnitude.
pub const DISK_WARP_GAIN: f32 = 0.35;

/// Critical radius of the 2D lens in height-normalised screen units.
pub const SCREEN_CRITICAL_RADIUS: f32 = 0.12;
/// Lensing fades out completely at this multiple of the critical radius.
pub const FADE_OUT_FACTOR: f32 = 6.0;
const DEFLECTION_GAIN: f32 = 0.5;

/// Shape of the deflection curve around one critical radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensProfile {
    pub critical_radius: f32,
    pub max_radius: f32,
    pub gain: f32,
}

impl LensProfile {
    /// Profile used by the 2D full-screen quad (height-normalised units).
    pub fn screen() -> Self {
        Self {
            critical_radius: SCREEN_CRITICAL_RADIUS,
            max_radius: SCREEN_CRITICAL_RADIUS * FADE_OUT_FACTOR,
            gain: DEFLECTION_GAIN,
        }
    }

    /// Profile used for object-space warping of the 3D surfaces.
    pub fn object() -> Self {
        Self {
            critical_radius: HORIZON_RADIUS,
            max_radius: HORIZON_RADIUS * FADE_OUT_FACTOR,
            gain: DEFLECTION_GAIN,
        }
    }

    /// Distance a sample at `radius` is pulled toward the centre.
    pub fn deflection_magnitude(&self, radius: f32, strength: f32) -> f32 {
        let r = radius.max(MIN_SAMPLE_RADIUS);
        let window = 1.0 - smoothstep(self.critical_radius, self.max_radius, r);
        let rc = self.critical_radius;
        self.gain * strength.max(0.0) * rc * rc / r * window
    }

    /// Distorted background lookup for a UV sample in `[0, 1]^2`.
    ///
    /// `aspect` is width / height; the lens is centred on the screen and is
    /// kept circular by working in height-normalised coordinates.
    pub fn deflect_uv(&self, uv: Vec2, aspect: f32, strength: f32) -> Vec2 {
        let scale = Vec2::new(aspect.max(f32::EPSILON), 1.0);
        let p = (uv - Vec2::splat(0.5)) * scale;
        let radius = p.length();
        let direction = p / radius.max(MIN_SAMPLE_RADIUS);
        let bent = p - direction * self.deflection_magnitude(radius, strength);
        bent / scale + Vec2::splat(0.5)
    }

    /// Coverage of the background at `radius`: 0 inside the horizon, 1 outside.
    pub fn horizon_mask(&self, radius: f32) -> f32 {
        smoothstep(self.critical_radius * 0.97, self.critical_radius, radius)
    }

    /// Brightness of the thin photon ring drawn at 1.5x the critical radius.
    pub fn photon_ring(&self, radius: f32) -> f32 {
        let width = self.critical_radius * 0.08;
        let offset = (radius - self.critical_radius * 1.5) / width;
        (-offset * offset).exp()
    }
}

impl Default for LensProfile {
    fn default() -> Self {
        Self::screen()
    }
}

/// Radiance and coverage produced by one emissive surface sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    pub rgb: Vec3,
    pub alpha: f32,
}

/// Lifts disk vertices out of plane, most strongly at the inner edge.
pub fn warp_disk_vertex(position: Vec3, strength: f32) -> Vec3 {
    let radius = Vec2::new(position.x, position.z).length();
    let lift = DISK_WARP_GAIN * LensProfile::object().deflection_magnitude(radius, strength);
    Vec3::new(position.x, position.y + lift, position.z)
}

/// Emission of the accretion disk at polar coordinates `(radius, angle)`.
///
/// `phase` is the wrapped rotation phase; only integer multiples of it are
/// used so the pattern repeats exactly every `2pi / rotation_speed` seconds.
pub fn disk_emission(radius: f32, angle: f32, phase: f32, color: Vec3, opacity: f32) -> Emission {
    let t = ((radius - DISK_INNER_RADIUS) / (DISK_OUTER_RADIUS - DISK_INNER_RADIUS)).clamp(0.0, 1.0);
    let falloff = (1.0 - t).powf(1.5);
    let inner_glow = 1.0 + 1.5 * (-8.0 * t).exp();
    let swirl = 3.0 * angle - 2.0 * phase + 8.0 * radius.max(MIN_SAMPLE_RADIUS).ln();
    let band = 0.75 + 0.25 * swirl.sin();
    let doppler = (angle + phase).sin() * 0.5 + 0.5;
    let tint = Vec3::new(1.2, 0.85, 0.7).lerp(Vec3::new(0.8, 0.95, 1.3), doppler);
    let intensity = falloff * inner_glow * band;
    Emission {
        rgb: color * tint * intensity,
        alpha: (opacity * falloff * band).clamp(0.0, 1.0),
    }
}

/// Pulsing glow of the photon sphere shell.
pub fn photon_sphere_glow(pulse_phase: f32) -> Emission {
    let pulse = pulse_phase.sin() * 0.5 + 0.5;
    Emission {
        rgb: Vec3::new(0.4, 0.6, 1.0) * pulse * 0.3,
        alpha: pulse * 0.2,
    }
}

/// Opaque horizon core with a faint warm rim at grazing angles.
pub fn horizon_shade(view_dot_normal: f32) -> Emission {
    let rim = (1.0 - view_dot_normal.abs().clamp(0.0, 1.0)).powi(4);
    Emission {
        rgb: Vec3::new(1.0, 0.45, 0.15) * rim * 0.08,
        alpha: 1.0,
    }
}

/// Reduces `elapsed * angular_speed` modulo 2pi in double precision.
///
/// Elapsed time grows without bound over a session; doing the reduction
/// before narrowing keeps shader trigonometry precise after hours of uptime.
pub fn wrap_phase(elapsed_seconds: f64, angular_speed: f64) -> f32 {
    (elapsed_seconds * angular_speed).rem_euclid(TAU) as f32
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
