//! Output-size tracking for both render modes.
//!
//! The tracker turns window resize notifications into a [`ViewportState`]:
//! physical surface size, render resolution with the capped pixel ratio
//! applied, aspect ratio, the
//! projection parameters of the active mode, and the world-space size of the
//! full-screen quad at the fixed camera distance.

use glam::{Mat4, Vec2};

/// Camera model the viewport is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// 2D mode: fixed camera looking at a plane that covers the frustum.
    Quad,
    /// 3D mode: perspective camera orbiting the hole.
    Orbit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub quad_field_of_view_degrees: f32,
    pub orbit_field_of_view_degrees: f32,
    /// Distance from the 2D camera to the quad plane.
    pub quad_camera_distance: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Upper bound on the device pixel ratio used for rendering.
    pub max_pixel_ratio: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            quad_field_of_view_degrees: 75.0,
            orbit_field_of_view_degrees: 50.0,
            quad_camera_distance: 1.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            max_pixel_ratio: 2.0,
        }
    }
}

impl ViewportConfig {
    pub fn with_max_pixel_ratio(mut self, ratio: f32) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            self.max_pixel_ratio = ratio;
        }
        self
    }

    pub fn field_of_view(&self, projection: Projection) -> f32 {
        match projection {
            Projection::Quad => self.quad_field_of_view_degrees,
            Projection::Orbit => self.orbit_field_of_view_degrees,
        }
    }
}

/// Derived viewport geometry. Recomputed on every accepted resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Render target width in pixels (logical width times pixel scale).
    pub width: u32,
    pub height: u32,
    /// Physical window size. The swapchain is always configured at this
    /// size; only the offscreen scene targets use the capped resolution.
    pub surface_size: (u32, u32),
    pub aspect_ratio: f32,
    pub field_of_view_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Effective pixel scale after the cap was applied.
    pub device_pixel_scale: f32,
    /// World-space width and height of the full-screen quad.
    pub quad_size: Vec2,
}

impl ViewportState {
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.field_of_view_degrees.to_radians(),
            self.aspect_ratio,
            self.near_plane,
            self.far_plane,
        )
    }
}

/// What a resize notification did to the tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    Changed,
    Unchanged,
    /// Zero-area or malformed input; the previous state is kept.
    Degenerate,
}

#[derive(Debug, Clone)]
pub struct ViewportTracker {
    config: ViewportConfig,
    projection: Projection,
    physical: (u32, u32),
    scale_factor: f64,
    state: ViewportState,
    revision: u64,
}

impl ViewportTracker {
    /// Starts from a 1x1 surface until the first real resize arrives.
    pub fn new(config: ViewportConfig, projection: Projection) -> Self {
        let physical = (1, 1);
        let scale_factor = 1.0;
        let state = compute_state(&config, projection, physical, scale_factor);
        Self {
            config,
            projection,
            physical,
            scale_factor,
            state,
            revision: 0,
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    /// Incremented every time the state changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Applies a resize reported in physical pixels.
    pub fn resize(&mut self, physical_width: u32, physical_height: u32, scale_factor: f64) -> ResizeOutcome {
        if physical_width == 0 || physical_height == 0 || !scale_factor.is_finite() || scale_factor <= 0.0 {
            return ResizeOutcome::Degenerate;
        }
        self.physical = (physical_width, physical_height);
        self.scale_factor = scale_factor;
        let next = compute_state(&self.config, self.projection, self.physical, scale_factor);
        self.commit(next)
    }

    /// Switches the camera model, keeping the last surface size.
    pub fn reconfigure(&mut self, projection: Projection) -> ResizeOutcome {
        self.projection = projection;
        let next = compute_state(&self.config, projection, self.physical, self.scale_factor);
        self.commit(next)
    }

    fn commit(&mut self, next: ViewportState) -> ResizeOutcome {
        if next == self.state {
            return ResizeOutcome::Unchanged;
        }
        self.state = next;
        self.revision = self.revision.wrapping_add(1);
        ResizeOutcome::Changed
    }
}

fn compute_state(
    config: &ViewportConfig,
    projection: Projection,
    physical: (u32, u32),
    scale_factor: f64,
) -> ViewportState {
    let pixel_scale = scale_factor.min(f64::from(config.max_pixel_ratio));
    // Logical size times the capped pixel scale.
    let scale_to_render = pixel_scale / scale_factor;
    let width = ((f64::from(physical.0) * scale_to_render).round() as u32).max(1);
    let height = ((f64::from(physical.1) * scale_to_render).round() as u32).max(1);
    let aspect_ratio = width as f32 / height as f32;
    let field_of_view_degrees = config.field_of_view(projection);
    let quad_height =
        2.0 * config.quad_camera_distance * (config.quad_field_of_view_degrees.to_radians() * 0.5).tan();
    ViewportState {
        width,
        height,
        surface_size: physical,
        aspect_ratio,
        field_of_view_degrees,
        near_plane: config.near_plane,
        far_plane: config.far_plane,
        device_pixel_scale: pixel_scale as f32,
        quad_size: Vec2::new(quad_height * aspect_ratio, quad_height),
    }
}
