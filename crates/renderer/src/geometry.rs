//! CPU-side mesh generation for the render surfaces.
//!
//! Sphere and ring tessellation follow the usual UV-sphere / annulus layout
//! with counter-clockwise front faces seen from outside (sphere) or from +Y
//! (ring).

use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};

use crate::types::GeometryKind;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub kind: GeometryKind,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Unit quad in the XY plane centred on the origin; scaled by the model
    /// matrix to the frustum size.
    pub fn plane() -> Self {
        let corners = [
            ([-0.5, -0.5], [0.0, 0.0]),
            ([0.5, -0.5], [1.0, 0.0]),
            ([0.5, 0.5], [1.0, 1.0]),
            ([-0.5, 0.5], [0.0, 1.0]),
        ];
        let vertices = corners
            .iter()
            .map(|&([x, y], uv)| Vertex {
                position: [x, y, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv,
            })
            .collect();
        Self {
            kind: GeometryKind::FullScreenQuad,
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Flat annulus in the XZ plane. `uv.x` runs inner to outer edge and
    /// `uv.y` around the ring.
    pub fn ring(inner_radius: f32, outer_radius: f32, theta_segments: u32, phi_segments: u32) -> Self {
        let theta_segments = theta_segments.max(3);
        let phi_segments = phi_segments.max(1);
        let mut vertices = Vec::with_capacity(((theta_segments + 1) * (phi_segments + 1)) as usize);
        let radius_step = (outer_radius - inner_radius) / phi_segments as f32;

        for j in 0..=phi_segments {
            let radius = inner_radius + radius_step * j as f32;
            for i in 0..=theta_segments {
                let angle = TAU * i as f32 / theta_segments as f32;
                vertices.push(Vertex {
                    position: [radius * angle.cos(), 0.0, -radius * angle.sin()],
                    normal: [0.0, 1.0, 0.0],
                    uv: [j as f32 / phi_segments as f32, i as f32 / theta_segments as f32],
                });
            }
        }

        let row = theta_segments + 1;
        let mut indices = Vec::with_capacity((theta_segments * phi_segments * 6) as usize);
        for j in 0..phi_segments {
            for i in 0..theta_segments {
                let a = j * row + i;
                let b = a + 1;
                let c = a + row;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }

        Self {
            kind: GeometryKind::Ring,
            vertices,
            indices,
        }
    }

    /// UV sphere around the origin. Pole rows skip their degenerate triangles.
    pub fn sphere(kind: GeometryKind, radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let row = width_segments + 1;
        let mut vertices = Vec::with_capacity((row * (height_segments + 1)) as usize);

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let theta = v * PI;
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * TAU;
                let normal = [
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                ];
                vertices.push(Vertex {
                    position: [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                    normal,
                    uv: [u, 1.0 - v],
                });
            }
        }

        let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self {
            kind,
            vertices,
            indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_is_two_triangles() {
        let plane = MeshData::plane();
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.index_count(), 6);
        assert_eq!(plane.kind, GeometryKind::FullScreenQuad);
    }

    #[test]
    fn ring_vertices_stay_within_radii() {
        let ring = MeshData::ring(2.5, 8.0, 128, 32);
        assert_eq!(ring.vertices.len(), 129 * 33);
        assert_eq!(ring.index_count(), 128 * 32 * 6);
        for vertex in &ring.vertices {
            let [x, y, z] = vertex.position;
            let radius = (x * x + z * z).sqrt();
            assert!(radius >= 2.5 - 1.0e-4 && radius <= 8.0 + 1.0e-4);
            assert_eq!(y, 0.0);
        }
        assert!(ring.indices.iter().all(|&i| (i as usize) < ring.vertices.len()));
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = MeshData::sphere(GeometryKind::SphereCore, 1.5, 64, 32);
        assert_eq!(sphere.vertices.len(), 65 * 33);
        // Pole rows contribute one triangle per segment instead of two.
        assert_eq!(sphere.index_count(), (64 * 32 * 2 - 2 * 64) * 3);
        for vertex in &sphere.vertices {
            let [x, y, z] = vertex.position;
            assert!(((x * x + y * y + z * z).sqrt() - 1.5).abs() < 1.0e-4);
        }
        assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));
    }
}
