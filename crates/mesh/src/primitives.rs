//! Procedural starting shapes.
//!
//! All primitives are centered on the origin, wound counter-clockwise when
//! seen from outside, and symmetric about the local x = 0 plane.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::mesh::Mesh;
use crate::types::{Face, MeshError};

/// A square grid of quads in the XY plane, facing +Z.
pub fn plane(subdivisions: u32, size: f32) -> Result<Mesh, MeshError> {
    let n = subdivisions.max(1);
    let step = size / n as f32;
    let half = size * 0.5;

    let mut positions = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
    for y in 0..=n {
        for x in 0..=n {
            positions.push(Vec3::new(x as f32 * step - half, y as f32 * step - half, 0.0));
        }
    }

    let mut faces = Vec::with_capacity((n * n) as usize);
    for y in 0..n {
        for x in 0..n {
            let i = y * (n + 1) + x;
            faces.push(Face::quad(i, i + 1, i + n + 2, i + n + 1));
        }
    }
    Mesh::new(positions, faces)
}

/// A cube spanning -1..1 on every axis, made of 6 quads.
pub fn cube() -> Result<Mesh, MeshError> {
    let positions = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            )
        })
        .collect();
    let faces = vec![
        Face::quad(0, 2, 3, 1),
        Face::quad(4, 5, 7, 6),
        Face::quad(0, 1, 5, 4),
        Face::quad(2, 6, 7, 3),
        Face::quad(0, 4, 6, 2),
        Face::quad(1, 3, 7, 5),
    ];
    Mesh::new(positions, faces)
}

/// A unit UV sphere around the Z axis: quads in the body, triangle fans at the
/// poles. `segments` should be even to stay symmetric about x = 0.
pub fn sphere(rings: u32, segments: u32) -> Result<Mesh, MeshError> {
    let rings = rings.max(2);
    let segments = segments.max(3);

    let mut positions = vec![Vec3::Z];
    for k in 1..rings {
        let theta = PI * k as f32 / rings as f32;
        for j in 0..segments {
            let phi = TAU * j as f32 / segments as f32;
            positions.push(Vec3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    let bottom = positions.len() as u32;
    positions.push(Vec3::NEG_Z);

    let ring = |k: u32, j: u32| 1 + (k - 1) * segments + (j % segments);
    let mut faces = Vec::new();
    for j in 0..segments {
        faces.push(Face::triangle(0, ring(1, j), ring(1, j + 1)));
    }
    for k in 1..rings - 1 {
        for j in 0..segments {
            faces.push(Face::quad(
                ring(k, j),
                ring(k + 1, j),
                ring(k + 1, j + 1),
                ring(k, j + 1),
            ));
        }
    }
    for j in 0..segments {
        faces.push(Face::triangle(ring(rings - 1, j), bottom, ring(rings - 1, j + 1)));
    }
    Mesh::new(positions, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_counts() {
        let mesh = plane(3, 1.0).unwrap();
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.face_count(), 9);
        assert!(mesh.faces().iter().all(|f| !f.is_triangle()));
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let mesh = cube().unwrap();
        for face in 0..mesh.face_count() as u32 {
            let corners = mesh.faces()[face as usize].corners();
            let centroid: Vec3 =
                corners.iter().map(|&v| mesh.positions()[v as usize]).sum::<Vec3>() / 4.0;
            assert!(mesh.face_normal(face).dot(centroid) > 0.0);
        }
    }

    #[test]
    fn test_sphere_mixes_triangles_and_quads() {
        let mesh = sphere(6, 8).unwrap();
        assert_eq!(mesh.vertex_count(), 2 + 5 * 8);
        let triangles = mesh.faces().iter().filter(|f| f.is_triangle()).count();
        assert_eq!(triangles, 16);
        assert_eq!(mesh.face_count(), 16 + 4 * 8);
        for (position, normal) in mesh.positions().iter().zip(mesh.normals()) {
            assert!(normal.dot(*position) > 0.0);
        }
    }
}
