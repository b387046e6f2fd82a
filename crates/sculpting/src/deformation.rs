//! Vertex deformation algorithms for sculpting.
//!
//! Every function takes the `(vertex, weight)` pairs produced by
//! [`crate::brush::vertex_weights`] and writes local-space positions. Callers
//! capture history before the call and refresh derived geometry after it.

use glam::{Mat4, Quat, Vec3};
use relief_mesh::Mesh;

/// Scale factor that keeps one sample's displacement a fraction of the radius.
const STEP: f32 = 0.1;

/// Average normal of the given vertices.
pub fn area_normal(mesh: &Mesh, vertices: impl IntoIterator<Item = u32>) -> Vec3 {
    let normals = mesh.normals();
    vertices
        .into_iter()
        .map(|v| normals[v as usize])
        .sum::<Vec3>()
        .normalize_or_zero()
}

/// Centroid of the given vertices.
pub fn area_center(mesh: &Mesh, vertices: impl IntoIterator<Item = u32>) -> Vec3 {
    let positions = mesh.positions();
    let (sum, count) = vertices
        .into_iter()
        .fold((Vec3::ZERO, 0usize), |(sum, count), v| {
            (sum + positions[v as usize], count + 1)
        });
    if count == 0 {
        Vec3::ZERO
    } else {
        sum / count as f32
    }
}

/// Apply brush deformation - moves the ring along the area normal.
pub fn apply_brush(mesh: &mut Mesh, weights: &[(u32, f32)], normal: Vec3, radius: f32, sign: f32) {
    let offset = normal * radius * STEP * sign;
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        positions[v as usize] += offset * w;
    }
}

/// Apply inflate deformation - moves vertices along their own normals.
pub fn apply_inflate(mesh: &mut Mesh, weights: &[(u32, f32)], radius: f32, sign: f32) {
    let scale = radius * STEP * sign;
    let displacements: Vec<Vec3> = weights
        .iter()
        .map(|&(v, w)| mesh.normals()[v as usize] * scale * w)
        .collect();
    let positions = mesh.positions_mut();
    for (&(v, _), displacement) in weights.iter().zip(displacements) {
        positions[v as usize] += displacement;
    }
}

/// Apply crease deformation - pinches toward the center in the tangent plane
/// and carves along the area normal. Positive `sign` digs in.
pub fn apply_crease(
    mesh: &mut Mesh,
    weights: &[(u32, f32)],
    center: Vec3,
    normal: Vec3,
    radius: f32,
    sign: f32,
) {
    let carve = -normal * radius * STEP * 0.5 * sign;
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        let p = positions[v as usize];
        let to_center = center - p;
        let tangent = to_center - normal * to_center.dot(normal);
        positions[v as usize] = p + tangent * w * STEP * 2.0 + carve * w;
    }
}

/// Apply flatten deformation - moves vertices toward the plane through
/// `center` with normal `normal`.
pub fn apply_flatten(mesh: &mut Mesh, weights: &[(u32, f32)], center: Vec3, normal: Vec3) {
    if normal.length_squared() < 0.01 {
        return;
    }
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        let p = positions[v as usize];
        let dist_to_plane = (p - center).dot(normal);
        positions[v as usize] = p - normal * dist_to_plane * w;
    }
}

/// Apply pinch deformation - moves vertices toward the brush center.
pub fn apply_pinch(mesh: &mut Mesh, weights: &[(u32, f32)], center: Vec3, sign: f32) {
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        let p = positions[v as usize];
        positions[v as usize] = p + (center - p) * (w * STEP * 2.0 * sign).min(1.0);
    }
}

/// Umbrella Laplacian offsets of the given vertices: neighbor average minus
/// position. With `tangent`, the component along the vertex normal is removed.
pub fn laplacian_offsets(mesh: &Mesh, vertices: &[u32], tangent: bool) -> Vec<Vec3> {
    let positions = mesh.positions();
    let normals = mesh.normals();
    vertices
        .iter()
        .map(|&v| {
            let neighbors = mesh.vertex_neighbors(v);
            if neighbors.is_empty() {
                return Vec3::ZERO;
            }
            let average = neighbors
                .iter()
                .map(|&n| positions[n as usize])
                .sum::<Vec3>()
                / neighbors.len() as f32;
            let offset = average - positions[v as usize];
            if tangent {
                let normal = normals[v as usize];
                offset - normal * offset.dot(normal)
            } else {
                offset
            }
        })
        .collect()
}

/// Apply smooth deformation - blends vertices toward their neighbor average.
///
/// Two-pass: all offsets are computed from the unmodified positions first.
pub fn apply_smooth(mesh: &mut Mesh, weights: &[(u32, f32)], tangent: bool) {
    let vertices: Vec<u32> = weights.iter().map(|&(v, _)| v).collect();
    let offsets = laplacian_offsets(mesh, &vertices, tangent);
    let positions = mesh.positions_mut();
    for (&(v, w), offset) in weights.iter().zip(offsets) {
        positions[v as usize] += offset * w;
    }
}

/// Apply drag deformation - moves vertices by `delta` scaled by weight.
pub fn apply_translate(mesh: &mut Mesh, weights: &[(u32, f32)], delta: Vec3) {
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        positions[v as usize] += delta * w;
    }
}

/// A vertex frozen at gesture start by the move tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrozenVertex {
    pub vertex: u32,
    pub start: Vec3,
    pub weight: f32,
}

/// Apply move deformation - places frozen vertices at `start + delta × weight`.
pub fn apply_move(mesh: &mut Mesh, frozen: &[FrozenVertex], delta: Vec3) {
    let positions = mesh.positions_mut();
    for proxy in frozen {
        positions[proxy.vertex as usize] = proxy.start + delta * proxy.weight;
    }
}

/// Apply move deformation along each frozen vertex's own normal.
pub fn apply_move_along_normals(
    mesh: &mut Mesh,
    frozen: &[FrozenVertex],
    normals: &[Vec3],
    distance: f32,
) {
    let positions = mesh.positions_mut();
    for (proxy, normal) in frozen.iter().zip(normals) {
        positions[proxy.vertex as usize] = proxy.start + *normal * distance * proxy.weight;
    }
}

/// Apply twist deformation - rotates vertices about the axis through `center`.
pub fn apply_twist(mesh: &mut Mesh, weights: &[(u32, f32)], center: Vec3, axis: Vec3, angle: f32) {
    if axis.length_squared() < f32::EPSILON {
        return;
    }
    let axis = axis.normalize();
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        let rotation = Quat::from_axis_angle(axis, angle * w);
        let p = positions[v as usize];
        positions[v as usize] = center + rotation * (p - center);
    }
}

/// Apply local scale deformation - scales vertices about `center`.
pub fn apply_local_scale(mesh: &mut Mesh, weights: &[(u32, f32)], center: Vec3, factor: f32) {
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        let p = positions[v as usize];
        positions[v as usize] = center + (p - center) * (1.0 + factor * w).max(0.0);
    }
}

/// Apply a rigid or scaling transform, blended per vertex by weight.
pub fn apply_transform(mesh: &mut Mesh, weights: &[(u32, f32)], matrix: &Mat4) {
    let positions = mesh.positions_mut();
    for &(v, w) in weights {
        let p = positions[v as usize];
        positions[v as usize] = p.lerp(matrix.transform_point3(p), w);
    }
}
