//! Ray primitives for picking.
//!
//! Ray-triangle intersection uses the Moller-Trumbore algorithm; ray-box tests
//! use the slab method so the BVH can reject whole subtrees.

use glam::{Mat4, Vec3};

use crate::constants::RAY_EPSILON;

/// A ray with an origin and a (not necessarily unit) direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Build a ray through two points.
    pub fn between(from: Vec3, to: Vec3) -> Self {
        Self::new(from, (to - from).normalize_or_zero())
    }

    /// Transform the ray by an affine matrix.
    ///
    /// The direction is re-normalized, so `t` values stay in the destination
    /// space's units.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction).normalize_or_zero(),
        )
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Intersect with a plane. Returns the ray parameter of the hit.
    pub fn intersect_plane(&self, origin: Vec3, normal: Vec3) -> Option<f32> {
        let denom = normal.dot(self.direction);
        if denom.abs() < RAY_EPSILON {
            return None;
        }
        Some((origin - self.origin).dot(normal) / denom)
    }
}

/// Result of a ray-triangle intersection test
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Distance along the ray to the intersection point
    pub t: f32,
    /// Barycentric coordinate u (weight for vertex 1)
    pub u: f32,
    /// Barycentric coordinate v (weight for vertex 2)
    pub v: f32,
}

impl TriangleHit {
    /// Weights for vertices 0, 1 and 2.
    pub fn barycentric(&self) -> Vec3 {
        Vec3::new(1.0 - self.u - self.v, self.u, self.v)
    }
}

/// Moller-Trumbore ray-triangle intersection. Both faces of the triangle are
/// hit; only hits in front of the ray origin are reported.
pub fn ray_triangle_intersection(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray_dir.cross(edge2);
    let det = edge1.dot(pvec);

    // Ray parallel to the triangle plane
    if det.abs() < RAY_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray_origin - v0;

    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray_dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < RAY_EPSILON {
        return None;
    }

    Some(TriangleHit { t, u, v })
}

/// Slab test against an axis-aligned box. Returns the entry distance when the
/// box is hit in front of the origin (0 when the origin is inside).
pub fn ray_aabb_intersection(origin: Vec3, inv_dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let t1 = (min - origin) * inv_dir;
    let t2 = (max - origin) * inv_dir;
    let t_near = t1.min(t2).max_element();
    let t_far = t1.max(t2).min_element();
    if t_near > t_far || t_far < 0.0 {
        return None;
    }
    Some(t_near.max(0.0))
}

/// Interpolate a Vec3 attribute using barycentric weights.
pub fn interpolate_vec3(values: [Vec3; 3], barycentric: Vec3) -> Vec3 {
    values[0] * barycentric.x + values[1] * barycentric.y + values[2] * barycentric.z
}
