//! Core value types shared by the geometry store, picking and sculpting.

use std::ops::{Add, Sub};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_METALNESS, DEFAULT_ROUGHNESS, TRI_INDEX};

/// Stable identifier of a mesh inside a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u32);

/// A triangle or quad face.
///
/// Triangles store [`TRI_INDEX`] in the fourth slot. A quad `(v0, v1, v2, v3)`
/// is geometrically the two triangles `(v0, v1, v2)` and `(v0, v2, v3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(transparent)]
pub struct Face(pub [u32; 4]);

impl Face {
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self([a, b, c, TRI_INDEX])
    }

    pub fn quad(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self([a, b, c, d])
    }

    pub fn is_triangle(&self) -> bool {
        self.0[3] == TRI_INDEX
    }

    /// Number of corners (3 or 4).
    pub fn len(&self) -> usize {
        if self.is_triangle() { 3 } else { 4 }
    }

    /// Corner vertex indices without the sentinel.
    pub fn corners(&self) -> &[u32] {
        &self.0[..self.len()]
    }

    /// The one or two triangles this face is made of.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> {
        let [a, b, c, d] = self.0;
        let second = (d != TRI_INDEX).then_some([a, c, d]);
        std::iter::once([a, b, c]).chain(second)
    }

    /// Boundary edges in winding order. Quads do not report their diagonal.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let corners = self.corners();
        let n = corners.len();
        (0..n).map(move |i| (corners[i], corners[(i + 1) % n]))
    }
}

/// Per-vertex material channels.
///
/// `selection` doubles as the sculpting mask: deformation tools scale their
/// influence by `1 - selection`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Material {
    pub roughness: f32,
    pub metalness: f32,
    pub selection: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            roughness: DEFAULT_ROUGHNESS,
            metalness: DEFAULT_METALNESS,
            selection: 0.0,
        }
    }
}

impl Material {
    pub fn new(roughness: f32, metalness: f32, selection: f32) -> Self {
        Self {
            roughness,
            metalness,
            selection,
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            self.roughness * factor,
            self.metalness * factor,
            self.selection * factor,
        )
    }

    /// Clamp every channel into 0..1.
    pub fn saturated(self) -> Self {
        Self::new(
            self.roughness.clamp(0.0, 1.0),
            self.metalness.clamp(0.0, 1.0),
            self.selection.clamp(0.0, 1.0),
        )
    }
}

impl Add for Material {
    type Output = Material;

    fn add(self, rhs: Material) -> Material {
        Material::new(
            self.roughness + rhs.roughness,
            self.metalness + rhs.metalness,
            self.selection + rhs.selection,
        )
    }
}

impl Sub for Material {
    type Output = Material;

    fn sub(self, rhs: Material) -> Material {
        Material::new(
            self.roughness - rhs.roughness,
            self.metalness - rhs.metalness,
            self.selection - rhs.selection,
        )
    }
}

/// Mirror plane used by symmetric editing, in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymmetryPlane {
    pub origin: Vec3,
    pub normal: Vec3,
}

impl Default for SymmetryPlane {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            normal: Vec3::X,
        }
    }
}

impl SymmetryPlane {
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.normalize_or(Vec3::X),
        }
    }

    /// Reflect a point across the plane.
    pub fn mirror_point(&self, point: Vec3) -> Vec3 {
        point - 2.0 * (point - self.origin).dot(self.normal) * self.normal
    }

    /// Reflect a direction across the plane.
    pub fn mirror_vector(&self, vector: Vec3) -> Vec3 {
        vector - 2.0 * vector.dot(self.normal) * self.normal
    }
}

/// Errors raised while building or validating mesh data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("Face {face} references vertex {vertex} but the mesh has {count} vertices")]
    VertexOutOfRange { face: usize, vertex: u32, count: usize },

    #[error("Face {0} repeats a vertex index")]
    DuplicateCorner(usize),

    #[error("Face {0} has the triangle sentinel before its last slot")]
    MisplacedSentinel(usize),

    #[error("Attribute '{name}' has {actual} entries, expected {expected}")]
    AttributeLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Level {0} does not match its correspondence map")]
    LevelMismatch(usize),

    #[error("Active level {active} is out of range for {count} levels")]
    ActiveLevelOutOfRange { active: usize, count: usize },

    #[error("Alpha mask is {width}x{height} but has {actual} texels")]
    AlphaSize { width: u32, height: u32, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_corners() {
        let tri = Face::triangle(0, 1, 2);
        let quad = Face::quad(0, 1, 2, 3);
        assert_eq!(tri.corners(), &[0, 1, 2]);
        assert_eq!(quad.corners(), &[0, 1, 2, 3]);
        assert!(tri.is_triangle());
        assert!(!quad.is_triangle());
    }

    #[test]
    fn test_quad_splits_into_two_triangles() {
        let tris: Vec<_> = Face::quad(4, 5, 6, 7).triangles().collect();
        assert_eq!(tris, vec![[4, 5, 6], [4, 6, 7]]);
        let tris: Vec<_> = Face::triangle(1, 2, 3).triangles().collect();
        assert_eq!(tris, vec![[1, 2, 3]]);
    }

    #[test]
    fn test_quad_edges_skip_diagonal() {
        let edges: Vec<_> = Face::quad(0, 1, 2, 3).edges().collect();
        assert_eq!(edges, vec![(0, 1), (1, 2), (2, 3), (3, 0)]);
    }

    #[test]
    fn test_mirror_point() {
        let plane = SymmetryPlane::default();
        let mirrored = plane.mirror_point(Vec3::new(2.0, 3.0, -1.0));
        assert!((mirrored - Vec3::new(-2.0, 3.0, -1.0)).length() < 1e-6);

        let offset = SymmetryPlane::new(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        let mirrored = offset.mirror_point(Vec3::new(3.0, 0.0, 0.0));
        assert!((mirrored - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_material_arithmetic() {
        let a = Material::new(0.5, 0.25, 1.0);
        let b = Material::new(0.25, 0.25, 0.5);
        assert_eq!(a - b + b, a);
        assert_eq!(Material::new(2.0, -1.0, 0.5).saturated(), Material::new(1.0, 0.0, 0.5));
    }
}
