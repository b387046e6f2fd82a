//! Geometry store for one resolution level.
//!
//! Vertex attributes live in parallel arrays indexed by vertex id; faces index
//! into them. Every geometry edit ends with [`Mesh::update_geometry`] so normals,
//! bounds and the BVH never go stale.

use glam::{Mat4, Vec3};
use relief_config::SpatialConfig;

use crate::constants::{DEFAULT_COLOR, TRI_INDEX};
use crate::dirty::DirtyRange;
use crate::spatial::{Aabb, Bvh};
use crate::topology::Topology;
use crate::types::{Face, Material, MeshError, SymmetryPlane};

#[derive(Debug, Clone)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec3>,
    materials: Vec<Material>,
    faces: Vec<Face>,
    /// Unnormalized face normals; their length is twice the face area.
    face_normals: Vec<Vec3>,
    topology: Topology,
    bvh: Bvh,
    bounds: Aabb,
    center: Vec3,
    matrix: Mat4,
    visible: bool,
    symmetry: SymmetryPlane,
    dirty: DirtyRange,
    spatial: SpatialConfig,
}

/// Check that every face has 3 distinct valid indices plus the sentinel, or
/// 4 distinct valid indices.
pub fn validate_faces(faces: &[Face], vertex_count: usize) -> Result<(), MeshError> {
    for (index, face) in faces.iter().enumerate() {
        if face.0[..3].contains(&TRI_INDEX) {
            return Err(MeshError::MisplacedSentinel(index));
        }
        let corners = face.corners();
        for (i, &vertex) in corners.iter().enumerate() {
            if vertex as usize >= vertex_count {
                return Err(MeshError::VertexOutOfRange {
                    face: index,
                    vertex,
                    count: vertex_count,
                });
            }
            if corners[i + 1..].contains(&vertex) {
                return Err(MeshError::DuplicateCorner(index));
            }
        }
    }
    Ok(())
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<(), MeshError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MeshError::AttributeLength {
            name,
            expected,
            actual,
        })
    }
}

impl Mesh {
    /// Create a mesh with default colors and materials.
    pub fn new(positions: Vec<Vec3>, faces: Vec<Face>) -> Result<Self, MeshError> {
        Self::with_config(positions, faces, &SpatialConfig::default())
    }

    pub fn with_config(
        positions: Vec<Vec3>,
        faces: Vec<Face>,
        config: &SpatialConfig,
    ) -> Result<Self, MeshError> {
        let count = positions.len();
        Self::with_attributes(
            positions,
            faces,
            vec![Vec3::from(DEFAULT_COLOR); count],
            vec![Material::default(); count],
            config,
        )
    }

    /// Create a mesh from a full set of vertex attributes.
    pub fn with_attributes(
        positions: Vec<Vec3>,
        faces: Vec<Face>,
        colors: Vec<Vec3>,
        materials: Vec<Material>,
        config: &SpatialConfig,
    ) -> Result<Self, MeshError> {
        let count = positions.len();
        check_len("colors", count, colors.len())?;
        check_len("materials", count, materials.len())?;
        validate_faces(&faces, count)?;

        let mut mesh = Self {
            normals: vec![Vec3::ZERO; count],
            face_normals: vec![Vec3::ZERO; faces.len()],
            positions,
            colors,
            materials,
            faces,
            topology: Topology::default(),
            bvh: Bvh::default(),
            bounds: Aabb::empty(),
            center: Vec3::ZERO,
            matrix: Mat4::IDENTITY,
            visible: true,
            symmetry: SymmetryPlane::default(),
            dirty: DirtyRange::new(),
            spatial: config.clone(),
        };
        mesh.rebuild();
        Ok(mesh)
    }

    /// Recompute everything derived from the face arrays.
    fn rebuild(&mut self) {
        self.normals.resize(self.positions.len(), Vec3::ZERO);
        self.face_normals.resize(self.faces.len(), Vec3::ZERO);
        self.topology = Topology::build(self.positions.len(), &self.faces);
        self.update_geometry(None);
        self.compute_center();
        self.dirty.topology_changed = true;
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Triangles as rendered: quads count twice.
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(|f| f.len() - 2).sum()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Mutable positions. Callers must follow up with [`Mesh::update_geometry`].
    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut [Vec3] {
        &mut self.colors
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }

    /// Mark color/material edits for upload.
    pub fn mark_colors_dirty(&mut self, vertices: &[u32]) {
        self.dirty.mark_all(vertices.iter().copied());
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Unit normal of a face.
    pub fn face_normal(&self, face: u32) -> Vec3 {
        self.face_normals[face as usize].normalize_or_zero()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn vertex_neighbors(&self, vertex: u32) -> &[u32] {
        self.topology.neighbors_of(vertex)
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn spatial_config(&self) -> &SpatialConfig {
        &self.spatial
    }

    /// Local bounding box.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Bounding box of the mesh in world space.
    pub fn world_bounds(&self) -> Aabb {
        self.bounds.transformed(&self.matrix)
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
    }

    pub fn inverse_matrix(&self) -> Mat4 {
        self.matrix.inverse()
    }

    /// Uniform scale factor of the world matrix.
    pub fn scale(&self) -> f32 {
        self.matrix.x_axis.truncate().length()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn symmetry_plane(&self) -> SymmetryPlane {
        self.symmetry
    }

    pub fn set_symmetry_plane(&mut self, plane: SymmetryPlane) {
        self.symmetry = plane;
    }

    pub fn dirty(&self) -> &DirtyRange {
        &self.dirty
    }

    /// Flag every vertex and the face arrays for re-upload.
    pub fn mark_topology_dirty(&mut self) {
        self.dirty.mark_everything(self.positions.len(), true);
    }

    /// Drain the dirty span for the rendering collaborator.
    pub fn take_dirty(&mut self) -> DirtyRange {
        std::mem::take(&mut self.dirty)
    }

    /// Hand the dirty span and the arrays it indexes to the rendering
    /// collaborator, then clear it. Returns false without calling `upload`
    /// when nothing is dirty.
    pub fn upload_buffers(&mut self, upload: impl FnOnce(&Mesh, &DirtyRange)) -> bool {
        let dirty = self.take_dirty();
        if dirty.is_empty() {
            return false;
        }
        upload(self, &dirty);
        true
    }

    /// Recompute the local bounding-box center.
    pub fn compute_center(&mut self) -> Vec3 {
        self.center = if self.bounds.is_empty() {
            Vec3::ZERO
        } else {
            self.bounds.center()
        };
        self.center
    }

    /// Scale local positions about the box center so the box diagonal equals
    /// `target_diagonal`.
    pub fn normalize_size(&mut self, target_diagonal: f32) {
        let diagonal = self.bounds.diagonal();
        if diagonal <= f32::EPSILON {
            tracing::warn!("Cannot normalize a mesh with an empty bounding box");
            return;
        }
        let center = self.bounds.center();
        let factor = target_diagonal / diagonal;
        for position in &mut self.positions {
            *position = center + (*position - center) * factor;
        }
        self.update_geometry(None);
        self.compute_center();
    }

    fn compute_face_normal(&self, face: usize) -> Vec3 {
        self.faces[face]
            .triangles()
            .map(|tri| {
                let [a, b, c] = tri.map(|v| self.positions[v as usize]);
                (b - a).cross(c - a)
            })
            .sum()
    }

    fn compute_vertex_normal(&self, vertex: u32) -> Vec3 {
        self.topology
            .faces_of(vertex)
            .iter()
            .map(|&f| self.face_normals[f as usize])
            .sum::<Vec3>()
            .normalize_or_zero()
    }

    /// Refresh derived data after a position edit.
    ///
    /// With `Some(vertices)`, normals of the faces around those vertices and of
    /// their corners are recomputed, the bounds grow to include them and the
    /// BVH leaves holding those faces are refit. `None` recomputes everything
    /// and rebuilds the BVH.
    pub fn update_geometry(&mut self, vertices: Option<&[u32]>) {
        match vertices {
            None => {
                for face in 0..self.faces.len() {
                    self.face_normals[face] = self.compute_face_normal(face);
                }
                for vertex in 0..self.positions.len() {
                    self.normals[vertex] = self.compute_vertex_normal(vertex as u32);
                }
                self.bounds = Aabb::from_points(self.positions.iter().copied());
                self.bvh = Bvh::build(&self.positions, &self.faces, &self.spatial);
                self.dirty.mark_everything(self.positions.len(), false);
            }
            Some(vertices) => {
                if vertices.is_empty() {
                    return;
                }
                let faces = self.topology.faces_around(vertices);
                for &face in &faces {
                    self.face_normals[face as usize] = self.compute_face_normal(face as usize);
                }

                let mut corners: Vec<u32> = faces
                    .iter()
                    .flat_map(|&f| self.faces[f as usize].corners().iter().copied())
                    .chain(vertices.iter().copied())
                    .collect();
                corners.sort_unstable();
                corners.dedup();
                for &vertex in &corners {
                    self.normals[vertex as usize] = self.compute_vertex_normal(vertex);
                }

                for &vertex in vertices {
                    self.bounds.include_point(self.positions[vertex as usize]);
                }
                self.bvh.refit(&self.positions, &self.faces, faces);
                self.dirty.mark_all(corners);
            }
        }
    }

    /// Vertices within `sqrt(radius_squared)` of `center` (local space),
    /// ascending. Only faces returned by the BVH are visited.
    pub fn vertices_in_sphere(&self, center: Vec3, radius_squared: f32) -> Vec<u32> {
        let mut vertices: Vec<u32> = self
            .bvh
            .faces_in_sphere(center, radius_squared)
            .into_iter()
            .flat_map(|f| self.faces[f as usize].corners().iter().copied())
            .filter(|&v| self.positions[v as usize].distance_squared(center) <= radius_squared)
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    /// Append another mesh, transformed into this mesh's local space.
    pub fn merge(&mut self, other: &Mesh) {
        let to_local = self.matrix.inverse() * other.matrix;
        let offset = self.positions.len() as u32;

        self.positions
            .extend(other.positions.iter().map(|&p| to_local.transform_point3(p)));
        self.colors.extend_from_slice(&other.colors);
        self.materials.extend_from_slice(&other.materials);
        self.faces.extend(other.faces.iter().map(|face| {
            Face(face.0.map(|v| if v == TRI_INDEX { v } else { v + offset }))
        }));

        tracing::debug!(
            "Merged {} vertices into mesh ({} total)",
            other.vertex_count(),
            self.vertex_count()
        );
        self.rebuild();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    #[test]
    fn test_rejects_invalid_faces() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert_eq!(
            Mesh::new(positions.clone(), vec![Face::triangle(0, 1, 3)]).unwrap_err(),
            MeshError::VertexOutOfRange {
                face: 0,
                vertex: 3,
                count: 3
            }
        );
        assert_eq!(
            Mesh::new(positions.clone(), vec![Face::triangle(0, 1, 1)]).unwrap_err(),
            MeshError::DuplicateCorner(0)
        );
        assert_eq!(
            Mesh::new(positions, vec![Face([0, TRI_INDEX, 1, 2])]).unwrap_err(),
            MeshError::MisplacedSentinel(0)
        );
    }

    #[test]
    fn test_attribute_length_checked() {
        let result = Mesh::with_attributes(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Face::triangle(0, 1, 2)],
            vec![Vec3::ONE; 2],
            vec![Material::default(); 3],
            &SpatialConfig::default(),
        );
        assert!(matches!(result, Err(MeshError::AttributeLength { .. })));
    }

    #[test]
    fn test_plane_normals_point_up() {
        let mesh = primitives::plane(4, 2.0).unwrap();
        for normal in mesh.normals() {
            assert!((*normal - Vec3::Z).length() < 1e-5);
        }
        assert_eq!(mesh.triangle_count(), 32);
    }

    #[test]
    fn test_partial_update_matches_full_update() {
        let mut partial = primitives::sphere(8, 12).unwrap();
        let moved: Vec<u32> = (0..10).collect();
        for &v in &moved {
            partial.positions_mut()[v as usize] *= 1.2;
        }
        partial.update_geometry(Some(&moved));

        let mut full = partial.clone();
        full.update_geometry(None);

        for (a, b) in partial.normals().iter().zip(full.normals()) {
            assert!((*a - *b).length() < 1e-5);
        }
    }

    #[test]
    fn test_vertices_in_sphere_matches_scan() {
        let mesh = primitives::sphere(10, 16).unwrap();
        let center = mesh.positions()[7];
        let radius_squared = 0.3;
        let expected: Vec<u32> = (0..mesh.vertex_count() as u32)
            .filter(|&v| mesh.positions()[v as usize].distance_squared(center) <= radius_squared)
            .collect();
        assert_eq!(mesh.vertices_in_sphere(center, radius_squared), expected);
    }

    #[test]
    fn test_normalize_size() {
        let mut mesh = primitives::cube().unwrap();
        mesh.normalize_size(100.0);
        assert!((mesh.bounds().diagonal() - 100.0).abs() < 1e-3);
        assert!(mesh.center().length() < 1e-4);
    }

    #[test]
    fn test_merge_transforms_into_local_space() {
        let mut a = primitives::cube().unwrap();
        let mut b = primitives::cube().unwrap();
        b.set_matrix(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        a.set_matrix(Mat4::from_scale(Vec3::splat(2.0)));
        a.take_dirty();

        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.face_count(), 12);
        let world = a.matrix().transform_point3(a.positions()[8]);
        let expected = b.matrix().transform_point3(b.positions()[0]);
        assert!((world - expected).length() < 1e-4);
        assert!(a.take_dirty().topology_changed);
    }

    #[test]
    fn test_take_dirty_drains() {
        let mut mesh = primitives::plane(2, 1.0).unwrap();
        mesh.take_dirty();
        mesh.positions_mut()[4].z = 1.0;
        mesh.update_geometry(Some(&[4]));
        let dirty = mesh.take_dirty();
        assert!(dirty.vertices.is_some_and(|r| r.contains(&4)));
        assert!(mesh.take_dirty().is_empty());
    }

    #[test]
    fn test_upload_buffers_flushes_once() {
        let mut mesh = primitives::plane(2, 1.0).unwrap();
        mesh.take_dirty();
        mesh.positions_mut()[5].z = 0.5;
        mesh.update_geometry(Some(&[5]));

        let mut uploaded = None;
        assert!(mesh.upload_buffers(|mesh, dirty| {
            uploaded = dirty.vertices.clone().map(|r| mesh.positions()[r.start as usize..r.end as usize].len());
        }));
        assert!(uploaded.is_some_and(|n| n > 0));
        assert!(!mesh.upload_buffers(|_, _| panic!("nothing to upload")));
    }
}
