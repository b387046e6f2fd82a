//! Multiresolution meshes.
//!
//! Levels are ordered coarse to fine. Each boundary between level `k` and
//! `k + 1` owns a [`LevelLink`]: for every fine vertex, which coarse element
//! it was refined from, plus the detail that the linear refinement of the
//! coarse level does not explain. The active level is authoritative; other
//! levels are synchronized from it when the active level changes.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;
use crate::types::{Face, Material, MeshError};

/// Blend weight of the smoothing pass applied to a freshly refined level.
const SUBDIVISION_SMOOTHING: f32 = 0.5;

/// Where a fine vertex comes from on the coarser level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correspondence {
    /// Copy of a coarse vertex.
    Vertex(u32),
    /// Midpoint of a coarse edge.
    Edge(u32, u32),
    /// Center of a coarse quad.
    FaceCenter(u32),
}

/// Link between a coarse level and the next finer one.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelLink {
    correspondence: Vec<Correspondence>,
    displacement: Vec<Vec3>,
    color_detail: Vec<Vec3>,
    material_detail: Vec<Material>,
}

impl LevelLink {
    /// Rebuild a link from stored parts. All arrays must have one entry per
    /// fine vertex.
    pub fn from_parts(
        correspondence: Vec<Correspondence>,
        displacement: Vec<Vec3>,
        color_detail: Vec<Vec3>,
        material_detail: Vec<Material>,
    ) -> Result<Self, MeshError> {
        let count = correspondence.len();
        for (name, len) in [
            ("displacement", displacement.len()),
            ("color_detail", color_detail.len()),
            ("material_detail", material_detail.len()),
        ] {
            if len != count {
                return Err(MeshError::AttributeLength {
                    name,
                    expected: count,
                    actual: len,
                });
            }
        }
        Ok(Self {
            correspondence,
            displacement,
            color_detail,
            material_detail,
        })
    }

    pub fn correspondence(&self) -> &[Correspondence] {
        &self.correspondence
    }

    /// Fine-level position detail in mesh-local space.
    pub fn displacement(&self) -> &[Vec3] {
        &self.displacement
    }

    pub fn color_detail(&self) -> &[Vec3] {
        &self.color_detail
    }

    pub fn material_detail(&self) -> &[Material] {
        &self.material_detail
    }

    fn fine_count(&self) -> usize {
        self.correspondence.len()
    }

    /// Check every reference against the coarse level.
    fn validate(&self, coarse: &Mesh) -> bool {
        let vertices = coarse.vertex_count() as u32;
        let faces = coarse.face_count() as u32;
        self.correspondence.iter().all(|c| match *c {
            Correspondence::Vertex(v) => v < vertices,
            Correspondence::Edge(a, b) => a < vertices && b < vertices,
            Correspondence::FaceCenter(f) => f < faces,
        })
    }
}

trait Average: Copy {
    fn average(values: &[Self]) -> Self;
}

impl Average for Vec3 {
    fn average(values: &[Self]) -> Self {
        values.iter().copied().sum::<Vec3>() / values.len() as f32
    }
}

impl Average for Material {
    fn average(values: &[Self]) -> Self {
        values
            .iter()
            .fold(Material::new(0.0, 0.0, 0.0), |acc, &m| acc + m)
            .scaled(1.0 / values.len() as f32)
    }
}

/// Linear refinement of a coarse attribute onto the fine vertices.
fn refine<T: Average>(correspondence: &[Correspondence], values: &[T], faces: &[Face]) -> Vec<T> {
    correspondence
        .iter()
        .map(|c| match *c {
            Correspondence::Vertex(v) => values[v as usize],
            Correspondence::Edge(a, b) => T::average(&[values[a as usize], values[b as usize]]),
            Correspondence::FaceCenter(f) => {
                let corners: Vec<T> = faces[f as usize]
                    .corners()
                    .iter()
                    .map(|&v| values[v as usize])
                    .collect();
                T::average(&corners)
            }
        })
        .collect()
}

/// Split every face at its edge midpoints (and quad centers).
///
/// Returns the fine faces and the correspondence of every fine vertex. The
/// first `coarse.vertex_count()` fine vertices are the coarse vertices.
fn split_faces(coarse: &Mesh) -> (Vec<Face>, Vec<Correspondence>) {
    let mut correspondence: Vec<Correspondence> = (0..coarse.vertex_count() as u32)
        .map(Correspondence::Vertex)
        .collect();
    let mut edge_vertex: HashMap<(u32, u32), u32> = HashMap::new();
    let mut midpoint = |a: u32, b: u32, correspondence: &mut Vec<Correspondence>| -> u32 {
        let key = (a.min(b), a.max(b));
        *edge_vertex.entry(key).or_insert_with(|| {
            correspondence.push(Correspondence::Edge(key.0, key.1));
            correspondence.len() as u32 - 1
        })
    };

    let mut faces = Vec::with_capacity(coarse.face_count() * 4);
    for (index, face) in coarse.faces().iter().enumerate() {
        match *face.corners() {
            [a, b, c] => {
                let ab = midpoint(a, b, &mut correspondence);
                let bc = midpoint(b, c, &mut correspondence);
                let ca = midpoint(c, a, &mut correspondence);
                faces.push(Face::triangle(a, ab, ca));
                faces.push(Face::triangle(ab, b, bc));
                faces.push(Face::triangle(ca, bc, c));
                faces.push(Face::triangle(ab, bc, ca));
            }
            [a, b, c, d] => {
                let ab = midpoint(a, b, &mut correspondence);
                let bc = midpoint(b, c, &mut correspondence);
                let cd = midpoint(c, d, &mut correspondence);
                let da = midpoint(d, a, &mut correspondence);
                correspondence.push(Correspondence::FaceCenter(index as u32));
                let m = correspondence.len() as u32 - 1;
                faces.push(Face::quad(a, ab, m, da));
                faces.push(Face::quad(ab, b, bc, m));
                faces.push(Face::quad(m, bc, c, cd));
                faces.push(Face::quad(da, m, cd, d));
            }
            _ => {}
        }
    }
    (faces, correspondence)
}

/// One Laplacian pass on interior vertices; boundary vertices stay put so
/// open surfaces keep their outline.
fn smooth_interior(mesh: &Mesh, positions: &[Vec3]) -> Vec<Vec3> {
    let topology = mesh.topology();
    (0..positions.len() as u32)
        .map(|v| {
            let neighbors = topology.neighbors_of(v);
            let p = positions[v as usize];
            if neighbors.is_empty() || topology.is_boundary(v) {
                return p;
            }
            let average =
                neighbors.iter().map(|&n| positions[n as usize]).sum::<Vec3>() / neighbors.len() as f32;
            p + (average - p) * SUBDIVISION_SMOOTHING
        })
        .collect()
}

/// A hierarchy of mesh levels with exactly one active level.
#[derive(Debug, Clone)]
pub struct MultiresMesh {
    levels: Vec<Mesh>,
    links: Vec<LevelLink>,
    active: usize,
}

impl From<Mesh> for MultiresMesh {
    fn from(mesh: Mesh) -> Self {
        Self::new(mesh)
    }
}

impl MultiresMesh {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            levels: vec![mesh],
            links: Vec::new(),
            active: 0,
        }
    }

    /// Rebuild a hierarchy from stored levels and links.
    pub fn from_parts(
        levels: Vec<Mesh>,
        links: Vec<LevelLink>,
        active: usize,
    ) -> Result<Self, MeshError> {
        if active >= levels.len() {
            return Err(MeshError::ActiveLevelOutOfRange {
                active,
                count: levels.len(),
            });
        }
        if links.len() + 1 != levels.len() {
            return Err(MeshError::LevelMismatch(links.len()));
        }
        for (k, link) in links.iter().enumerate() {
            if link.fine_count() != levels[k + 1].vertex_count() || !link.validate(&levels[k]) {
                return Err(MeshError::LevelMismatch(k + 1));
            }
        }
        Ok(Self {
            levels,
            links,
            active,
        })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn active_level(&self) -> usize {
        self.active
    }

    pub fn levels(&self) -> &[Mesh] {
        &self.levels
    }

    pub fn level(&self, level: usize) -> Option<&Mesh> {
        self.levels.get(level)
    }

    /// Direct access to a level. Editing a level other than the active one
    /// bypasses synchronization.
    pub fn level_mut(&mut self, level: usize) -> Option<&mut Mesh> {
        self.levels.get_mut(level)
    }

    pub fn links(&self) -> &[LevelLink] {
        &self.links
    }

    pub fn active(&self) -> &Mesh {
        &self.levels[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Mesh {
        &mut self.levels[self.active]
    }

    pub fn finest(&self) -> &Mesh {
        &self.levels[self.levels.len() - 1]
    }

    /// Set the world matrix of every level.
    pub fn set_matrix(&mut self, matrix: glam::Mat4) {
        for level in &mut self.levels {
            level.set_matrix(matrix);
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        for level in &mut self.levels {
            level.set_visible(visible);
        }
    }

    pub fn set_symmetry_plane(&mut self, plane: crate::types::SymmetryPlane) {
        for level in &mut self.levels {
            level.set_symmetry_plane(plane);
        }
    }

    /// Normalize the active level's size and carry the other levels along.
    pub fn normalize_size(&mut self, target_diagonal: f32) {
        let bounds = self.active().bounds();
        let diagonal = bounds.diagonal();
        if diagonal <= f32::EPSILON {
            tracing::warn!("Cannot normalize a mesh with an empty bounding box");
            return;
        }
        let center = bounds.center();
        let factor = target_diagonal / diagonal;
        for level in &mut self.levels {
            for position in level.positions_mut() {
                *position = center + (*position - center) * factor;
            }
            level.update_geometry(None);
            level.compute_center();
        }
        for link in &mut self.links {
            for detail in &mut link.displacement {
                *detail *= factor;
            }
        }
    }

    /// Refine the finest level into a new level and make it active.
    ///
    /// When a coarser level is active the hierarchy is first synchronized up
    /// to the finest level. Returns the new level index.
    pub fn subdivide(&mut self) -> Result<usize, MeshError> {
        let finest = self.levels.len() - 1;
        self.set_active_level(finest);

        let coarse = &self.levels[finest];
        let (faces, correspondence) = split_faces(coarse);
        let linear_positions = refine(&correspondence, coarse.positions(), coarse.faces());
        let colors = refine(&correspondence, coarse.colors(), coarse.faces());
        let materials = refine(&correspondence, coarse.materials(), coarse.faces());

        let mut fine = Mesh::with_attributes(
            linear_positions.clone(),
            faces,
            colors,
            materials,
            coarse.spatial_config(),
        )?;
        fine.set_matrix(coarse.matrix());
        fine.set_visible(coarse.is_visible());
        fine.set_symmetry_plane(coarse.symmetry_plane());

        let smoothed = smooth_interior(&fine, &linear_positions);
        fine.positions_mut().copy_from_slice(&smoothed);
        fine.update_geometry(None);

        let count = correspondence.len();
        let displacement = smoothed
            .iter()
            .zip(&linear_positions)
            .map(|(s, l)| *s - *l)
            .collect();
        self.links.push(LevelLink {
            correspondence,
            displacement,
            color_detail: vec![Vec3::ZERO; count],
            material_detail: vec![Material::new(0.0, 0.0, 0.0); count],
        });
        self.levels.push(fine);
        self.active = self.levels.len() - 1;

        tracing::debug!(
            "Subdivided to level {} ({} vertices)",
            self.active,
            self.active().vertex_count()
        );
        Ok(self.active)
    }

    /// Switch the active level. Returns false when `level` is out of range or
    /// already active.
    pub fn set_active_level(&mut self, level: usize) -> bool {
        if level >= self.levels.len() || level == self.active {
            return false;
        }
        for k in (level..self.active).rev() {
            self.sync_down(k);
        }
        for k in self.active..level {
            self.sync_up(k);
        }
        tracing::debug!("Active level {} -> {}", self.active, level);
        self.active = level;
        true
    }

    /// Drop every level above the active one. Returns how many were removed.
    pub fn delete_higher_levels(&mut self) -> usize {
        let removed = self.levels.len() - 1 - self.active;
        self.levels.truncate(self.active + 1);
        self.links.truncate(self.active);
        removed
    }

    /// Collapse the hierarchy to the active level only.
    pub fn flatten(&mut self) {
        self.delete_higher_levels();
        if self.active > 0 {
            self.levels.drain(..self.active);
            self.links.clear();
            self.active = 0;
        }
    }

    /// Update level `k` from level `k + 1` and refresh the link details.
    fn sync_down(&mut self, k: usize) {
        let (lower, upper) = self.levels.split_at_mut(k + 1);
        let coarse = &mut lower[k];
        let fine = &upper[0];
        let link = &mut self.links[k];

        for (i, c) in link.correspondence.iter().enumerate() {
            if let Correspondence::Vertex(v) = *c {
                let v = v as usize;
                coarse.positions_mut()[v] = fine.positions()[i] - link.displacement[i];
                coarse.colors_mut()[v] = fine.colors()[i] - link.color_detail[i];
                coarse.materials_mut()[v] = (fine.materials()[i] - link.material_detail[i]).saturated();
            }
        }
        coarse.update_geometry(None);

        let linear = refine(&link.correspondence, coarse.positions(), coarse.faces());
        let colors = refine(&link.correspondence, coarse.colors(), coarse.faces());
        let materials = refine(&link.correspondence, coarse.materials(), coarse.faces());
        for i in 0..link.fine_count() {
            link.displacement[i] = fine.positions()[i] - linear[i];
            link.color_detail[i] = fine.colors()[i] - colors[i];
            link.material_detail[i] = fine.materials()[i] - materials[i];
        }
    }

    /// Regenerate level `k + 1` from level `k` plus the stored details.
    fn sync_up(&mut self, k: usize) {
        let (lower, upper) = self.levels.split_at_mut(k + 1);
        let coarse = &lower[k];
        let fine = &mut upper[0];
        let link = &self.links[k];

        let linear = refine(&link.correspondence, coarse.positions(), coarse.faces());
        let colors = refine(&link.correspondence, coarse.colors(), coarse.faces());
        let materials = refine(&link.correspondence, coarse.materials(), coarse.faces());
        for i in 0..link.fine_count() {
            fine.positions_mut()[i] = linear[i] + link.displacement[i];
            fine.colors_mut()[i] = colors[i] + link.color_detail[i];
            fine.materials_mut()[i] = (materials[i] + link.material_detail[i]).saturated();
        }
        fine.update_geometry(None);
    }

    /// Merge another hierarchy's active level into this one. Both collapse to
    /// a single level first.
    pub fn merge(&mut self, other: &MultiresMesh) {
        self.flatten();
        self.levels[0].merge(other.active());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    fn max_error(a: &[Vec3], b: &[Vec3]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x.distance(*y)).fold(0.0, f32::max)
    }

    #[test]
    fn test_subdivide_counts() {
        let mut multires = MultiresMesh::new(primitives::cube().unwrap());
        let level = multires.subdivide().unwrap();
        assert_eq!(level, 1);
        // 8 corners + 12 edges + 6 face centers
        assert_eq!(multires.active().vertex_count(), 26);
        assert_eq!(multires.active().face_count(), 24);

        let mut tri = MultiresMesh::new(
            Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![Face::triangle(0, 1, 2)]).unwrap(),
        );
        tri.subdivide().unwrap();
        assert_eq!(tri.active().vertex_count(), 6);
        assert_eq!(tri.active().face_count(), 4);
        assert!(tri.active().faces().iter().all(Face::is_triangle));
    }

    #[test]
    fn test_fine_vertices_keep_coarse_ids() {
        let mut multires = MultiresMesh::new(primitives::sphere(4, 6).unwrap());
        multires.subdivide().unwrap();
        let link = &multires.links()[0];
        for v in 0..multires.level(0).unwrap().vertex_count() as u32 {
            assert_eq!(link.correspondence()[v as usize], Correspondence::Vertex(v));
        }
    }

    #[test]
    fn test_switch_down_and_up_reconstructs() {
        let mut multires = MultiresMesh::new(primitives::sphere(6, 8).unwrap());
        multires.subdivide().unwrap();
        multires.subdivide().unwrap();

        // Sculpt on the finest level
        let fine = multires.active_mut();
        for v in 0..20 {
            fine.positions_mut()[v] *= 1.1;
        }
        fine.update_geometry(None);
        let before = multires.active().positions().to_vec();

        assert!(multires.set_active_level(0));
        assert!(multires.set_active_level(2));
        assert!(max_error(&before, multires.active().positions()) < 1e-4);
    }

    #[test]
    fn test_coarse_edit_propagates_up() {
        let mut multires = MultiresMesh::new(primitives::plane(2, 2.0).unwrap());
        multires.subdivide().unwrap();
        multires.set_active_level(0);

        let coarse = multires.active_mut();
        coarse.positions_mut()[4].z = 1.0;
        coarse.update_geometry(None);
        multires.set_active_level(1);

        let fine = multires.active();
        assert!((fine.positions()[4].z - 1.0).abs() < 1e-5);
        // Midpoint of the coarse edge (1, 4)
        assert!((fine.positions()[10].z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_plane_boundary_unchanged_by_subdivision() {
        let mut multires = MultiresMesh::new(primitives::plane(2, 2.0).unwrap());
        multires.subdivide().unwrap();
        let bounds = multires.active().bounds();
        assert!((bounds.min.x + 1.0).abs() < 1e-6);
        assert!((bounds.max.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_selection_follows_levels() {
        let mut multires = MultiresMesh::new(primitives::cube().unwrap());
        multires.subdivide().unwrap();
        multires.active_mut().materials_mut()[0].selection = 1.0;
        multires.set_active_level(0);
        assert_eq!(multires.active().materials()[0].selection, 1.0);
        multires.set_active_level(1);
        assert_eq!(multires.active().materials()[0].selection, 1.0);
    }

    #[test]
    fn test_delete_higher_levels() {
        let mut multires = MultiresMesh::new(primitives::cube().unwrap());
        multires.subdivide().unwrap();
        multires.subdivide().unwrap();
        multires.set_active_level(1);
        assert_eq!(multires.delete_higher_levels(), 1);
        assert_eq!(multires.level_count(), 2);
        assert_eq!(multires.links().len(), 1);
        assert!(!multires.set_active_level(2));
    }

    #[test]
    fn test_subdivide_from_coarse_level_uses_finest() {
        let mut multires = MultiresMesh::new(primitives::cube().unwrap());
        multires.subdivide().unwrap();
        multires.set_active_level(0);
        assert_eq!(multires.subdivide().unwrap(), 2);
        assert_eq!(multires.level_count(), 3);
    }

    #[test]
    fn test_from_parts_rejects_bad_links() {
        let mut multires = MultiresMesh::new(primitives::cube().unwrap());
        multires.subdivide().unwrap();
        let levels = multires.levels().to_vec();
        let result = MultiresMesh::from_parts(levels.clone(), Vec::new(), 0);
        assert!(matches!(result, Err(MeshError::LevelMismatch(_))));
        let result = MultiresMesh::from_parts(levels, multires.links().to_vec(), 5);
        assert!(matches!(result, Err(MeshError::ActiveLevelOutOfRange { .. })));
    }
}
