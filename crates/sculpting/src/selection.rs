//! Vertex, edge and face selection.
//!
//! Selection weights live in [`relief_mesh::Material::selection`]. Callers
//! open a color/material history state before any mutating call here.

use glam::Vec3;
use relief_mesh::{Face, Mesh};
use serde::{Deserialize, Serialize};

use crate::types::{SelectionAction, SelectionMode};

/// Squared distance from `point` to the segment `a..b`. A zero-length segment
/// degrades to the point distance.
pub fn point_segment_distance2(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return point.distance_squared(a);
    }
    let t = ((point - a).dot(ab) / len2).clamp(0.0, 1.0);
    point.distance_squared(a + ab * t)
}

/// Corner closest to `point`. The first corner wins ties.
pub fn closest_vertex(positions: &[Vec3], face: &Face, point: Vec3) -> Option<u32> {
    let mut best: Option<(u32, f32)> = None;
    for &v in face.corners() {
        let d2 = positions[v as usize].distance_squared(point);
        if best.is_none_or(|(_, best_d2)| d2 < best_d2) {
            best = Some((v, d2));
        }
    }
    best.map(|(v, _)| v)
}

/// Boundary edge closest to `point`. The first edge wins ties.
pub fn closest_edge(positions: &[Vec3], face: &Face, point: Vec3) -> Option<(u32, u32)> {
    let mut best: Option<((u32, u32), f32)> = None;
    for (a, b) in face.edges() {
        let d2 = point_segment_distance2(point, positions[a as usize], positions[b as usize]);
        if best.is_none_or(|(_, best_d2)| d2 < best_d2) {
            best = Some(((a, b), d2));
        }
    }
    best.map(|(edge, _)| edge)
}

/// Mode and action of the element selection tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementSelection {
    pub mode: SelectionMode,
    pub action: SelectionAction,
}

impl ElementSelection {
    pub fn new(mode: SelectionMode, action: SelectionAction) -> Self {
        Self { mode, action }
    }

    /// Vertices targeted on `face` for a hit at `point`.
    pub fn targets(&self, mesh: &Mesh, face: u32, point: Vec3) -> Vec<u32> {
        let Some(face) = mesh.faces().get(face as usize) else {
            return Vec::new();
        };
        let positions = mesh.positions();
        match self.mode {
            SelectionMode::Face => face.corners().to_vec(),
            SelectionMode::Vertex => closest_vertex(positions, face, point).into_iter().collect(),
            SelectionMode::Edge => closest_edge(positions, face, point)
                .map(|(a, b)| vec![a, b])
                .unwrap_or_default(),
        }
    }

    /// Apply the action to `targets`. Returns false when there is nothing to
    /// select.
    pub fn apply(&self, mesh: &mut Mesh, targets: &[u32]) -> bool {
        if targets.is_empty() {
            return false;
        }
        let materials = mesh.materials_mut();
        match self.action {
            SelectionAction::Replace => {
                for m in materials.iter_mut() {
                    m.selection = 0.0;
                }
                for &v in targets {
                    materials[v as usize].selection = 1.0;
                }
            }
            SelectionAction::Add => {
                for &v in targets {
                    materials[v as usize].selection = 1.0;
                }
            }
            SelectionAction::Remove => {
                for &v in targets {
                    materials[v as usize].selection = 0.0;
                }
            }
        }
        if self.action == SelectionAction::Replace {
            mark_all(mesh);
        } else {
            mesh.mark_colors_dirty(targets);
        }
        tracing::trace!(
            "Selection {:?}/{:?} on {} vertices",
            self.mode,
            self.action,
            targets.len()
        );
        true
    }

    /// Pick the element on `face` nearest to `point` and apply the action.
    pub fn select(&self, mesh: &mut Mesh, face: u32, point: Vec3) -> bool {
        let targets = self.targets(mesh, face, point);
        self.apply(mesh, &targets)
    }
}

pub fn select_all(mesh: &mut Mesh) {
    for m in mesh.materials_mut() {
        m.selection = 1.0;
    }
    mark_all(mesh);
}

pub fn clear_selection(mesh: &mut Mesh) {
    for m in mesh.materials_mut() {
        m.selection = 0.0;
    }
    mark_all(mesh);
}

/// Flip each weight around the 0.5 threshold: weights above become 0,
/// the rest (0.5 included) become 1.
pub fn invert_selection(mesh: &mut Mesh) {
    for m in mesh.materials_mut() {
        m.selection = if m.selection > 0.5 { 0.0 } else { 1.0 };
    }
    mark_all(mesh);
}

fn mark_all(mesh: &mut Mesh) {
    let all: Vec<u32> = (0..mesh.vertex_count() as u32).collect();
    mesh.mark_colors_dirty(&all);
}
