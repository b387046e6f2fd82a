//! Undo/redo history.
//!
//! A linear stack of states with a cursor. Each state aggregates deltas that
//! undo and redo together. Capture happens before mutation and records only
//! values not already captured in the open state, so a gesture that touches a
//! vertex a hundred times stores it once.

mod delta;
mod export;

pub use delta::Delta;
pub use export::{LevelRecord, LinkRecord, MeshRecord, SceneSnapshot, SnapshotError};

use std::collections::{HashMap, HashSet};

use relief_config::DEFAULT_HISTORY_LIMIT;
use relief_mesh::{Mesh, MeshId, MultiresMesh};

use crate::meshes::MeshSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CaptureKind {
    Geometry,
    ColorAndMaterial,
}

/// One undoable action.
#[derive(Debug, Clone, Default)]
struct State {
    label: String,
    deltas: Vec<Delta>,
    captured: HashMap<(CaptureKind, MeshId, usize), HashSet<u32>>,
}

impl State {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    /// Indices not yet captured for this key, marked as captured.
    fn fresh(&mut self, key: (CaptureKind, MeshId, usize), indices: &[u32]) -> Vec<u32> {
        let seen = self.captured.entry(key).or_default();
        indices.iter().copied().filter(|&v| seen.insert(v)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct History {
    states: Vec<State>,
    /// Number of states currently applied.
    cursor: usize,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            states: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of stored states, undone ones included.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.states.len()
    }

    /// Label of the state the next undo would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .map(|index| self.states[index].label.as_str())
    }

    /// Drop every state. Used on scene load.
    pub fn reset(&mut self) {
        self.states.clear();
        self.cursor = 0;
    }

    /// Open a new state. Undone states are discarded and the oldest state is
    /// dropped once the limit is exceeded.
    pub fn push_state(&mut self, label: &str) {
        self.states.truncate(self.cursor);
        self.states.push(State::new(label));
        if self.states.len() > self.limit {
            self.states.remove(0);
        }
        self.cursor = self.states.len();
        tracing::trace!("Opened history state '{}' ({} stored)", label, self.states.len());
    }

    fn open_state(&mut self) -> Option<&mut State> {
        if self.cursor == 0 || self.cursor != self.states.len() {
            tracing::warn!("History capture without an open state");
            return None;
        }
        self.states.last_mut()
    }

    /// Record positions of `indices` on one level before they change.
    pub fn capture_geometry(&mut self, mesh_id: MeshId, level: usize, mesh: &Mesh, indices: &[u32]) {
        let Some(state) = self.open_state() else {
            return;
        };
        let fresh = state.fresh((CaptureKind::Geometry, mesh_id, level), indices);
        if fresh.is_empty() {
            return;
        }
        let positions = fresh.iter().map(|&v| mesh.positions()[v as usize]).collect();
        state.deltas.push(Delta::Geometry {
            mesh: mesh_id,
            level,
            indices: fresh,
            positions,
        });
    }

    /// Record colors and materials of `indices` on one level before they change.
    pub fn capture_color_material(
        &mut self,
        mesh_id: MeshId,
        level: usize,
        mesh: &Mesh,
        indices: &[u32],
    ) {
        let Some(state) = self.open_state() else {
            return;
        };
        let fresh = state.fresh((CaptureKind::ColorAndMaterial, mesh_id, level), indices);
        if fresh.is_empty() {
            return;
        }
        let colors = fresh.iter().map(|&v| mesh.colors()[v as usize]).collect();
        let materials = fresh.iter().map(|&v| mesh.materials()[v as usize]).collect();
        state.deltas.push(Delta::ColorAndMaterial {
            mesh: mesh_id,
            level,
            indices: fresh,
            colors,
            materials,
        });
    }

    /// Record an add/remove after it happened: `added` ids are removed on
    /// undo, `removed` meshes are put back.
    pub fn capture_add_remove(&mut self, added: Vec<MeshId>, removed: Vec<(MeshId, MultiresMesh)>) {
        let Some(state) = self.open_state() else {
            return;
        };
        state.deltas.push(Delta::AddRemove {
            remove: added,
            stash: removed,
        });
    }

    /// Record a whole hierarchy before a structural change.
    pub fn capture_topology(&mut self, mesh_id: MeshId, mesh: &MultiresMesh) {
        let Some(state) = self.open_state() else {
            return;
        };
        // Earlier range captures index the old structure
        state.captured.retain(|(_, id, _), _| *id != mesh_id);
        state.deltas.push(Delta::Topology {
            mesh: mesh_id,
            snapshot: Box::new(mesh.clone()),
        });
    }

    /// Record the active level before it changes.
    pub fn capture_active_level(&mut self, mesh_id: MeshId, level: usize) {
        let Some(state) = self.open_state() else {
            return;
        };
        state.deltas.push(Delta::ActiveLevel {
            mesh: mesh_id,
            level,
        });
    }

    /// Merge the top state into its predecessor so both undo together.
    pub fn squash(&mut self) -> bool {
        if self.cursor < 2 || self.cursor != self.states.len() {
            return false;
        }
        let Some(top) = self.states.pop() else {
            return false;
        };
        self.cursor -= 1;
        if let Some(previous) = self.states.last_mut() {
            previous.deltas.extend(top.deltas);
            for (key, indices) in top.captured {
                previous.captured.entry(key).or_default().extend(indices);
            }
        }
        true
    }

    /// Drop the open state when none of its deltas changed anything.
    pub fn discard_unchanged(&mut self, meshes: &MeshSet) -> bool {
        if self.cursor == 0 || self.cursor != self.states.len() {
            return false;
        }
        let unchanged = self.states[self.cursor - 1]
            .deltas
            .iter()
            .all(|delta| !delta.is_effective(meshes));
        if unchanged {
            self.states.pop();
            self.cursor -= 1;
            tracing::trace!("Discarded unchanged history state");
        }
        unchanged
    }

    /// Revert the state under the cursor.
    pub fn undo(&mut self, meshes: &mut MeshSet) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let state = &mut self.states[self.cursor];
        for delta in state.deltas.iter_mut().rev() {
            delta.apply(meshes);
        }
        tracing::debug!("Undo '{}'", state.label);
        true
    }

    /// Re-apply the state after the cursor.
    pub fn redo(&mut self, meshes: &mut MeshSet) -> bool {
        if self.cursor == self.states.len() {
            return false;
        }
        let state = &mut self.states[self.cursor];
        for delta in state.deltas.iter_mut() {
            delta.apply(meshes);
        }
        self.cursor += 1;
        tracing::debug!("Redo '{}'", state.label);
        true
    }

    /// Serializable snapshot of the current mesh set.
    pub fn export(&self, meshes: &MeshSet) -> SceneSnapshot {
        SceneSnapshot::capture(meshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use relief_mesh::primitives;

    fn scene() -> (MeshSet, MeshId) {
        let mut meshes = MeshSet::new();
        let id = meshes.push(primitives::plane(2, 2.0).unwrap().into());
        (meshes, id)
    }

    fn raise(history: &mut History, meshes: &mut MeshSet, id: MeshId, vertex: u32, dz: f32) {
        let mesh = meshes.active(id).unwrap();
        history.capture_geometry(id, 0, mesh, &[vertex]);
        let mesh = meshes.active_mut(id).unwrap();
        mesh.positions_mut()[vertex as usize].z += dz;
        mesh.update_geometry(Some(&[vertex][..]));
    }

    fn z(meshes: &MeshSet, id: MeshId, vertex: usize) -> f32 {
        meshes.active(id).unwrap().positions()[vertex].z
    }

    #[test]
    fn test_undo_redo_bit_identical() {
        let (mut meshes, id) = scene();
        let mut history = History::default();
        let before = meshes.active(id).unwrap().positions().to_vec();

        history.push_state("brush");
        raise(&mut history, &mut meshes, id, 4, 0.3);
        raise(&mut history, &mut meshes, id, 4, 0.3);
        raise(&mut history, &mut meshes, id, 5, 0.1);
        let after = meshes.active(id).unwrap().positions().to_vec();

        assert!(history.undo(&mut meshes));
        assert_eq!(meshes.active(id).unwrap().positions(), before.as_slice());
        assert!(history.redo(&mut meshes));
        assert_eq!(meshes.active(id).unwrap().positions(), after.as_slice());
        assert!(!history.redo(&mut meshes));
    }

    #[test]
    fn test_exhausted_stack_is_noop() {
        let (mut meshes, _) = scene();
        let mut history = History::default();
        assert!(!history.undo(&mut meshes));
        assert!(!history.redo(&mut meshes));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_new_state_drops_redo() {
        let (mut meshes, id) = scene();
        let mut history = History::default();
        history.push_state("a");
        raise(&mut history, &mut meshes, id, 4, 1.0);
        history.undo(&mut meshes);
        assert!(history.can_redo());
        history.push_state("b");
        assert!(!history.can_redo());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_squash_undoes_together() {
        let (mut meshes, id) = scene();
        let mut history = History::default();
        history.push_state("first");
        raise(&mut history, &mut meshes, id, 4, 1.0);
        history.push_state("second");
        raise(&mut history, &mut meshes, id, 4, 1.0);
        assert!(history.squash());
        assert_eq!(history.len(), 1);

        assert!(history.undo(&mut meshes));
        assert_eq!(z(&meshes, id, 4), 0.0);
        assert!(!history.can_undo());
        assert!(history.redo(&mut meshes));
        assert_eq!(z(&meshes, id, 4), 2.0);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let (mut meshes, id) = scene();
        let mut history = History::new(2);
        for i in 0..3 {
            history.push_state("step");
            raise(&mut history, &mut meshes, id, i, 1.0);
        }
        assert_eq!(history.len(), 2);
        assert!(history.undo(&mut meshes));
        assert!(history.undo(&mut meshes));
        assert!(!history.undo(&mut meshes));
        assert_eq!(z(&meshes, id, 0), 1.0);
        assert_eq!(z(&meshes, id, 1), 0.0);
    }

    #[test]
    fn test_discard_unchanged() {
        let (mut meshes, id) = scene();
        let mut history = History::default();
        history.push_state("noop");
        let mesh = meshes.active(id).unwrap();
        history.capture_geometry(id, 0, mesh, &[0, 1, 2]);
        assert!(history.discard_unchanged(&meshes));
        assert!(!history.can_undo());

        history.push_state("real");
        raise(&mut history, &mut meshes, id, 2, 0.5);
        assert!(!history.discard_unchanged(&meshes));
        assert!(history.can_undo());
    }

    #[test]
    fn test_topology_and_level_round_trip() {
        let (mut meshes, id) = scene();
        let mut history = History::default();

        history.push_state("subdivide");
        history.capture_topology(id, meshes.get(id).unwrap());
        meshes.get_mut(id).unwrap().subdivide().unwrap();
        assert_eq!(meshes.get(id).unwrap().level_count(), 2);

        history.push_state("level");
        history.capture_active_level(id, 1);
        meshes.get_mut(id).unwrap().set_active_level(0);

        assert!(history.undo(&mut meshes));
        assert_eq!(meshes.get(id).unwrap().active_level(), 1);
        assert!(history.undo(&mut meshes));
        assert_eq!(meshes.get(id).unwrap().level_count(), 1);
        assert!(history.redo(&mut meshes));
        assert!(history.redo(&mut meshes));
        let mesh = meshes.get(id).unwrap();
        assert_eq!(mesh.level_count(), 2);
        assert_eq!(mesh.active_level(), 0);
    }

    #[test]
    fn test_color_capture_restores_mask() {
        let (mut meshes, id) = scene();
        let mut history = History::default();
        history.push_state("mask");
        let mesh = meshes.active(id).unwrap();
        history.capture_color_material(id, 0, mesh, &[3]);
        let mesh = meshes.active_mut(id).unwrap();
        mesh.materials_mut()[3].selection = 1.0;
        mesh.colors_mut()[3] = Vec3::ZERO;

        history.undo(&mut meshes);
        let mesh = meshes.active(id).unwrap();
        assert_eq!(mesh.materials()[3].selection, 0.0);
        assert_eq!(mesh.colors()[3], Vec3::ONE);
    }
}
