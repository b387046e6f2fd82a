//! Scene: the meshes being sculpted plus everything that edits them.
//!
//! The scene owns the mesh set, camera, both pickers, the undo history and
//! the tool dispatcher. Every structural operation (add, merge, delete,
//! remesh, level changes) opens its own history state; pointer gestures are
//! forwarded to [`SculptManager`].

use glam::{Mat4, Vec2, Vec3};
use relief_config::ReliefConfig;
use relief_mesh::{Aabb, Camera, DirtyRange, Mesh, MeshError, MeshId, MultiresMesh, Picking};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::history::{History, SceneSnapshot, SnapshotError};
use crate::meshes::MeshSet;
use crate::paint::{mask_blur, mask_clear, mask_invert, mask_sharpen, paint_all};
use crate::remesh::{RemeshError, Resampler, quad_remesh};
use crate::selection::{clear_selection, invert_selection, select_all};
use crate::tools::{SculptContext, SculptManager};
use crate::types::{SculptSample, ToolKind};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("No mesh is selected")]
    NoMeshSelected,

    #[error("Mesh {0:?} does not exist")]
    UnknownMesh(MeshId),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Remesh(#[from] RemeshError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub struct Scene {
    config: ReliefConfig,
    meshes: MeshSet,
    /// Selected meshes in selection order
    selected: Vec<MeshId>,
    /// Mesh the single-mesh operations act on
    current: Option<MeshId>,
    camera: Camera,
    picking: Picking,
    picking_sym: Picking,
    history: History,
    sculpt: SculptManager,
    redraw: bool,
}

impl Scene {
    pub fn new(config: ReliefConfig, camera: Camera) -> Self {
        Self {
            history: History::new(config.scene.history_limit),
            sculpt: SculptManager::new(&config.tools),
            config,
            meshes: MeshSet::new(),
            selected: Vec::new(),
            current: None,
            camera,
            picking: Picking::new(false),
            picking_sym: Picking::new(true),
            redraw: false,
        }
    }

    pub fn config(&self) -> &ReliefConfig {
        &self.config
    }

    pub fn meshes(&self) -> &MeshSet {
        &self.meshes
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MultiresMesh> {
        self.meshes.get(id)
    }

    pub fn selected(&self) -> &[MeshId] {
        &self.selected
    }

    pub fn current(&self) -> Option<MeshId> {
        self.current
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Replace the camera. The pick radius of an active gesture follows.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.update_pick_radius();
        self.request_redraw();
    }

    pub fn picking(&self) -> &Picking {
        &self.picking
    }

    pub fn picking_mut(&mut self) -> &mut Picking {
        &mut self.picking
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sculpt(&self) -> &SculptManager {
        &self.sculpt
    }

    pub fn sculpt_mut(&mut self) -> &mut SculptManager {
        &mut self.sculpt
    }

    /// Replace the scene with freshly loaded meshes.
    ///
    /// History is reset, every mesh is normalized to the configured size, the
    /// set is scaled and centered when `auto_matrix` is on, and the first
    /// mesh becomes the selection.
    pub fn ingest(&mut self, meshes: Vec<MultiresMesh>) -> Vec<MeshId> {
        self.end_gesture();
        self.history.reset();
        self.meshes.clear();
        self.selected.clear();
        self.current = None;

        let scale = self.config.scene.normalize_scale;
        let ids: Vec<MeshId> = meshes
            .into_iter()
            .map(|mut mesh| {
                mesh.normalize_size(scale);
                self.meshes.push(mesh)
            })
            .collect();
        if self.config.scene.auto_matrix {
            self.normalize_and_center(&ids);
        }
        if let Some(&first) = ids.first() {
            self.selected.push(first);
            self.current = Some(first);
        }
        info!("Loaded {} meshes", ids.len());
        self.request_redraw();
        ids
    }

    /// Scale and center `ids` as one group so the group's world box has the
    /// configured diagonal and sits on the origin.
    pub fn normalize_and_center(&mut self, ids: &[MeshId]) {
        let bounds = ids
            .iter()
            .filter_map(|&id| self.meshes.active(id))
            .fold(Aabb::empty(), |acc, mesh| acc.union(&mesh.world_bounds()));
        let diagonal = bounds.diagonal();
        if diagonal <= f32::EPSILON {
            return;
        }
        let scale = self.config.scene.normalize_scale / diagonal;
        let centering =
            Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-bounds.center());
        for &id in ids {
            if let Some(mesh) = self.meshes.get_mut(id) {
                let matrix = centering * mesh.active().matrix();
                mesh.set_matrix(matrix);
            }
        }
    }

    /// Add a mesh and select it, as one undoable state. With `merge` the new
    /// mesh is folded into the current mesh and the merge joins the same
    /// state. Returns the mesh that holds the new geometry.
    pub fn add_mesh(&mut self, mesh: MultiresMesh, merge: bool) -> MeshId {
        self.end_gesture();
        let target = self.current;
        let id = self.meshes.push(mesh);
        self.history.push_state("add mesh");
        self.history.capture_add_remove(vec![id], Vec::new());
        self.set_or_unset_mesh(Some(id), false);

        if merge
            && let Some(target) = target
            && self.merge_meshes(target, id)
        {
            self.history.squash();
            self.set_or_unset_mesh(Some(target), false);
            return target;
        }
        self.request_redraw();
        id
    }

    /// Fold `other` into `target`, as one undoable state.
    pub fn merge_meshes(&mut self, target: MeshId, other: MeshId) -> bool {
        if target == other || !self.meshes.contains(target) || !self.meshes.contains(other) {
            return false;
        }
        self.end_gesture();
        self.history.push_state("merge");
        if let Some(before) = self.meshes.get(target) {
            self.history.capture_topology(target, before);
        }
        let Some(removed) = self.meshes.remove(other) else {
            return false;
        };
        if let Some(mesh) = self.meshes.get_mut(target) {
            mesh.merge(&removed);
        }
        self.history
            .capture_add_remove(Vec::new(), vec![(other, removed)]);
        self.prune_selection();
        debug!("Merged mesh {:?} into {:?}", other, target);
        self.request_redraw();
        true
    }

    /// Update the selection list.
    ///
    /// `None` clears it. Without `multi_select` the mesh becomes the only
    /// selection. With `multi_select` an unselected mesh is appended; a
    /// selected one is removed unless it is the last. Returns the current
    /// mesh.
    pub fn set_or_unset_mesh(&mut self, id: Option<MeshId>, multi_select: bool) -> Option<MeshId> {
        let mut current = id;
        match id {
            None => self.selected.clear(),
            Some(id) if !multi_select => {
                self.selected.clear();
                self.selected.push(id);
            }
            Some(id) => match self.selected.iter().position(|&s| s == id) {
                Some(index) => {
                    if self.selected.len() > 1 {
                        self.selected.remove(index);
                        current = self.selected.first().copied();
                    }
                }
                None => self.selected.push(id),
            },
        }
        self.current = current;
        self.request_redraw();
        current
    }

    /// Remove the selected meshes, as one undoable state.
    pub fn delete_selected(&mut self) -> usize {
        self.end_gesture();
        if self.selected.is_empty() {
            return 0;
        }
        self.history.push_state("delete");
        let removed: Vec<(MeshId, MultiresMesh)> = self
            .selected
            .drain(..)
            .filter_map(|id| self.meshes.remove(id).map(|mesh| (id, mesh)))
            .collect();
        let count = removed.len();
        self.history.capture_add_remove(Vec::new(), removed);
        self.current = None;
        self.request_redraw();
        count
    }

    /// Replace the selected meshes with one remeshed mesh, as one undoable
    /// state. The inputs are untouched when remeshing fails.
    pub fn remesh(&mut self, resampler: &dyn Resampler) -> Result<MeshId, SceneError> {
        self.end_gesture();
        let sources: Vec<MeshId> = if self.selected.is_empty() {
            self.current.into_iter().collect()
        } else {
            self.selected.clone()
        };
        let inputs: Vec<&Mesh> = sources
            .iter()
            .filter_map(|&id| self.meshes.active(id))
            .collect();
        if inputs.is_empty() {
            return Err(SceneError::NoMeshSelected);
        }
        let remeshed = quad_remesh(&inputs, resampler, &self.config.remesh)?;

        self.history.push_state("remesh");
        let removed: Vec<(MeshId, MultiresMesh)> = sources
            .iter()
            .filter_map(|&id| self.meshes.remove(id).map(|mesh| (id, mesh)))
            .collect();
        let id = self.meshes.push(MultiresMesh::new(remeshed));
        self.history.capture_add_remove(vec![id], removed);
        self.set_or_unset_mesh(Some(id), false);
        info!("Remeshed {} meshes into {:?}", sources.len(), id);
        Ok(id)
    }

    /// Subdivide the current mesh, as one undoable state. Returns the new
    /// level index.
    pub fn subdivide(&mut self) -> Result<usize, SceneError> {
        self.end_gesture();
        let id = self.current.ok_or(SceneError::NoMeshSelected)?;
        let mesh = self.meshes.get_mut(id).ok_or(SceneError::UnknownMesh(id))?;
        let before = mesh.clone();
        let level = mesh.subdivide()?;

        self.history.push_state("subdivide");
        self.history.capture_topology(id, &before);
        self.request_redraw();
        Ok(level)
    }

    /// Switch the current mesh's active level, as one undoable state.
    pub fn set_active_level(&mut self, level: usize) -> bool {
        self.end_gesture();
        let Some(id) = self.current else {
            return false;
        };
        let Some(mesh) = self.meshes.get_mut(id) else {
            return false;
        };
        let previous = mesh.active_level();
        if !mesh.set_active_level(level) {
            return false;
        }
        self.history.push_state("change level");
        self.history.capture_active_level(id, previous);
        self.request_redraw();
        true
    }

    /// Drop the levels above the active one, as one undoable state.
    pub fn delete_higher_levels(&mut self) -> usize {
        self.end_gesture();
        let Some(id) = self.current else {
            return 0;
        };
        let Some(mesh) = self.meshes.get_mut(id) else {
            return 0;
        };
        if mesh.active_level() + 1 == mesh.level_count() {
            return 0;
        }
        let before = mesh.clone();
        let removed = mesh.delete_higher_levels();
        self.history.push_state("delete higher levels");
        self.history.capture_topology(id, &before);
        self.request_redraw();
        removed
    }

    /// Revert the last state. Ignored while a gesture is active.
    pub fn undo(&mut self) -> bool {
        if self.sculpt.is_active() {
            trace!("Undo ignored during a gesture");
            return false;
        }
        let undone = self.history.undo(&mut self.meshes);
        if undone {
            self.prune_selection();
            self.request_redraw();
        }
        undone
    }

    /// Reapply the last undone state. Ignored while a gesture is active.
    pub fn redo(&mut self) -> bool {
        if self.sculpt.is_active() {
            trace!("Redo ignored during a gesture");
            return false;
        }
        let redone = self.history.redo(&mut self.meshes);
        if redone {
            self.prune_selection();
            self.request_redraw();
        }
        redone
    }

    pub fn export(&self) -> SceneSnapshot {
        self.history.export(&self.meshes)
    }

    /// Replace the scene with the meshes of a snapshot. History is reset;
    /// sizes and matrices are kept as stored.
    pub fn import_snapshot(&mut self, snapshot: &SceneSnapshot) -> Result<(), SceneError> {
        let restored = snapshot.restore(&self.config.spatial)?;
        self.end_gesture();
        self.history.reset();
        self.meshes.clear();
        self.selected.clear();
        self.current = None;
        for (id, mesh) in restored {
            self.meshes.insert(id, mesh);
        }
        if let Some(first) = self.meshes.ids().next() {
            self.selected.push(first);
            self.current = Some(first);
        }
        self.request_redraw();
        Ok(())
    }

    /// Ask for a redraw. Requests made before the next
    /// [`take_redraw`](Self::take_redraw) collapse into one.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    /// Flush the dirty ranges of every active level to the rendering
    /// collaborator. Returns how many meshes had something to upload.
    pub fn upload_buffers(&mut self, mut upload: impl FnMut(MeshId, &Mesh, &DirtyRange)) -> usize {
        let mut uploaded = 0;
        for (id, mesh) in self.meshes.iter_mut() {
            if mesh
                .active_mut()
                .upload_buffers(|mesh, dirty| upload(id, mesh, dirty))
            {
                uploaded += 1;
            }
        }
        uploaded
    }

    /// World bounds of every mesh.
    pub fn bounding_box(&self) -> Aabb {
        self.meshes
            .active_meshes()
            .fold(Aabb::empty(), |acc, (_, mesh)| acc.union(&mesh.world_bounds()))
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes
            .active_meshes()
            .map(|(_, mesh)| mesh.vertex_count())
            .sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes
            .active_meshes()
            .map(|(_, mesh)| mesh.triangle_count())
            .sum()
    }

    /// Start a gesture with the current tool. The picked mesh goes through
    /// [`Scene::set_or_unset_mesh`]: with `multi_select` it is toggled in the
    /// selection list, otherwise it replaces the selection.
    pub fn pointer_down(&mut self, mouse: Vec2, pressure: f32, multi_select: bool) -> bool {
        let (sculpt, mut ctx) = self.split();
        let started = sculpt.start(&mut ctx, SculptSample::with_pressure(mouse, pressure));
        if let Some(id) = self.sculpt.active_mesh() {
            self.set_or_unset_mesh(Some(id), multi_select);
        }
        if started {
            self.request_redraw();
        }
        started
    }

    pub fn pointer_move(&mut self, mouse: Vec2, pressure: f32) -> usize {
        let (sculpt, mut ctx) = self.split();
        let modified = sculpt.update(&mut ctx, SculptSample::with_pressure(mouse, pressure));
        if modified > 0 {
            self.request_redraw();
        }
        modified
    }

    pub fn pointer_up(&mut self) {
        if self.sculpt.is_active() {
            self.end_gesture();
            self.request_redraw();
        }
    }

    /// Losing input focus ends the gesture like pointer-up.
    pub fn focus_lost(&mut self) {
        let (sculpt, mut ctx) = self.split();
        sculpt.cancel(&mut ctx);
    }

    pub fn update_pick_radius(&mut self) {
        let (sculpt, mut ctx) = self.split();
        sculpt.update_pick_radius(&mut ctx);
    }

    pub fn mask_clear(&mut self) -> bool {
        self.batch_color_edit("clear mask", mask_clear)
    }

    pub fn mask_invert(&mut self) -> bool {
        self.batch_color_edit("invert mask", mask_invert)
    }

    pub fn mask_blur(&mut self) -> bool {
        self.batch_color_edit("blur mask", mask_blur)
    }

    pub fn mask_sharpen(&mut self) -> bool {
        self.batch_color_edit("sharpen mask", mask_sharpen)
    }

    pub fn select_all(&mut self) -> bool {
        self.batch_color_edit("select all", select_all)
    }

    pub fn clear_selection(&mut self) -> bool {
        self.batch_color_edit("clear selection", clear_selection)
    }

    pub fn invert_selection(&mut self) -> bool {
        self.batch_color_edit("invert selection", invert_selection)
    }

    /// Paint the whole current mesh with the paint tool's settings.
    pub fn paint_all(&mut self) -> bool {
        let settings = self.sculpt.paint().clone();
        let intensity = self.sculpt.params(ToolKind::Paint).intensity();
        self.batch_color_edit("paint all", |mesh| paint_all(mesh, &settings, intensity))
    }

    /// Color/material edit of every vertex of the current mesh's active level.
    fn batch_color_edit(&mut self, label: &str, edit: impl FnOnce(&mut Mesh)) -> bool {
        if self.sculpt.is_active() {
            return false;
        }
        let Some(id) = self.current else {
            return false;
        };
        let Some(multires) = self.meshes.get_mut(id) else {
            return false;
        };
        let level = multires.active_level();
        let mesh = multires.active_mut();
        let all: Vec<u32> = (0..mesh.vertex_count() as u32).collect();
        self.history.push_state(label);
        self.history.capture_color_material(id, level, mesh, &all);
        edit(mesh);
        let changed = !self.history.discard_unchanged(&self.meshes);
        if changed {
            self.request_redraw();
        }
        changed
    }

    fn end_gesture(&mut self) {
        let (sculpt, mut ctx) = self.split();
        sculpt.end(&mut ctx);
    }

    /// Drop selections of meshes that no longer exist.
    fn prune_selection(&mut self) {
        let meshes = &self.meshes;
        self.selected.retain(|&id| meshes.contains(id));
        if self.current.is_none_or(|id| !meshes.contains(id)) {
            self.current = self.selected.first().copied();
        }
    }

    fn split(&mut self) -> (&mut SculptManager, SculptContext<'_>) {
        (
            &mut self.sculpt,
            SculptContext {
                meshes: &mut self.meshes,
                camera: &self.camera,
                picking: &mut self.picking,
                picking_sym: &mut self.picking_sym,
                history: &mut self.history,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remesh::TriangulatingResampler;
    use relief_mesh::primitives;

    /// Orthographic camera looking down -Z at a 100 x 100 unit window.
    fn camera() -> Camera {
        Camera::orthographic(
            Vec3::new(0.0, 0.0, 200.0),
            Vec3::ZERO,
            Vec3::Y,
            50.0,
            Vec2::new(100.0, 100.0),
        )
    }

    fn scene_with(meshes: Vec<Mesh>) -> Scene {
        let mut scene = Scene::new(ReliefConfig::default(), camera());
        scene.ingest(meshes.into_iter().map(MultiresMesh::new).collect());
        scene
    }

    #[test]
    fn test_ingest_normalizes_and_centers() {
        let mut cube = primitives::cube().unwrap();
        for p in cube.positions_mut() {
            *p = *p * 3.0 + Vec3::new(10.0, 0.0, 0.0);
        }
        cube.update_geometry(None);
        let scene = scene_with(vec![cube, primitives::sphere(6, 8).unwrap()]);

        let bounds = scene.bounding_box();
        assert!((bounds.diagonal() - 100.0).abs() < 1e-2);
        assert!(bounds.center().length() < 1e-2);
        assert_eq!(scene.selected().len(), 1);
        assert!(!scene.history().can_undo());
    }

    #[test]
    fn test_set_or_unset_mesh() {
        let mut scene = scene_with(vec![
            primitives::cube().unwrap(),
            primitives::cube().unwrap(),
            primitives::cube().unwrap(),
        ]);
        let ids: Vec<MeshId> = scene.meshes().ids().collect();

        scene.set_or_unset_mesh(Some(ids[1]), true);
        scene.set_or_unset_mesh(Some(ids[2]), true);
        assert_eq!(scene.selected(), &ids[..]);

        // Toggling a selected mesh off makes the first selection current
        assert_eq!(scene.set_or_unset_mesh(Some(ids[2]), true), Some(ids[0]));
        assert_eq!(scene.selected(), &ids[..2]);

        // The last selection cannot be toggled off
        scene.set_or_unset_mesh(Some(ids[1]), false);
        assert_eq!(scene.set_or_unset_mesh(Some(ids[1]), true), Some(ids[1]));
        assert_eq!(scene.selected(), &[ids[1]]);

        assert_eq!(scene.set_or_unset_mesh(None, false), None);
        assert!(scene.selected().is_empty());
    }

    #[test]
    fn test_add_with_merge_is_one_state() {
        let mut scene = scene_with(vec![primitives::cube().unwrap()]);
        let first = scene.current().unwrap();

        let holder = scene.add_mesh(primitives::cube().unwrap().into(), true);
        assert_eq!(holder, first);
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.vertex_count(), 16);
        assert_eq!(scene.history().len(), 1);

        assert!(scene.undo());
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.vertex_count(), 8);
        assert!(!scene.undo());

        assert!(scene.redo());
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.vertex_count(), 16);
    }

    #[test]
    fn test_add_and_delete_undo() {
        let mut scene = scene_with(vec![primitives::cube().unwrap()]);
        let added = scene.add_mesh(primitives::cube().unwrap().into(), false);
        assert_eq!(scene.meshes().len(), 2);
        assert_eq!(scene.current(), Some(added));

        assert_eq!(scene.delete_selected(), 1);
        assert_eq!(scene.meshes().len(), 1);
        assert!(scene.undo());
        assert!(scene.meshes().contains(added));
        assert!(scene.undo());
        assert!(!scene.meshes().contains(added));
        assert!(!scene.selected().contains(&added));
    }

    #[test]
    fn test_remesh_undo_restores_inputs() {
        let mut scene = scene_with(vec![primitives::sphere(6, 8).unwrap()]);
        let original = scene.current().unwrap();
        let positions = scene.mesh(original).unwrap().active().positions().to_vec();

        let remeshed = scene.remesh(&TriangulatingResampler).unwrap();
        assert!(!scene.meshes().contains(original));
        assert_eq!(scene.current(), Some(remeshed));

        assert!(scene.undo());
        assert!(scene.meshes().contains(original));
        assert!(!scene.meshes().contains(remeshed));
        assert_eq!(
            scene.mesh(original).unwrap().active().positions(),
            positions.as_slice()
        );
    }

    #[test]
    fn test_remesh_without_selection_fails() {
        let mut scene = Scene::new(ReliefConfig::default(), camera());
        assert!(matches!(
            scene.remesh(&TriangulatingResampler),
            Err(SceneError::NoMeshSelected)
        ));
        assert!(!scene.history().can_undo());
    }

    #[test]
    fn test_level_operations_are_undoable() {
        let mut scene = scene_with(vec![primitives::cube().unwrap()]);
        let id = scene.current().unwrap();

        assert_eq!(scene.subdivide().unwrap(), 1);
        assert_eq!(scene.mesh(id).unwrap().level_count(), 2);

        assert!(scene.set_active_level(0));
        assert_eq!(scene.mesh(id).unwrap().active_level(), 0);
        assert!(!scene.set_active_level(0));

        assert_eq!(scene.delete_higher_levels(), 1);
        assert_eq!(scene.mesh(id).unwrap().level_count(), 1);

        assert!(scene.undo());
        assert_eq!(scene.mesh(id).unwrap().level_count(), 2);
        assert!(scene.undo());
        assert_eq!(scene.mesh(id).unwrap().active_level(), 1);
        assert!(scene.undo());
        assert_eq!(scene.mesh(id).unwrap().level_count(), 1);
        assert_eq!(scene.vertex_count(), 8);
    }

    #[test]
    fn test_pointer_gesture_and_undo() {
        let mut scene = scene_with(vec![primitives::plane(20, 10.0).unwrap()]);
        let id = scene.current().unwrap();
        let before = scene.mesh(id).unwrap().active().positions().to_vec();
        scene.take_redraw();

        assert!(scene.pointer_down(Vec2::new(50.0, 50.0), 1.0, false));
        // History is locked while the gesture runs
        assert!(!scene.undo());
        scene.pointer_move(Vec2::new(52.0, 50.0), 1.0);
        scene.pointer_up();
        assert!(scene.take_redraw());
        assert!(!scene.take_redraw());

        assert_ne!(scene.mesh(id).unwrap().active().positions(), before.as_slice());
        assert!(scene.undo());
        assert_eq!(scene.mesh(id).unwrap().active().positions(), before.as_slice());
    }

    #[test]
    fn test_pointer_down_multi_select_appends_mesh() {
        let mut scene = Scene::new(ReliefConfig::default(), camera());
        let ids = scene.ingest(vec![
            MultiresMesh::new(primitives::plane(20, 10.0).unwrap()),
            MultiresMesh::new(primitives::plane(20, 10.0).unwrap()),
        ]);
        let mouse = Vec2::new(50.0, 50.0);

        assert!(scene.pointer_down(mouse, 1.0, false));
        let hit = scene.sculpt().active_mesh().unwrap();
        scene.pointer_up();
        assert_eq!(scene.selected(), &[hit]);

        let other = if hit == ids[0] { ids[1] } else { ids[0] };
        scene.set_or_unset_mesh(Some(other), false);
        assert!(scene.pointer_down(mouse, 1.0, true));
        scene.pointer_up();
        assert_eq!(scene.selected(), &[other, hit]);
        assert_eq!(scene.current(), Some(hit));

        // Without the modifier the picked mesh replaces the selection
        assert!(scene.pointer_down(mouse, 1.0, false));
        scene.pointer_up();
        assert_eq!(scene.selected(), &[hit]);
    }

    #[test]
    fn test_focus_loss_ends_gesture() {
        let mut scene = scene_with(vec![primitives::plane(20, 10.0).unwrap()]);
        assert!(scene.pointer_down(Vec2::new(50.0, 50.0), 1.0, false));
        assert!(scene.sculpt().is_active());
        scene.focus_lost();
        assert!(!scene.sculpt().is_active());
        assert!(scene.history().can_undo());
    }

    #[test]
    fn test_mask_batch_ops_record_history() {
        let mut scene = scene_with(vec![primitives::cube().unwrap()]);
        let id = scene.current().unwrap();
        assert!(scene.mask_invert());
        assert!(
            scene
                .mesh(id)
                .unwrap()
                .active()
                .materials()
                .iter()
                .all(|m| m.selection == 1.0)
        );
        // Clearing an already clear mask changes nothing and leaves no state
        assert!(scene.undo());
        assert!(!scene.mask_clear());
        assert!(!scene.history().can_undo());
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut scene = scene_with(vec![primitives::cube().unwrap()]);
        scene.subdivide().unwrap();
        let bytes = scene.export().to_bytes();

        let mut other = Scene::new(ReliefConfig::default(), camera());
        other
            .import_snapshot(&SceneSnapshot::from_bytes(&bytes).unwrap())
            .unwrap();
        assert_eq!(other.vertex_count(), scene.vertex_count());
        assert_eq!(other.triangle_count(), scene.triangle_count());
        let id = other.current().unwrap();
        assert_eq!(other.mesh(id).unwrap().level_count(), 2);
        assert!(!other.history().can_undo());
    }

    #[test]
    fn test_upload_buffers_drains_dirty_meshes() {
        let mut scene = scene_with(vec![primitives::cube().unwrap(), primitives::cube().unwrap()]);
        let mut seen = Vec::new();
        assert_eq!(scene.upload_buffers(|id, _, _| seen.push(id)), 2);
        assert_eq!(seen.len(), 2);
        assert_eq!(scene.upload_buffers(|_, _, _| {}), 0);
    }
}
