//! Gesture dispatch for the sculpt tools.
//!
//! This module coordinates one gesture:
//! 1. Pointer down → pick, open a history state, apply the first sample
//! 2. Pointer move → re-pick (pointer-following tools), primary then mirrored edit
//! 3. Pointer up or focus loss → full geometry refresh, drop the state if
//!    nothing changed
//!
//! Every sample captures history before it mutates, so undo restores the
//! exact values seen at gesture start.

use glam::{Mat4, Quat, Vec2, Vec3};
use relief_config::ToolDefaults;
use relief_mesh::{Camera, Mesh, MeshId, Picking, ProjectionKind};
use tracing::{debug, trace, warn};

use crate::brush::{BrushParams, SampleFrame, StrokeAccumulator, ViewOrigin, vertex_weights};
use crate::deformation::{
    FrozenVertex, apply_brush, apply_crease, apply_flatten, apply_inflate, apply_local_scale,
    apply_move, apply_move_along_normals, apply_pinch, apply_smooth, apply_transform,
    apply_translate, apply_twist, area_center, area_normal,
};
use crate::history::History;
use crate::meshes::MeshSet;
use crate::paint::{PaintSettings, apply_mask, apply_paint};
use crate::selection::ElementSelection;
use crate::types::{SculptSample, SelectionAction, ToolKind, TransformMode};

/// Pointer travel in pixels to radians / scale factor for twist, local scale
/// and the rotate/scale transform modes.
const MOUSE_SENSITIVITY: f32 = 0.01;

/// Everything a gesture reads or writes besides the manager itself.
pub struct SculptContext<'a> {
    pub meshes: &'a mut MeshSet,
    pub camera: &'a Camera,
    /// Primary pick under the pointer
    pub picking: &'a mut Picking,
    /// Mirrored pick across the mesh symmetry plane
    pub picking_sym: &'a mut Picking,
    pub history: &'a mut History,
}

/// State tracked during an active gesture.
#[derive(Debug, Clone)]
struct Gesture {
    tool: ToolKind,
    mesh: MeshId,
    level: usize,
    /// Mirrored edits are applied for this gesture.
    symmetric: bool,
    /// False for pick-color gestures, which leave history alone.
    records: bool,
    start_mouse: Vec2,
    last_mouse: Vec2,
    /// World radius² picked at gesture start, before pressure scaling.
    world_radius2: f32,
    /// World point the view plane passes through (drag, move, transform).
    plane_origin: Vec3,
    /// Per pass (primary, mirrored) caps for `accumulate = false`.
    accumulators: [StrokeAccumulator; 2],
    /// Per pass ring frozen at gesture start (move).
    frozen: [Vec<FrozenVertex>; 2],
    frozen_normals: [Vec<Vec3>; 2],
    /// Per pass area normal fixed at gesture start (twist, move).
    axes: [Vec3; 2],
    /// Selection weights and their center (transform).
    transform_weights: Vec<(u32, f32)>,
    transform_center: Vec3,
}

/// The sculpt tool dispatcher.
///
/// Owns every tool's parameters and the gesture state machine
/// `Idle → Active → Idle`.
#[derive(Debug, Clone)]
pub struct SculptManager {
    tool: ToolKind,
    params: Vec<BrushParams>,
    symmetry: bool,
    smooth_tangent: bool,
    move_along_normal: bool,
    transform_mode: TransformMode,
    paint: PaintSettings,
    selection: ElementSelection,
    gesture: Option<Gesture>,
}

impl Default for SculptManager {
    fn default() -> Self {
        Self::new(&ToolDefaults::default())
    }
}

impl SculptManager {
    pub fn new(defaults: &ToolDefaults) -> Self {
        Self {
            tool: ToolKind::default(),
            params: ToolKind::ALL
                .iter()
                .map(|&tool| BrushParams::for_tool(tool, defaults))
                .collect(),
            symmetry: defaults.symmetry,
            smooth_tangent: false,
            move_along_normal: false,
            transform_mode: TransformMode::default(),
            paint: PaintSettings::default(),
            selection: ElementSelection::default(),
            gesture: None,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Switch tools. An active gesture keeps its own tool until it ends.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    /// Switch tools by GUI index. Unknown indices are logged and ignored.
    pub fn set_tool_index(&mut self, index: u8) -> bool {
        match ToolKind::from_index(index) {
            Some(tool) => {
                self.tool = tool;
                true
            }
            None => {
                warn!("Ignoring unknown sculpt tool index {}", index);
                false
            }
        }
    }

    pub fn params(&self, tool: ToolKind) -> &BrushParams {
        &self.params[tool.index()]
    }

    /// Parameters of a tool. Setters on [`BrushParams`] clamp their ranges.
    pub fn params_mut(&mut self, tool: ToolKind) -> &mut BrushParams {
        &mut self.params[tool.index()]
    }

    /// Parameters of the current tool.
    pub fn current_params(&self) -> &BrushParams {
        self.params(self.tool)
    }

    pub fn current_params_mut(&mut self) -> &mut BrushParams {
        let tool = self.tool;
        self.params_mut(tool)
    }

    pub fn symmetry(&self) -> bool {
        self.symmetry
    }

    pub fn set_symmetry(&mut self, symmetry: bool) {
        self.symmetry = symmetry;
    }

    pub fn smooth_tangent(&self) -> bool {
        self.smooth_tangent
    }

    pub fn set_smooth_tangent(&mut self, tangent: bool) {
        self.smooth_tangent = tangent;
    }

    pub fn move_along_normal(&self) -> bool {
        self.move_along_normal
    }

    pub fn set_move_along_normal(&mut self, along_normal: bool) {
        self.move_along_normal = along_normal;
    }

    pub fn transform_mode(&self) -> TransformMode {
        self.transform_mode
    }

    pub fn set_transform_mode(&mut self, mode: TransformMode) {
        self.transform_mode = mode;
    }

    pub fn paint(&self) -> &PaintSettings {
        &self.paint
    }

    pub fn paint_mut(&mut self) -> &mut PaintSettings {
        &mut self.paint
    }

    pub fn selection(&self) -> ElementSelection {
        self.selection
    }

    pub fn set_selection(&mut self, selection: ElementSelection) {
        self.selection = selection;
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Mesh edited by the active gesture.
    pub fn active_mesh(&self) -> Option<MeshId> {
        self.gesture.as_ref().map(|g| g.mesh)
    }

    /// Begin a gesture. Returns false when nothing is under the pointer; no
    /// history state is opened in that case.
    pub fn start(&mut self, ctx: &mut SculptContext<'_>, sample: SculptSample) -> bool {
        if self.gesture.is_some() {
            self.end(ctx);
        }
        let tool = self.tool;
        if !ctx
            .picking
            .intersect_mouse(ctx.meshes.active_meshes(), ctx.camera, sample.mouse)
        {
            trace!("No mesh under pointer for {}", tool.name());
            return false;
        }
        let Some(id) = ctx.picking.mesh() else {
            return false;
        };
        let Some(multires) = ctx.meshes.get(id) else {
            return false;
        };
        let level = multires.active_level();
        let mesh = multires.active();

        ctx.picking
            .compute_pick_radius(ctx.camera, mesh, self.params(tool).radius());
        let symmetric = self.symmetry && tool.supports_symmetry();
        if symmetric {
            ctx.picking_sym.intersect_symmetric(id, mesh, ctx.picking);
        } else {
            ctx.picking_sym.clear();
        }

        let records = !(tool == ToolKind::Paint && self.paint.pick_color());
        if records {
            ctx.history.push_state(tool.name());
        }

        let mut gesture = Gesture {
            tool,
            mesh: id,
            level,
            symmetric,
            records,
            start_mouse: sample.mouse,
            last_mouse: sample.mouse,
            world_radius2: ctx.picking.world_radius2(),
            plane_origin: mesh.matrix().transform_point3(ctx.picking.local_point()),
            accumulators: Default::default(),
            frozen: Default::default(),
            frozen_normals: Default::default(),
            axes: [Vec3::ZERO; 2],
            transform_weights: Vec::new(),
            transform_center: Vec3::ZERO,
        };

        debug!("Started {} gesture on mesh {:?}", tool.name(), id);
        self.apply_sample(ctx, &mut gesture, sample, true);
        self.gesture = Some(gesture);
        true
    }

    /// Apply the newest pointer sample of the active gesture.
    ///
    /// Returns the number of vertices modified.
    pub fn update(&mut self, ctx: &mut SculptContext<'_>, sample: SculptSample) -> usize {
        let Some(mut gesture) = self.gesture.take() else {
            return 0;
        };
        let modified = self.apply_sample(ctx, &mut gesture, sample, false);
        self.gesture = Some(gesture);
        modified
    }

    /// Close the active gesture: full geometry refresh and BVH rebuild, then
    /// the history state is dropped when nothing changed.
    pub fn end(&mut self, ctx: &mut SculptContext<'_>) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        if gesture.records
            && !gesture.tool.edits_colors()
            && let Some(mesh) = ctx.meshes.active_mut(gesture.mesh)
        {
            mesh.update_geometry(None);
        }
        if gesture.records {
            ctx.history.discard_unchanged(ctx.meshes);
        }
        debug!("Ended {} gesture", gesture.tool.name());
    }

    /// Loss of input focus ends the gesture like pointer-up.
    pub fn cancel(&mut self, ctx: &mut SculptContext<'_>) {
        self.end(ctx);
    }

    /// Recompute the cached pick radius after a camera change.
    pub fn update_pick_radius(&mut self, ctx: &mut SculptContext<'_>) {
        let Some(id) = ctx.picking.mesh() else {
            return;
        };
        let Some(mesh) = ctx.meshes.active(id) else {
            return;
        };
        let tool = self.gesture.as_ref().map_or(self.tool, |g| g.tool);
        ctx.picking
            .compute_pick_radius(ctx.camera, mesh, self.params(tool).radius());
        ctx.picking_sym.copy_radius_from(ctx.picking);
        if let Some(gesture) = &mut self.gesture {
            gesture.world_radius2 = ctx.picking.world_radius2();
        }
    }

    fn apply_sample(
        &mut self,
        ctx: &mut SculptContext<'_>,
        gesture: &mut Gesture,
        sample: SculptSample,
        first: bool,
    ) -> usize {
        let tool = gesture.tool;
        let params = self.params[tool.index()].clone();

        if !first && tool.follows_pointer() {
            let Some(mesh) = ctx.meshes.active(gesture.mesh) else {
                return 0;
            };
            if !ctx
                .picking
                .intersect_mouse([(gesture.mesh, mesh)], ctx.camera, sample.mouse)
            {
                gesture.last_mouse = sample.mouse;
                return 0;
            }
            if gesture.symmetric {
                ctx.picking_sym
                    .intersect_symmetric(gesture.mesh, mesh, ctx.picking);
            }
        }

        if !gesture.records {
            if let Some(mesh) = ctx.meshes.active(gesture.mesh)
                && let Some((color, material)) = ctx.picking.interpolated_material(mesh)
            {
                self.paint.pick(color, material);
            }
            gesture.last_mouse = sample.mouse;
            return 0;
        }

        let Some(mesh) = ctx.meshes.active(gesture.mesh) else {
            return 0;
        };
        let scale = params.effective_radius(sample.pressure) / params.radius().max(f32::EPSILON);
        ctx.picking
            .set_world_radius2(mesh, gesture.world_radius2 * scale * scale);
        ctx.picking_sym.copy_radius_from(ctx.picking);

        let modified = match tool {
            ToolKind::ElementSelect if first => self.select_sample(ctx, gesture),
            ToolKind::ElementSelect => 0,
            ToolKind::Transform => self.transform_sample(ctx, gesture, sample, first),
            ToolKind::Move => self.move_sample(ctx, gesture, sample, &params, first),
            _ => self.brush_sample(ctx, gesture, sample, &params),
        };
        gesture.last_mouse = sample.mouse;
        modified
    }

    /// Ring-based tools: one pass for the primary pick, one for the mirror.
    fn brush_sample(
        &self,
        ctx: &mut SculptContext<'_>,
        gesture: &mut Gesture,
        sample: SculptSample,
        params: &BrushParams,
    ) -> usize {
        let tool = gesture.tool;
        let Some(mesh) = ctx.meshes.active_mut(gesture.mesh) else {
            return 0;
        };
        let dx = (sample.mouse.x - gesture.last_mouse.x) * MOUSE_SENSITIVITY;
        let drag = match tool {
            ToolKind::Drag => view_plane_delta(
                ctx.camera,
                mesh,
                gesture.plane_origin,
                gesture.last_mouse,
                sample.mouse,
            ),
            _ => Vec3::ZERO,
        };
        if tool == ToolKind::Drag {
            gesture.plane_origin += mesh.matrix().transform_vector3(drag);
        }
        let plane = mesh.symmetry_plane();

        let mut modified = 0;
        let pickings = [&mut *ctx.picking, &mut *ctx.picking_sym];
        for (pass, picking) in pickings.into_iter().enumerate() {
            if picking.mesh() != Some(gesture.mesh) {
                continue;
            }
            let mirrored = pass == 1;
            let Some((weights, ring)) =
                sample_weights(ctx.camera, mesh, picking, params, tool, sample.pressure)
            else {
                continue;
            };
            let mut weights = weights;
            // Drag, twist and local scale apply per-sample deltas
            if !params.accumulate() && tool.follows_pointer() {
                gesture.accumulators[pass].cap(&mut weights);
            }
            if weights.is_empty() {
                continue;
            }

            let indices: Vec<u32> = weights.iter().map(|&(v, _)| v).collect();
            if tool.edits_colors() {
                ctx.history
                    .capture_color_material(gesture.mesh, gesture.level, mesh, &indices);
            } else {
                ctx.history
                    .capture_geometry(gesture.mesh, gesture.level, mesh, &indices);
            }

            let center = picking.local_point();
            let radius = picking.local_radius();
            let sign = params.sign();
            match tool {
                ToolKind::Brush => {
                    let normal = area_normal(mesh, ring.iter().copied());
                    apply_brush(mesh, &weights, normal, radius, sign);
                }
                ToolKind::Inflate => apply_inflate(mesh, &weights, radius, sign),
                ToolKind::Crease => {
                    let normal = area_normal(mesh, ring.iter().copied());
                    apply_crease(mesh, &weights, center, normal, radius, sign);
                }
                ToolKind::Flatten => {
                    let normal = area_normal(mesh, ring.iter().copied());
                    let plane_center = area_center(mesh, ring.iter().copied());
                    apply_flatten(mesh, &weights, plane_center, normal);
                }
                ToolKind::Pinch => apply_pinch(mesh, &weights, center, sign),
                ToolKind::Smooth => apply_smooth(mesh, &weights, self.smooth_tangent),
                ToolKind::Drag => {
                    let delta = if mirrored {
                        plane.mirror_vector(drag)
                    } else {
                        drag
                    };
                    apply_translate(mesh, &weights, delta);
                    picking.set_local_point(center + delta);
                }
                ToolKind::Twist => {
                    if gesture.axes[pass] == Vec3::ZERO {
                        gesture.axes[pass] = area_normal(mesh, ring.iter().copied());
                    }
                    // A reflection reverses the sense of rotation
                    let angle = if mirrored { -dx * sign } else { dx * sign };
                    apply_twist(mesh, &weights, center, gesture.axes[pass], angle);
                }
                ToolKind::LocalScale => apply_local_scale(mesh, &weights, center, dx * sign),
                ToolKind::Paint => apply_paint(mesh, &weights, &self.paint),
                ToolKind::Masking => apply_mask(mesh, &weights, params.negative()),
                ToolKind::Move | ToolKind::Transform | ToolKind::ElementSelect => {}
            }

            if tool.edits_colors() {
                mesh.mark_colors_dirty(&indices);
            } else {
                mesh.update_geometry(Some(&indices));
            }
            modified += indices.len();
        }
        trace!("{} sample modified {} vertices", tool.name(), modified);
        modified
    }

    /// Move: the ring and its start positions are frozen by the first sample;
    /// later samples place them relative to the pointer travel since start.
    fn move_sample(
        &self,
        ctx: &mut SculptContext<'_>,
        gesture: &mut Gesture,
        sample: SculptSample,
        params: &BrushParams,
        first: bool,
    ) -> usize {
        let Some(mesh) = ctx.meshes.active_mut(gesture.mesh) else {
            return 0;
        };
        if first {
            let pickings = [&mut *ctx.picking, &mut *ctx.picking_sym];
            for (pass, picking) in pickings.into_iter().enumerate() {
                if picking.mesh() != Some(gesture.mesh) {
                    continue;
                }
                let Some((weights, ring)) =
                    sample_weights(ctx.camera, mesh, picking, params, gesture.tool, sample.pressure)
                else {
                    continue;
                };
                let indices: Vec<u32> = weights.iter().map(|&(v, _)| v).collect();
                ctx.history
                    .capture_geometry(gesture.mesh, gesture.level, mesh, &indices);
                gesture.axes[pass] = area_normal(mesh, ring.iter().copied());
                gesture.frozen_normals[pass] =
                    indices.iter().map(|&v| mesh.normals()[v as usize]).collect();
                gesture.frozen[pass] = weights
                    .iter()
                    .map(|&(vertex, weight)| FrozenVertex {
                        vertex,
                        start: mesh.positions()[vertex as usize],
                        weight,
                    })
                    .collect();
            }
            return 0;
        }

        let delta = view_plane_delta(
            ctx.camera,
            mesh,
            gesture.plane_origin,
            gesture.start_mouse,
            sample.mouse,
        );
        let plane = mesh.symmetry_plane();
        let mut modified = 0;
        for pass in 0..2 {
            let frozen = &gesture.frozen[pass];
            if frozen.is_empty() {
                continue;
            }
            let pass_delta = if pass == 1 {
                plane.mirror_vector(delta)
            } else {
                delta
            };
            if self.move_along_normal {
                let distance = delta.dot(gesture.axes[0]);
                apply_move_along_normals(mesh, frozen, &gesture.frozen_normals[pass], distance);
            } else {
                apply_move(mesh, frozen, pass_delta);
            }
            let indices: Vec<u32> = frozen.iter().map(|f| f.vertex).collect();
            mesh.update_geometry(Some(&indices));
            modified += indices.len();
        }
        modified
    }

    /// Transform: the selection (or the whole mesh when nothing is selected)
    /// follows incremental pointer deltas.
    fn transform_sample(
        &self,
        ctx: &mut SculptContext<'_>,
        gesture: &mut Gesture,
        sample: SculptSample,
        first: bool,
    ) -> usize {
        let camera = ctx.camera;
        let Some(mesh) = ctx.meshes.active_mut(gesture.mesh) else {
            return 0;
        };
        if first {
            let selected: Vec<(u32, f32)> = mesh
                .materials()
                .iter()
                .enumerate()
                .filter(|(_, m)| m.selection > 0.0)
                .map(|(v, m)| (v as u32, m.selection))
                .collect();
            gesture.transform_weights = if selected.is_empty() {
                (0..mesh.vertex_count() as u32).map(|v| (v, 1.0)).collect()
            } else {
                selected
            };
            let indices: Vec<u32> = gesture.transform_weights.iter().map(|&(v, _)| v).collect();
            gesture.transform_center = area_center(mesh, indices.iter().copied());
            ctx.history
                .capture_geometry(gesture.mesh, gesture.level, mesh, &indices);
            return 0;
        }

        let dx = (sample.mouse.x - gesture.last_mouse.x) * MOUSE_SENSITIVITY;
        let center = gesture.transform_center;
        let matrix = match self.transform_mode {
            TransformMode::Translate => {
                let delta =
                    view_plane_delta(camera, mesh, gesture.plane_origin, gesture.last_mouse, sample.mouse);
                gesture.transform_center += delta;
                Mat4::from_translation(delta)
            }
            TransformMode::Rotate => {
                let axis = mesh
                    .inverse_matrix()
                    .transform_vector3(camera.forward())
                    .normalize_or(Vec3::Z);
                Mat4::from_translation(center)
                    * Mat4::from_quat(Quat::from_axis_angle(axis, dx))
                    * Mat4::from_translation(-center)
            }
            TransformMode::Scale => {
                let factor = (1.0 + dx).max(0.01);
                Mat4::from_translation(center)
                    * Mat4::from_scale(Vec3::splat(factor))
                    * Mat4::from_translation(-center)
            }
        };
        if self.transform_mode == TransformMode::Translate {
            gesture.plane_origin += mesh.matrix().transform_vector3(matrix.w_axis.truncate());
        }
        apply_transform(mesh, &gesture.transform_weights, &matrix);
        let indices: Vec<u32> = gesture.transform_weights.iter().map(|&(v, _)| v).collect();
        mesh.update_geometry(Some(&indices));
        indices.len()
    }

    /// Element selection acts once, on pointer down.
    fn select_sample(&self, ctx: &mut SculptContext<'_>, gesture: &Gesture) -> usize {
        let Some(face) = ctx.picking.face() else {
            return 0;
        };
        let Some(mesh) = ctx.meshes.active_mut(gesture.mesh) else {
            return 0;
        };
        let targets = self.selection.targets(mesh, face, ctx.picking.local_point());
        if targets.is_empty() {
            return 0;
        }
        let captured: Vec<u32> = if self.selection.action == SelectionAction::Replace {
            (0..mesh.vertex_count() as u32).collect()
        } else {
            targets.clone()
        };
        ctx.history
            .capture_color_material(gesture.mesh, gesture.level, mesh, &captured);
        self.selection.apply(mesh, &targets);
        mesh.mark_colors_dirty(&captured);
        targets.len()
    }
}

/// Ring and weights of one pass. `None` when the pick has no radius.
fn sample_weights(
    camera: &Camera,
    mesh: &Mesh,
    picking: &mut Picking,
    params: &BrushParams,
    tool: ToolKind,
    pressure: f32,
) -> Option<(Vec<(u32, f32)>, Vec<u32>)> {
    let radius2 = picking.local_radius2();
    if radius2 <= 0.0 {
        return None;
    }
    let ring = picking.pick_vertices_in_sphere(mesh, radius2).to_vec();
    let frame = SampleFrame {
        center: picking.local_point(),
        radius2,
        intensity: params.effective_intensity(pressure),
        falloff: params.falloff(),
        respect_mask: tool.respects_mask(),
        view: params.culling().then(|| view_origin(camera, mesh)),
    };
    Some((vertex_weights(mesh, &ring, picking, &frame), ring))
}

/// Viewer position in mesh-local space.
fn view_origin(camera: &Camera, mesh: &Mesh) -> ViewOrigin {
    let inverse = mesh.inverse_matrix();
    match camera.kind() {
        ProjectionKind::Perspective => ViewOrigin::Eye(inverse.transform_point3(camera.eye())),
        ProjectionKind::Orthographic => {
            ViewOrigin::Direction(inverse.transform_vector3(camera.forward()).normalize_or_zero())
        }
    }
}

/// Local-space motion between two pointer positions on the view plane
/// through `origin` (world).
fn view_plane_delta(camera: &Camera, mesh: &Mesh, origin: Vec3, from: Vec2, to: Vec2) -> Vec3 {
    let normal = camera.forward();
    let on_plane = |mouse: Vec2| {
        let ray = camera.ray(mouse);
        ray.intersect_plane(origin, normal).map(|t| ray.at(t))
    };
    match (on_plane(from), on_plane(to)) {
        (Some(a), Some(b)) => mesh.inverse_matrix().transform_vector3(b - a),
        _ => Vec3::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_mesh::{MultiresMesh, primitives};

    /// 100 px show 10 world units; the plane spans -5..5 and faces the camera.
    struct Fixture {
        meshes: MeshSet,
        camera: Camera,
        picking: Picking,
        picking_sym: Picking,
        history: History,
        id: MeshId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut meshes = MeshSet::new();
            let id = meshes.push(MultiresMesh::new(primitives::plane(20, 10.0).unwrap()));
            Self {
                meshes,
                camera: Camera::orthographic(
                    Vec3::new(0.0, 0.0, 10.0),
                    Vec3::ZERO,
                    Vec3::Y,
                    5.0,
                    Vec2::new(100.0, 100.0),
                ),
                picking: Picking::new(false),
                picking_sym: Picking::new(true),
                history: History::default(),
                id,
            }
        }

        fn ctx(&mut self) -> SculptContext<'_> {
            SculptContext {
                meshes: &mut self.meshes,
                camera: &self.camera,
                picking: &mut self.picking,
                picking_sym: &mut self.picking_sym,
                history: &mut self.history,
            }
        }

        fn mesh(&self) -> &Mesh {
            self.meshes.active(self.id).unwrap()
        }

        fn center_vertex(&self) -> usize {
            self.mesh()
                .positions()
                .iter()
                .position(|p| p.length() < 1e-4)
                .unwrap()
        }
    }

    fn manager(tool: ToolKind) -> SculptManager {
        let mut manager = SculptManager::default();
        manager.set_symmetry(false);
        manager.set_tool(tool);
        manager.current_params_mut().set_radius(20.0);
        manager.current_params_mut().set_intensity(1.0);
        manager
    }

    /// Pixel (px, py) looks at world (px / 10 - 5, 5 - py / 10).
    fn at(x: f32, y: f32) -> SculptSample {
        SculptSample::new(Vec2::new(50.0 + x * 10.0, 50.0 - y * 10.0))
    }

    #[test]
    fn test_miss_opens_no_state() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::Brush);
        let mut ctx = fixture.ctx();
        assert!(!manager.start(&mut ctx, SculptSample::new(Vec2::new(-500.0, -500.0))));
        assert!(!manager.is_active());
        assert!(!fixture.history.can_undo());
    }

    #[test]
    fn test_brush_displacement_decreases_with_distance() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::Brush);
        manager.current_params_mut().set_falloff(crate::brush::FalloffCurve::Linear);
        let before = fixture.mesh().positions().to_vec();

        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.0, 0.0)));
        manager.end(&mut ctx);

        let mesh = fixture.mesh();
        // Pick radius is 2 world units
        let mut moved: Vec<(f32, f32)> = before
            .iter()
            .zip(mesh.positions())
            .map(|(b, a)| (b.length(), a.distance(*b)))
            .collect();
        moved.sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(d, m) in &moved {
            if d >= 2.0 {
                assert_eq!(m, 0.0, "vertex at distance {} moved", d);
            } else {
                assert!(m > 0.0);
            }
        }
        let inside: Vec<&(f32, f32)> = moved.iter().filter(|(d, _)| *d < 2.0).collect();
        for pair in inside.windows(2) {
            if pair[1].0 > pair[0].0 + 1e-4 {
                assert!(pair[1].1 < pair[0].1);
            }
        }
        assert!(fixture.history.can_undo());
    }

    #[test]
    fn test_gesture_undo_redo_bit_identical() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::Inflate);
        let before = fixture.mesh().positions().to_vec();

        let mut ctx = fixture.ctx();
        manager.start(&mut ctx, at(0.0, 0.0));
        manager.update(&mut ctx, at(0.5, 0.0));
        manager.update(&mut ctx, at(1.0, 0.2));
        manager.end(&mut ctx);
        let after = fixture.mesh().positions().to_vec();
        assert_ne!(before, after);

        assert!(fixture.history.undo(&mut fixture.meshes));
        assert_eq!(fixture.mesh().positions(), before.as_slice());
        assert!(fixture.history.redo(&mut fixture.meshes));
        assert_eq!(fixture.mesh().positions(), after.as_slice());
    }

    #[test]
    fn test_symmetric_edit_mirrors() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::Brush);
        manager.set_symmetry(true);

        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(2.5, 0.0)));
        manager.end(&mut ctx);

        let mesh = fixture.mesh();
        let find = |p: Vec3| {
            mesh.positions()
                .iter()
                .position(|q| (q.truncate() - p.truncate()).length() < 1e-4)
                .unwrap()
        };
        let right = mesh.positions()[find(Vec3::new(2.5, 0.0, 0.0))].z;
        let left = mesh.positions()[find(Vec3::new(-2.5, 0.0, 0.0))].z;
        assert!(right > 0.0);
        assert!((right - left).abs() < 1e-4);
    }

    #[test]
    fn test_mask_protects_from_brush() {
        let mut fixture = Fixture::new();
        for m in fixture.meshes.active_mut(fixture.id).unwrap().materials_mut() {
            m.selection = 1.0;
        }
        let mut manager = manager(ToolKind::Brush);
        let before = fixture.mesh().positions().to_vec();
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.0, 0.0)));
        manager.end(&mut ctx);
        assert_eq!(fixture.mesh().positions(), before.as_slice());
        // Nothing changed, so the state was dropped
        assert!(!fixture.history.can_undo());
    }

    #[test]
    fn test_accumulate_off_caps_repeated_samples() {
        let mut capped = Fixture::new();
        let mut manager_capped = manager(ToolKind::Brush);
        manager_capped.current_params_mut().set_accumulate(false);
        let mut ctx = capped.ctx();
        manager_capped.start(&mut ctx, at(0.0, 0.0));
        for _ in 0..4 {
            manager_capped.update(&mut ctx, at(0.0, 0.0));
        }
        manager_capped.end(&mut ctx);

        let mut single = Fixture::new();
        let mut manager_single = manager(ToolKind::Brush);
        let mut ctx = single.ctx();
        manager_single.start(&mut ctx, at(0.0, 0.0));
        manager_single.end(&mut ctx);

        let center = single.center_vertex();
        let capped_z = capped.mesh().positions()[center].z;
        let single_z = single.mesh().positions()[center].z;
        assert!((capped_z - single_z).abs() < 1e-3);
    }

    #[test]
    fn test_paint_records_color_state() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::Paint);
        manager.paint_mut().set_color(Vec3::new(0.0, 0.0, 1.0));
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.0, 0.0)));
        manager.end(&mut ctx);

        let center = fixture.center_vertex();
        assert_ne!(fixture.mesh().colors()[center], Vec3::ONE);
        fixture.history.undo(&mut fixture.meshes);
        assert_eq!(fixture.mesh().colors()[center], Vec3::ONE);
    }

    #[test]
    fn test_pick_color_has_no_history() {
        let mut fixture = Fixture::new();
        fixture.meshes.active_mut(fixture.id).unwrap().colors_mut().fill(Vec3::new(0.5, 0.5, 0.5));
        let mut manager = manager(ToolKind::Paint);
        manager.paint_mut().set_pick_color(true);
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.3, 0.1)));
        manager.end(&mut ctx);
        assert!((manager.paint().color() - Vec3::splat(0.5)).length() < 1e-5);
        assert!(!fixture.history.can_undo());
    }

    #[test]
    fn test_drag_follows_pointer() {
        let mut fixture = Fixture::new();
        let center = fixture.center_vertex();
        let mut manager = manager(ToolKind::Drag);
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.0, 0.0)));
        manager.update(&mut ctx, at(1.0, 0.0));
        manager.end(&mut ctx);

        let mesh = fixture.mesh();
        let dragged = mesh.positions()[center];
        assert!((dragged - Vec3::X).length() < 1e-3);
        assert!(mesh.positions().iter().all(|p| p.z.abs() < 1e-4));
    }

    #[test]
    fn test_move_uses_frozen_ring() {
        let mut fixture = Fixture::new();
        let center = fixture.center_vertex();
        let mut manager = manager(ToolKind::Move);
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.0, 0.0)));
        manager.update(&mut ctx, at(0.0, 1.0));
        manager.update(&mut ctx, at(0.0, 2.0));
        manager.end(&mut ctx);

        let mesh = fixture.mesh();
        // Offset is measured from gesture start, not accumulated per sample
        assert!((mesh.positions()[center] - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-3);
        let top = mesh.positions().iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert!((top - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_element_select_face() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::ElementSelect);
        manager.set_selection(ElementSelection::new(
            crate::types::SelectionMode::Face,
            SelectionAction::Replace,
        ));
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.3, 0.1)));
        manager.end(&mut ctx);

        let selected = fixture
            .mesh()
            .materials()
            .iter()
            .filter(|m| m.selection == 1.0)
            .count();
        assert_eq!(selected, 4);
        fixture.history.undo(&mut fixture.meshes);
        assert!(fixture.mesh().materials().iter().all(|m| m.selection == 0.0));
    }

    #[test]
    fn test_transform_translates_whole_mesh_without_selection() {
        let mut fixture = Fixture::new();
        let mut manager = manager(ToolKind::Transform);
        let before = fixture.mesh().positions().to_vec();
        let mut ctx = fixture.ctx();
        assert!(manager.start(&mut ctx, at(0.0, 0.0)));
        manager.update(&mut ctx, at(1.0, 0.0));
        manager.end(&mut ctx);

        for (b, a) in before.iter().zip(fixture.mesh().positions()) {
            assert!((*a - *b - Vec3::X).length() < 1e-3);
        }
    }

    #[test]
    fn test_unknown_tool_index_is_ignored() {
        let mut manager = SculptManager::default();
        assert!(manager.set_tool_index(ToolKind::Smooth as u8));
        assert_eq!(manager.tool(), ToolKind::Smooth);
        assert!(!manager.set_tool_index(42));
        assert_eq!(manager.tool(), ToolKind::Smooth);
    }
}
