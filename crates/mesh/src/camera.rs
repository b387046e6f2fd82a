//! Camera model used to turn pointer samples into rays and radii.
//!
//! Screen coordinates are in pixels with the origin at the top-left corner;
//! depth is the normalized device depth in 0..1 (glam's right-handed
//! projections).

use glam::{Mat4, Vec2, Vec3};

use crate::raycast::Ray;

const NEAR_PLANE: f32 = 0.05;
const FAR_PLANE: f32 = 5000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone)]
pub struct Camera {
    view: Mat4,
    projection: Mat4,
    viewport: Vec2,
    kind: ProjectionKind,
    inverse_view_projection: Mat4,
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4, viewport: Vec2, kind: ProjectionKind) -> Self {
        let mut camera = Self {
            view,
            projection,
            viewport: viewport.max(Vec2::ONE),
            kind,
            inverse_view_projection: Mat4::IDENTITY,
        };
        camera.refresh();
        camera
    }

    /// Perspective camera looking from `eye` at `target`.
    pub fn perspective(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, viewport: Vec2) -> Self {
        let aspect = viewport.x.max(1.0) / viewport.y.max(1.0);
        Self::new(
            Mat4::look_at_rh(eye, target, up),
            Mat4::perspective_rh(fov_y, aspect, NEAR_PLANE, FAR_PLANE),
            viewport,
            ProjectionKind::Perspective,
        )
    }

    /// Orthographic camera showing `half_height` world units above and below
    /// the view center.
    pub fn orthographic(eye: Vec3, target: Vec3, up: Vec3, half_height: f32, viewport: Vec2) -> Self {
        let aspect = viewport.x.max(1.0) / viewport.y.max(1.0);
        let half_width = half_height * aspect;
        Self::new(
            Mat4::look_at_rh(eye, target, up),
            Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, NEAR_PLANE, FAR_PLANE),
            viewport,
            ProjectionKind::Orthographic,
        )
    }

    fn refresh(&mut self) {
        self.inverse_view_projection = (self.projection * self.view).inverse();
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.refresh();
    }

    pub fn set_projection(&mut self, projection: Mat4, kind: ProjectionKind) {
        self.projection = projection;
        self.kind = kind;
        self.refresh();
    }

    pub fn set_viewport(&mut self, viewport: Vec2) {
        self.viewport = viewport.max(Vec2::ONE);
    }

    /// Camera position in world space.
    pub fn eye(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }

    /// Viewing direction in world space.
    pub fn forward(&self) -> Vec3 {
        (-self.view.inverse().z_axis.truncate()).normalize_or_zero()
    }

    /// Direction from the eye toward `point` (constant for orthographic views).
    pub fn view_direction(&self, point: Vec3) -> Vec3 {
        match self.kind {
            ProjectionKind::Perspective => (point - self.eye()).normalize_or_zero(),
            ProjectionKind::Orthographic => self.forward(),
        }
    }

    /// World point to screen pixels plus normalized depth.
    pub fn project(&self, world: Vec3) -> Vec3 {
        let ndc = (self.projection * self.view).project_point3(world);
        Vec3::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
            ndc.z,
        )
    }

    /// Screen pixels plus normalized depth back to a world point.
    pub fn unproject(&self, screen: Vec3) -> Vec3 {
        let ndc = Vec3::new(
            screen.x / self.viewport.x * 2.0 - 1.0,
            1.0 - screen.y / self.viewport.y * 2.0,
            screen.z,
        );
        self.inverse_view_projection.project_point3(ndc)
    }

    /// World-space ray through a pointer position.
    pub fn ray(&self, mouse: Vec2) -> Ray {
        let near = self.unproject(mouse.extend(0.0));
        let far = self.unproject(mouse.extend(1.0));
        Ray::between(near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::perspective(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            45f32.to_radians(),
            Vec2::new(800.0, 600.0),
        )
    }

    #[test]
    fn test_project_unproject_round_trip() {
        let camera = camera();
        let world = Vec3::new(1.0, -2.0, 0.5);
        let screen = camera.project(world);
        assert!((camera.unproject(screen) - world).length() < 1e-2);
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = camera();
        let ray = camera.ray(Vec2::new(400.0, 300.0));
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-4);
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_screen_y_points_down() {
        let camera = camera();
        let above = camera.project(Vec3::new(0.0, 1.0, 0.0));
        assert!(above.y < 300.0);
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let camera = Camera::orthographic(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            5.0,
            Vec2::new(100.0, 100.0),
        );
        let a = camera.ray(Vec2::new(10.0, 10.0));
        let b = camera.ray(Vec2::new(90.0, 50.0));
        assert!((a.direction - b.direction).length() < 1e-5);
        // 100 px covers 10 world units
        let left = camera.unproject(Vec3::new(0.0, 50.0, 0.5));
        let right = camera.unproject(Vec3::new(100.0, 50.0, 0.5));
        assert!((left.distance(right) - 10.0).abs() < 1e-3);
    }
}
