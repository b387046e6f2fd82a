//! Pointer picking against meshes.
//!
//! A [`Picking`] holds the result of the last intersection: which mesh and
//! face was hit, where (in mesh-local space), how far from the ray origin,
//! the brush radius converted into world and local units, and the cached
//! vertex ring of the last sphere query. A second, symmetric picker mirrors
//! the primary result across the mesh symmetry plane.

use glam::{Vec2, Vec3};

use crate::camera::Camera;
use crate::mesh::Mesh;
use crate::raycast::{Ray, interpolate_vec3};
use crate::types::{Material, MeshError, MeshId};

/// Grayscale stamp modulating brush influence, sampled in 0..1 UV space.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

impl AlphaMask {
    pub fn new(width: u32, height: u32, texels: Vec<f32>) -> Result<Self, MeshError> {
        if width == 0 || height == 0 || texels.len() != (width as usize) * (height as usize) {
            return Err(MeshError::AlphaSize {
                width,
                height,
                actual: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Build from 8-bit luminance.
    pub fn from_luma8(width: u32, height: u32, bytes: &[u8]) -> Result<Self, MeshError> {
        Self::new(
            width,
            height,
            bytes.iter().map(|&b| f32::from(b) / 255.0).collect(),
        )
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn texel(&self, x: u32, y: u32) -> f32 {
        self.texels[(y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize]
    }

    /// Bilinear sample; anything outside the unit square is 0.
    pub fn sample(&self, uv: Vec2) -> f32 {
        if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return 0.0;
        }
        let x = uv.x * (self.width - 1) as f32;
        let y = uv.y * (self.height - 1) as f32;
        let (x0, y0) = (x.floor() as u32, y.floor() as u32);
        let (fx, fy) = (x.fract(), y.fract());

        let top = self.texel(x0, y0) * (1.0 - fx) + self.texel(x0 + 1, y0) * fx;
        let bottom = self.texel(x0, y0 + 1) * (1.0 - fx) + self.texel(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

#[derive(Debug, Clone, Default)]
pub struct Picking {
    symmetric: bool,
    mesh: Option<MeshId>,
    face: Option<u32>,
    triangle: [u32; 3],
    barycentric: Vec3,
    local_point: Vec3,
    local_normal: Vec3,
    local_ray: Option<Ray>,
    distance: f32,
    local_radius2: f32,
    world_radius2: f32,
    ring: Vec<u32>,
    alpha: Option<AlphaMask>,
}

impl Picking {
    pub fn new(symmetric: bool) -> Self {
        Self {
            symmetric,
            ..Default::default()
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Forget the last hit; radius and alpha are kept.
    pub fn clear(&mut self) {
        self.mesh = None;
        self.face = None;
        self.local_ray = None;
        self.ring.clear();
    }

    pub fn mesh(&self) -> Option<MeshId> {
        self.mesh
    }

    /// Face under the pointer, `None` when a mirrored ray missed.
    pub fn face(&self) -> Option<u32> {
        self.face
    }

    pub fn triangle(&self) -> [u32; 3] {
        self.triangle
    }

    pub fn barycentric(&self) -> Vec3 {
        self.barycentric
    }

    pub fn local_point(&self) -> Vec3 {
        self.local_point
    }

    /// Interpolated surface normal at the hit, local space.
    pub fn local_normal(&self) -> Vec3 {
        self.local_normal
    }

    /// Move the pick center without casting (drag-style tools).
    pub fn set_local_point(&mut self, point: Vec3) {
        self.local_point = point;
    }

    /// World distance from the ray origin to the hit.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn local_radius2(&self) -> f32 {
        self.local_radius2
    }

    pub fn world_radius2(&self) -> f32 {
        self.world_radius2
    }

    pub fn local_radius(&self) -> f32 {
        self.local_radius2.sqrt()
    }

    pub fn ring(&self) -> &[u32] {
        &self.ring
    }

    pub fn alpha(&self) -> Option<&AlphaMask> {
        self.alpha.as_ref()
    }

    pub fn set_alpha(&mut self, alpha: Option<AlphaMask>) {
        self.alpha = alpha;
    }

    /// Closest hit among the visible meshes. The world ray is transformed into
    /// each mesh's local space; hits are compared by world distance.
    pub fn intersect_ray<'a>(
        &mut self,
        meshes: impl IntoIterator<Item = (MeshId, &'a Mesh)>,
        ray: &Ray,
    ) -> bool {
        self.clear();
        let mut best = f32::INFINITY;

        for (id, mesh) in meshes {
            if !mesh.is_visible() {
                continue;
            }
            let local_ray = ray.transformed(&mesh.inverse_matrix());
            let Some(hit) = mesh.bvh().raycast(
                local_ray.origin,
                local_ray.direction,
                mesh.positions(),
                mesh.faces(),
            ) else {
                continue;
            };

            let world = mesh.matrix().transform_point3(hit.point);
            let distance = world.distance(ray.origin);
            if distance >= best {
                continue;
            }
            best = distance;
            self.mesh = Some(id);
            self.face = Some(hit.face);
            self.triangle = hit.triangle;
            self.barycentric = hit.barycentric;
            self.local_point = hit.point;
            self.local_normal = Self::surface_normal(mesh, hit.face, hit.triangle, hit.barycentric);
            self.local_ray = Some(local_ray);
            self.distance = distance;
        }

        self.mesh.is_some()
    }

    /// Closest hit under a pointer position.
    pub fn intersect_mouse<'a>(
        &mut self,
        meshes: impl IntoIterator<Item = (MeshId, &'a Mesh)>,
        camera: &Camera,
        mouse: Vec2,
    ) -> bool {
        self.intersect_ray(meshes, &camera.ray(mouse))
    }

    /// Mirror the primary pick across the mesh symmetry plane.
    ///
    /// The mirrored local ray is cast again so the mirrored edit lands on the
    /// actual surface. When it misses, the mirrored point is still reported
    /// with no face. Radius and distance are copied from `primary`.
    pub fn intersect_symmetric(&mut self, id: MeshId, mesh: &Mesh, primary: &Picking) -> bool {
        self.clear();
        if primary.mesh != Some(id) {
            return false;
        }
        let plane = mesh.symmetry_plane();
        self.mesh = Some(id);
        self.local_point = plane.mirror_point(primary.local_point);
        self.local_normal = plane.mirror_vector(primary.local_normal);
        self.distance = primary.distance;
        self.copy_radius_from(primary);

        if let Some(ray) = primary.local_ray {
            let mirrored = Ray::new(plane.mirror_point(ray.origin), plane.mirror_vector(ray.direction));
            if let Some(hit) =
                mesh.bvh()
                    .raycast(mirrored.origin, mirrored.direction, mesh.positions(), mesh.faces())
            {
                self.face = Some(hit.face);
                self.triangle = hit.triangle;
                self.barycentric = hit.barycentric;
                self.local_point = hit.point;
                self.local_normal =
                    Self::surface_normal(mesh, hit.face, hit.triangle, hit.barycentric);
            }
            self.local_ray = Some(mirrored);
        }
        true
    }

    fn surface_normal(mesh: &Mesh, face: u32, triangle: [u32; 3], barycentric: Vec3) -> Vec3 {
        let normal = interpolate_vec3(triangle.map(|v| mesh.normals()[v as usize]), barycentric);
        if normal.length_squared() > f32::EPSILON {
            normal.normalize()
        } else {
            mesh.face_normal(face)
        }
    }

    /// Convert a screen-space radius into world and local squared radii at
    /// the current hit.
    ///
    /// The hit point is projected, offset horizontally by `screen_radius`
    /// pixels and unprojected at the same depth.
    pub fn compute_pick_radius(&mut self, camera: &Camera, mesh: &Mesh, screen_radius: f32) {
        if self.mesh.is_none() {
            return;
        }
        let world = mesh.matrix().transform_point3(self.local_point);
        let screen = camera.project(world);
        let offset = camera.unproject(screen + Vec3::new(screen_radius, 0.0, 0.0));
        self.set_world_radius2(mesh, world.distance_squared(offset));
    }

    /// Set the world radius directly; the local radius follows the mesh scale.
    pub fn set_world_radius2(&mut self, mesh: &Mesh, world_radius2: f32) {
        let scale = mesh.scale().max(f32::EPSILON);
        self.world_radius2 = world_radius2;
        self.local_radius2 = world_radius2 / (scale * scale);
    }

    pub fn copy_radius_from(&mut self, other: &Picking) {
        self.world_radius2 = other.world_radius2;
        self.local_radius2 = other.local_radius2;
    }

    /// Vertices within the local radius of the hit point. The result is
    /// cached as the current ring.
    pub fn pick_vertices_in_sphere(&mut self, mesh: &Mesh, radius2: f32) -> &[u32] {
        self.ring = mesh.vertices_in_sphere(self.local_point, radius2);
        &self.ring
    }

    /// Alpha-mask weight for a local vertex position.
    ///
    /// The mask covers the brush disk in the tangent frame of the hit normal.
    /// Without a mask the weight is 1.
    pub fn alpha_weight(&self, position: Vec3) -> f32 {
        let Some(alpha) = &self.alpha else {
            return 1.0;
        };
        let radius = self.local_radius();
        if radius <= f32::EPSILON {
            return 0.0;
        }
        let (tangent, bitangent) = self.local_normal.normalize_or(Vec3::Z).any_orthonormal_pair();
        let offset = position - self.local_point;
        let uv = Vec2::new(
            0.5 + offset.dot(tangent) / (2.0 * radius),
            0.5 + offset.dot(bitangent) / (2.0 * radius),
        );
        alpha.sample(uv)
    }

    /// Color and material under the hit, interpolated from the hit triangle.
    pub fn interpolated_material(&self, mesh: &Mesh) -> Option<(Vec3, Material)> {
        self.face?;
        let color = interpolate_vec3(self.triangle.map(|v| mesh.colors()[v as usize]), self.barycentric);
        let materials = self.triangle.map(|v| mesh.materials()[v as usize]);
        let material = materials[0].scaled(self.barycentric.x)
            + materials[1].scaled(self.barycentric.y)
            + materials[2].scaled(self.barycentric.z);
        Some((color, material))
    }
}
