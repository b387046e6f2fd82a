//! Spatial data structures for picking and brush queries.
//!
//! This module provides a bounding volume hierarchy over mesh faces for:
//! - Closest-hit ray casts from the pointer
//! - Face queries within a brush sphere
//! - Incremental refit of the boxes touched by a brush sample

use glam::Vec3;
use relief_config::SpatialConfig;

use crate::raycast::{ray_aabb_intersection, ray_triangle_intersection};
use crate::types::Face;

const NO_NODE: u32 = u32::MAX;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::empty();
        for point in points {
            bounds.include_point(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn diagonal(&self) -> f32 {
        if self.is_empty() { 0.0 } else { self.size().length() }
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn intersects_sphere(&self, center: Vec3, radius_squared: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius_squared
    }

    /// Bounds of this box after an affine transform (all 8 corners).
    pub fn transformed(&self, matrix: &glam::Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::from_points((0..8).map(|i| {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            matrix.transform_point3(corner)
        }))
    }
}

/// Closest ray hit on a face, in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceHit {
    pub face: u32,
    /// Vertex indices of the sub-triangle that was hit.
    pub triangle: [u32; 3],
    /// Weights of `triangle`'s corners at the hit point.
    pub barycentric: Vec3,
    pub t: f32,
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { start: u32, count: u32 },
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Aabb,
    parent: u32,
    kind: NodeKind,
}

/// Bounding volume hierarchy over the faces of one mesh level.
///
/// Nodes are stored in pre-order, so a parent always has a lower index than
/// its children. Leaves reference spans of `face_order`.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    face_order: Vec<u32>,
    leaf_of_face: Vec<u32>,
    max_faces_per_leaf: usize,
    max_depth: u32,
}

fn face_bounds(positions: &[Vec3], face: &Face) -> Aabb {
    Aabb::from_points(face.corners().iter().map(|&v| positions[v as usize]))
}

impl Bvh {
    /// Build with a median split on the longest axis of the centroid bounds.
    pub fn build(positions: &[Vec3], faces: &[Face], config: &SpatialConfig) -> Self {
        let mut bvh = Self {
            nodes: Vec::new(),
            face_order: (0..faces.len() as u32).collect(),
            leaf_of_face: vec![NO_NODE; faces.len()],
            max_faces_per_leaf: config.max_faces_per_leaf.max(1),
            max_depth: config.max_depth,
        };
        if faces.is_empty() {
            return bvh;
        }

        let bounds: Vec<Aabb> = faces.iter().map(|f| face_bounds(positions, f)).collect();
        let centroids: Vec<Vec3> = bounds.iter().map(Aabb::center).collect();
        bvh.build_node(0, faces.len(), NO_NODE, 0, &bounds, &centroids);

        tracing::trace!(
            "Built BVH with {} nodes over {} faces",
            bvh.nodes.len(),
            faces.len()
        );
        bvh
    }

    fn build_node(
        &mut self,
        start: usize,
        end: usize,
        parent: u32,
        depth: u32,
        bounds: &[Aabb],
        centroids: &[Vec3],
    ) -> u32 {
        let index = self.nodes.len() as u32;
        let mut node_bounds = Aabb::empty();
        let mut centroid_bounds = Aabb::empty();
        for &face in &self.face_order[start..end] {
            node_bounds = node_bounds.union(&bounds[face as usize]);
            centroid_bounds.include_point(centroids[face as usize]);
        }

        let count = end - start;
        self.nodes.push(BvhNode {
            bounds: node_bounds,
            parent,
            kind: NodeKind::Leaf {
                start: start as u32,
                count: count as u32,
            },
        });

        if count <= self.max_faces_per_leaf || depth >= self.max_depth {
            for &face in &self.face_order[start..end] {
                self.leaf_of_face[face as usize] = index;
            }
            return index;
        }

        let axis = centroid_bounds.longest_axis();
        let half = count / 2;
        self.face_order[start..end].select_nth_unstable_by(half, |&a, &b| {
            centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
        });

        let left = self.build_node(start, start + half, index, depth + 1, bounds, centroids);
        let right = self.build_node(start + half, end, index, depth + 1, bounds, centroids);
        self.nodes[index as usize].kind = NodeKind::Internal { left, right };
        index
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Root bounds, empty for a mesh without faces.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    /// Refit the leaves holding `touched_faces` and all of their ancestors.
    pub fn refit(
        &mut self,
        positions: &[Vec3],
        faces: &[Face],
        touched_faces: impl IntoIterator<Item = u32>,
    ) {
        let mut leaves: Vec<u32> = touched_faces
            .into_iter()
            .filter_map(|f| self.leaf_of_face.get(f as usize).copied())
            .filter(|&leaf| leaf != NO_NODE)
            .collect();
        if leaves.is_empty() {
            return;
        }
        leaves.sort_unstable();
        leaves.dedup();

        let mut ancestors = Vec::new();
        for &leaf in &leaves {
            let node = self.nodes[leaf as usize];
            if let NodeKind::Leaf { start, count } = node.kind {
                let span = &self.face_order[start as usize..(start + count) as usize];
                self.nodes[leaf as usize].bounds = span.iter().fold(Aabb::empty(), |acc, &f| {
                    acc.union(&face_bounds(positions, &faces[f as usize]))
                });
            }
            let mut parent = node.parent;
            while parent != NO_NODE {
                ancestors.push(parent);
                parent = self.nodes[parent as usize].parent;
            }
        }

        // Pre-order storage: children come after their parent, so walking
        // ancestors from the highest index down sees children first.
        ancestors.sort_unstable_by(|a, b| b.cmp(a));
        ancestors.dedup();
        for node in ancestors {
            if let NodeKind::Internal { left, right } = self.nodes[node as usize].kind {
                let bounds = self.nodes[left as usize]
                    .bounds
                    .union(&self.nodes[right as usize].bounds);
                self.nodes[node as usize].bounds = bounds;
            }
        }
    }

    /// Closest hit along the ray, in local space.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        positions: &[Vec3],
        faces: &[Face],
    ) -> Option<FaceHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = direction.recip();
        let mut best: Option<FaceHit> = None;
        let mut stack = vec![0u32];

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            let Some(t_box) = ray_aabb_intersection(origin, inv_dir, node.bounds.min, node.bounds.max)
            else {
                continue;
            };
            if best.is_some_and(|hit| t_box > hit.t) {
                continue;
            }

            match node.kind {
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                NodeKind::Leaf { start, count } => {
                    for &face in &self.face_order[start as usize..(start + count) as usize] {
                        for tri in faces[face as usize].triangles() {
                            let [a, b, c] = tri.map(|v| positions[v as usize]);
                            let Some(hit) = ray_triangle_intersection(origin, direction, a, b, c)
                            else {
                                continue;
                            };
                            if best.is_none_or(|current| hit.t < current.t) {
                                best = Some(FaceHit {
                                    face,
                                    triangle: tri,
                                    barycentric: hit.barycentric(),
                                    t: hit.t,
                                    point: origin + direction * hit.t,
                                });
                            }
                        }
                    }
                }
            }
        }

        best
    }

    /// Faces whose bounds overlap the sphere, in ascending order.
    pub fn faces_in_sphere(&self, center: Vec3, radius_squared: f32) -> Vec<u32> {
        let mut result = Vec::new();
        if self.nodes.is_empty() {
            return result;
        }
        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.intersects_sphere(center, radius_squared) {
                continue;
            }
            match node.kind {
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                NodeKind::Leaf { start, count } => {
                    result.extend_from_slice(
                        &self.face_order[start as usize..(start + count) as usize],
                    );
                }
            }
        }
        result.sort_unstable();
        result
    }
}
