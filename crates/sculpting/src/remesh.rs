//! Global remesh followed by relaxation.
//!
//! The resampler produces new topology for the input surface; relaxation
//! then evens out vertex spacing. Neither step records history: the caller
//! wraps the whole pipeline in one add/remove state.

use std::collections::HashMap;

use glam::Vec3;
use relief_config::RemeshConfig;
use relief_mesh::{Aabb, Face, Material, Mesh};
use thiserror::Error;

use crate::deformation::laplacian_offsets;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemeshError {
    #[error("No faces to remesh")]
    EmptyInput,

    #[error("Input has a degenerate bounding box")]
    DegenerateInput,

    #[error("Resampler produced no surface")]
    ResampleFailed,
}

/// Produces new topology approximating the union of the input meshes.
///
/// The output is in world space with an identity matrix.
pub trait Resampler {
    fn resample(&self, meshes: &[&Mesh], resolution: u32) -> Option<Mesh>;
}

/// Welds coincident vertices on a grid of `diagonal / resolution` and
/// triangulates every face. Degenerate triangles are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriangulatingResampler;

impl Resampler for TriangulatingResampler {
    fn resample(&self, meshes: &[&Mesh], resolution: u32) -> Option<Mesh> {
        let bounds = meshes
            .iter()
            .fold(Aabb::empty(), |acc, mesh| acc.union(&mesh.world_bounds()));
        let cell = bounds.diagonal() / resolution.max(1) as f32;
        if cell <= f32::EPSILON {
            return None;
        }

        let mut welded: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut positions = Vec::new();
        let mut colors = Vec::new();
        let mut materials: Vec<Material> = Vec::new();
        let mut faces = Vec::new();

        for mesh in meshes {
            let matrix = mesh.matrix();
            let mut remap = vec![u32::MAX; mesh.vertex_count()];
            let mut vertex = |v: u32| -> u32 {
                let slot = &mut remap[v as usize];
                if *slot != u32::MAX {
                    return *slot;
                }
                let world = matrix.transform_point3(mesh.positions()[v as usize]);
                let key = (world / cell).round().as_i64vec3();
                let index = *welded.entry((key.x, key.y, key.z)).or_insert_with(|| {
                    positions.push(world);
                    colors.push(mesh.colors()[v as usize]);
                    materials.push(mesh.materials()[v as usize]);
                    positions.len() as u32 - 1
                });
                *slot = index;
                index
            };

            for face in mesh.faces() {
                for triangle in face.triangles() {
                    let [a, b, c] = triangle.map(&mut vertex);
                    if a != b && b != c && a != c {
                        faces.push(Face::triangle(a, b, c));
                    }
                }
            }
        }

        if faces.is_empty() {
            return None;
        }
        let config = meshes.first().map(|m| m.spatial_config().clone()).unwrap_or_default();
        Mesh::with_attributes(positions, faces, colors, materials, &config).ok()
    }
}

/// Laplacian relaxation of every vertex, `iterations` times.
pub fn relax(mesh: &mut Mesh, iterations: usize, intensity: f32, tangent: bool) {
    let vertices: Vec<u32> = (0..mesh.vertex_count() as u32).collect();
    for _ in 0..iterations {
        let offsets = laplacian_offsets(mesh, &vertices, tangent);
        for (position, offset) in mesh.positions_mut().iter_mut().zip(offsets) {
            *position += offset * intensity;
        }
        mesh.update_geometry(None);
    }
}

/// Resample `meshes` into one new mesh and relax it. Inputs are never
/// modified.
pub fn quad_remesh(
    meshes: &[&Mesh],
    resampler: &dyn Resampler,
    config: &RemeshConfig,
) -> Result<Mesh, RemeshError> {
    if meshes.iter().all(|mesh| mesh.face_count() == 0) {
        return Err(RemeshError::EmptyInput);
    }
    let bounds = meshes
        .iter()
        .fold(Aabb::empty(), |acc, mesh| acc.union(&mesh.world_bounds()));
    if bounds.diagonal() <= f32::EPSILON {
        return Err(RemeshError::DegenerateInput);
    }

    let mut remeshed = resampler
        .resample(meshes, config.resolution)
        .filter(|mesh| mesh.face_count() > 0)
        .ok_or(RemeshError::ResampleFailed)?;
    relax(
        &mut remeshed,
        config.relax_iterations,
        config.relax_intensity,
        config.tangent,
    );
    remeshed.compute_center();

    tracing::debug!(
        "Remeshed {} meshes into {} vertices / {} faces",
        meshes.len(),
        remeshed.vertex_count(),
        remeshed.face_count()
    );
    Ok(remeshed)
}
