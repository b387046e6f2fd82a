//! Primitive reversible deltas.
//!
//! A delta stores the values that are *not* currently in the scene. Applying
//! it swaps stored and current values, so the same delta undoes and redoes.

use glam::Vec3;
use relief_mesh::{Material, MeshId, MultiresMesh};

use crate::meshes::MeshSet;

#[derive(Debug, Clone)]
pub enum Delta {
    /// Positions of some vertices of one level
    Geometry {
        mesh: MeshId,
        level: usize,
        indices: Vec<u32>,
        positions: Vec<Vec3>,
    },
    /// Colors and materials of some vertices of one level
    ColorAndMaterial {
        mesh: MeshId,
        level: usize,
        indices: Vec<u32>,
        colors: Vec<Vec3>,
        materials: Vec<Material>,
    },
    /// Meshes to remove and meshes to put back
    AddRemove {
        remove: Vec<MeshId>,
        stash: Vec<(MeshId, MultiresMesh)>,
    },
    /// Whole hierarchy of one mesh (subdivide, level delete, merge)
    Topology {
        mesh: MeshId,
        snapshot: Box<MultiresMesh>,
    },
    /// Active level of one mesh
    ActiveLevel { mesh: MeshId, level: usize },
}

impl Delta {
    /// Swap stored and current values.
    pub fn apply(&mut self, meshes: &mut MeshSet) {
        match self {
            Delta::Geometry {
                mesh,
                level,
                indices,
                positions,
            } => {
                let Some(target) = meshes.get_mut(*mesh).and_then(|m| m.level_mut(*level)) else {
                    tracing::warn!("Geometry delta targets missing mesh {:?} level {}", mesh, level);
                    return;
                };
                let current = target.positions_mut();
                for (&v, stored) in indices.iter().zip(positions.iter_mut()) {
                    std::mem::swap(&mut current[v as usize], stored);
                }
                target.update_geometry(Some(indices.as_slice()));
            }
            Delta::ColorAndMaterial {
                mesh,
                level,
                indices,
                colors,
                materials,
            } => {
                let Some(target) = meshes.get_mut(*mesh).and_then(|m| m.level_mut(*level)) else {
                    tracing::warn!("Color delta targets missing mesh {:?} level {}", mesh, level);
                    return;
                };
                let current = target.colors_mut();
                for (&v, stored) in indices.iter().zip(colors.iter_mut()) {
                    std::mem::swap(&mut current[v as usize], stored);
                }
                let current = target.materials_mut();
                for (&v, stored) in indices.iter().zip(materials.iter_mut()) {
                    std::mem::swap(&mut current[v as usize], stored);
                }
                target.mark_colors_dirty(indices);
            }
            Delta::AddRemove { remove, stash } => {
                let removed: Vec<(MeshId, MultiresMesh)> = remove
                    .iter()
                    .filter_map(|&id| meshes.remove(id).map(|mesh| (id, mesh)))
                    .collect();
                let restored: Vec<MeshId> = stash.iter().map(|(id, _)| *id).collect();
                for (id, mesh) in stash.drain(..) {
                    meshes.insert(id, mesh);
                }
                *remove = restored;
                *stash = removed;
            }
            Delta::Topology { mesh, snapshot } => {
                let Some(target) = meshes.get_mut(*mesh) else {
                    tracing::warn!("Topology delta targets missing mesh {:?}", mesh);
                    return;
                };
                std::mem::swap(target, snapshot.as_mut());
                target.active_mut().mark_topology_dirty();
            }
            Delta::ActiveLevel { mesh, level } => {
                let Some(target) = meshes.get_mut(*mesh) else {
                    tracing::warn!("Level delta targets missing mesh {:?}", mesh);
                    return;
                };
                let current = target.active_level();
                target.set_active_level(*level);
                *level = current;
            }
        }
    }

    /// Whether applying this delta would change anything.
    pub fn is_effective(&self, meshes: &MeshSet) -> bool {
        match self {
            Delta::Geometry {
                mesh,
                level,
                indices,
                positions,
            } => meshes
                .get(*mesh)
                .and_then(|m| m.level(*level))
                .is_some_and(|target| {
                    let current = target.positions();
                    indices
                        .iter()
                        .zip(positions)
                        .any(|(&v, stored)| current[v as usize] != *stored)
                }),
            Delta::ColorAndMaterial {
                mesh,
                level,
                indices,
                colors,
                materials,
            } => meshes
                .get(*mesh)
                .and_then(|m| m.level(*level))
                .is_some_and(|target| {
                    indices.iter().zip(colors.iter().zip(materials)).any(
                        |(&v, (color, material))| {
                            target.colors()[v as usize] != *color
                                || target.materials()[v as usize] != *material
                        },
                    )
                }),
            Delta::AddRemove { remove, stash } => !remove.is_empty() || !stash.is_empty(),
            Delta::Topology { .. } => true,
            Delta::ActiveLevel { mesh, level } => meshes
                .get(*mesh)
                .is_some_and(|target| target.active_level() != *level),
        }
    }
}
