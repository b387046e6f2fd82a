//! Scene snapshots for export.
//!
//! A snapshot is a plain serde value (JSON via `serde_json`) with a compact
//! binary form. The binary layout is little-endian throughout:
//!
//! ```text
//! "RLF1" | version u32 | mesh count u32
//! per mesh:  id u32 | matrix [f32; 16] | plane origin, normal [f32; 6]
//!            visible u32 | active level u32 | level count u32
//!   per level: vertex count u32 | face count u32
//!              positions | colors | materials | faces
//!   per link:  fine count u32 | correspondence [u32; 3] each
//!              displacement | color detail | material detail
//! ```

use bytemuck::Pod;
use glam::{Mat4, Vec3};
use relief_config::SpatialConfig;
use relief_mesh::{
    Correspondence, Face, LevelLink, Material, Mesh, MeshError, MeshId, MultiresMesh,
    SymmetryPlane,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meshes::MeshSet;

const MAGIC: &[u8; 4] = b"RLF1";
const VERSION: u32 = 1;

const TAG_VERTEX: u32 = 0;
const TAG_EDGE: u32 = 1;
const TAG_FACE_CENTER: u32 = 2;

/// Errors raised while decoding or rebuilding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot does not start with the expected magic bytes")]
    BadMagic,

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("Snapshot truncated at byte {0}")]
    Truncated(usize),

    #[error("Unknown correspondence tag {0}")]
    InvalidCorrespondence(u32),

    #[error("Invalid mesh data: {0}")]
    Mesh(#[from] MeshError),

    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Vertex and face arrays of one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub materials: Vec<Material>,
    pub faces: Vec<Face>,
}

/// Link between two consecutive levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub correspondence: Vec<Correspondence>,
    pub displacement: Vec<Vec3>,
    pub color_detail: Vec<Vec3>,
    pub material_detail: Vec<Material>,
}

/// One mesh with its whole hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub id: MeshId,
    pub matrix: Mat4,
    pub symmetry: SymmetryPlane,
    pub visible: bool,
    pub active_level: usize,
    pub levels: Vec<LevelRecord>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub meshes: Vec<MeshRecord>,
}

impl SceneSnapshot {
    pub fn capture(meshes: &MeshSet) -> Self {
        let meshes = meshes
            .iter()
            .map(|(id, multires)| {
                let active = multires.active();
                MeshRecord {
                    id,
                    matrix: active.matrix(),
                    symmetry: active.symmetry_plane(),
                    visible: active.is_visible(),
                    active_level: multires.active_level(),
                    levels: multires
                        .levels()
                        .iter()
                        .map(|level| LevelRecord {
                            positions: level.positions().to_vec(),
                            colors: level.colors().to_vec(),
                            materials: level.materials().to_vec(),
                            faces: level.faces().to_vec(),
                        })
                        .collect(),
                    links: multires
                        .links()
                        .iter()
                        .map(|link| LinkRecord {
                            correspondence: link.correspondence().to_vec(),
                            displacement: link.displacement().to_vec(),
                            color_detail: link.color_detail().to_vec(),
                            material_detail: link.material_detail().to_vec(),
                        })
                        .collect(),
                }
            })
            .collect();
        Self { meshes }
    }

    /// Rebuild the meshes described by this snapshot.
    pub fn restore(
        &self,
        config: &SpatialConfig,
    ) -> Result<Vec<(MeshId, MultiresMesh)>, SnapshotError> {
        self.meshes
            .iter()
            .map(|record| {
                let levels = record
                    .levels
                    .iter()
                    .map(|level| {
                        Mesh::with_attributes(
                            level.positions.clone(),
                            level.faces.clone(),
                            level.colors.clone(),
                            level.materials.clone(),
                            config,
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let links = record
                    .links
                    .iter()
                    .map(|link| {
                        LevelLink::from_parts(
                            link.correspondence.clone(),
                            link.displacement.clone(),
                            link.color_detail.clone(),
                            link.material_detail.clone(),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let mut multires = MultiresMesh::from_parts(levels, links, record.active_level)?;
                multires.set_matrix(record.matrix);
                multires.set_symmetry_plane(record.symmetry);
                multires.set_visible(record.visible);
                Ok((record.id, multires))
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        put_u32(&mut out, VERSION);
        put_u32(&mut out, self.meshes.len() as u32);

        for record in &self.meshes {
            put_u32(&mut out, record.id.0);
            put_slice(&mut out, &[record.matrix]);
            put_slice(&mut out, &[record.symmetry.origin, record.symmetry.normal]);
            put_u32(&mut out, record.visible as u32);
            put_u32(&mut out, record.active_level as u32);
            put_u32(&mut out, record.levels.len() as u32);

            for level in &record.levels {
                put_u32(&mut out, level.positions.len() as u32);
                put_u32(&mut out, level.faces.len() as u32);
                put_slice(&mut out, &level.positions);
                put_slice(&mut out, &level.colors);
                put_slice(&mut out, &level.materials);
                put_slice(&mut out, &level.faces);
            }
            for link in &record.links {
                put_u32(&mut out, link.correspondence.len() as u32);
                let encoded: Vec<[u32; 3]> = link
                    .correspondence
                    .iter()
                    .map(|c| match *c {
                        Correspondence::Vertex(v) => [TAG_VERTEX, v, 0],
                        Correspondence::Edge(a, b) => [TAG_EDGE, a, b],
                        Correspondence::FaceCenter(f) => [TAG_FACE_CENTER, f, 0],
                    })
                    .collect();
                put_slice(&mut out, &encoded);
                put_slice(&mut out, &link.displacement);
                put_slice(&mut out, &link.color_detail);
                put_slice(&mut out, &link.material_detail);
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut reader = Reader { bytes, offset: 0 };
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = reader.u32()?;
        if version != VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let mesh_count = reader.u32()?;
        let mut meshes = Vec::new();
        for _ in 0..mesh_count {
            let id = MeshId(reader.u32()?);
            let matrix = reader.pod::<Mat4>()?;
            let [origin, normal] = reader.pod::<[Vec3; 2]>()?;
            let visible = reader.u32()? != 0;
            let active_level = reader.u32()? as usize;
            let level_count = reader.u32()? as usize;

            let mut levels = Vec::new();
            for _ in 0..level_count {
                let vertices = reader.u32()? as usize;
                let faces = reader.u32()? as usize;
                levels.push(LevelRecord {
                    positions: reader.vec(vertices)?,
                    colors: reader.vec(vertices)?,
                    materials: reader.vec(vertices)?,
                    faces: reader.vec(faces)?,
                });
            }
            let mut links = Vec::new();
            for _ in 1..level_count {
                let count = reader.u32()? as usize;
                let correspondence = reader
                    .vec::<[u32; 3]>(count)?
                    .into_iter()
                    .map(|[tag, a, b]| match tag {
                        TAG_VERTEX => Ok(Correspondence::Vertex(a)),
                        TAG_EDGE => Ok(Correspondence::Edge(a, b)),
                        TAG_FACE_CENTER => Ok(Correspondence::FaceCenter(a)),
                        other => Err(SnapshotError::InvalidCorrespondence(other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                links.push(LinkRecord {
                    correspondence,
                    displacement: reader.vec(count)?,
                    color_detail: reader.vec(count)?,
                    material_detail: reader.vec(count)?,
                });
            }

            meshes.push(MeshRecord {
                id,
                matrix,
                symmetry: SymmetryPlane { origin, normal },
                visible,
                active_level,
                levels,
                links,
            });
        }
        Ok(Self { meshes })
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_slice<T: Pod>(out: &mut Vec<u8>, values: &[T]) {
    out.extend_from_slice(bytemuck::cast_slice(values));
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(SnapshotError::Truncated(self.offset))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, SnapshotError> {
        self.pod()
    }

    fn pod<T: Pod>(&mut self) -> Result<T, SnapshotError> {
        Ok(bytemuck::pod_read_unaligned(self.take(size_of::<T>())?))
    }

    fn vec<T: Pod>(&mut self, count: usize) -> Result<Vec<T>, SnapshotError> {
        let size = size_of::<T>();
        let len = count
            .checked_mul(size)
            .ok_or(SnapshotError::Truncated(self.offset))?;
        Ok(self
            .take(len)?
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_mesh::primitives;

    fn sample_set() -> MeshSet {
        let mut meshes = MeshSet::new();
        let mut sphere = MultiresMesh::new(primitives::sphere(4, 6).unwrap());
        sphere.subdivide().unwrap();
        sphere.active_mut().materials_mut()[3].selection = 0.75;
        sphere.active_mut().colors_mut()[5] = Vec3::new(0.2, 0.4, 0.6);
        sphere.set_active_level(0);
        sphere.set_matrix(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        meshes.push(sphere);
        meshes.push(primitives::cube().unwrap().into());
        meshes
    }

    #[test]
    fn test_bytes_round_trip() {
        let snapshot = SceneSnapshot::capture(&sample_set());
        let bytes = snapshot.to_bytes();
        let decoded = SceneSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.meshes[0].levels.len(), 2);
        assert_eq!(decoded.meshes[0].active_level, 0);
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = SceneSnapshot::capture(&sample_set());
        let json = snapshot.to_json().unwrap();
        assert_eq!(SceneSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_restore_rebuilds_hierarchy() {
        let set = sample_set();
        let snapshot = SceneSnapshot::capture(&set);
        let restored = snapshot.restore(&SpatialConfig::default()).unwrap();
        assert_eq!(restored.len(), 2);

        let (id, sphere) = &restored[0];
        let original = set.get(*id).unwrap();
        assert_eq!(sphere.level_count(), 2);
        assert_eq!(sphere.active_level(), 0);
        assert_eq!(sphere.active().matrix(), original.active().matrix());
        for (a, b) in sphere.levels().iter().zip(original.levels()) {
            assert_eq!(a.positions(), b.positions());
            assert_eq!(a.faces(), b.faces());
            assert_eq!(a.materials(), b.materials());
        }
        assert_eq!(sphere.links(), original.links());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            SceneSnapshot::from_bytes(b"NOPE\x01\x00\x00\x00"),
            Err(SnapshotError::BadMagic)
        ));
        let bytes = SceneSnapshot::capture(&sample_set()).to_bytes();
        assert!(matches!(
            SceneSnapshot::from_bytes(&bytes[..bytes.len() - 3]),
            Err(SnapshotError::Truncated(_))
        ));
        assert!(matches!(
            SceneSnapshot::from_bytes(&bytes[..2]),
            Err(SnapshotError::Truncated(0))
        ));
    }
}
