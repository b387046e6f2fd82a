//! Index-based adjacency for a mesh level.
//!
//! Adjacency is stored in compressed rows (offsets + flat lists) so a vertex's
//! faces and ring neighbors are contiguous slices.

use std::collections::HashMap;

use crate::types::Face;

#[derive(Debug, Clone, Default)]
pub struct Topology {
    face_offsets: Vec<u32>,
    vertex_faces: Vec<u32>,
    neighbor_offsets: Vec<u32>,
    vertex_neighbors: Vec<u32>,
    boundary: Vec<bool>,
}

fn compress(rows: Vec<Vec<u32>>) -> (Vec<u32>, Vec<u32>) {
    let mut offsets = Vec::with_capacity(rows.len() + 1);
    let mut flat = Vec::with_capacity(rows.iter().map(Vec::len).sum());
    offsets.push(0);
    for row in rows {
        flat.extend(row);
        offsets.push(flat.len() as u32);
    }
    (offsets, flat)
}

impl Topology {
    pub fn build(vertex_count: usize, faces: &[Face]) -> Self {
        let mut faces_of = vec![Vec::new(); vertex_count];
        let mut neighbors_of: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
        let mut edge_use: HashMap<(u32, u32), u32> = HashMap::new();

        for (index, face) in faces.iter().enumerate() {
            for &v in face.corners() {
                faces_of[v as usize].push(index as u32);
            }
            for (a, b) in face.edges() {
                neighbors_of[a as usize].push(b);
                neighbors_of[b as usize].push(a);
                *edge_use.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        for row in &mut neighbors_of {
            row.sort_unstable();
            row.dedup();
        }

        let mut boundary = vec![false; vertex_count];
        for (&(a, b), &count) in &edge_use {
            if count == 1 {
                boundary[a as usize] = true;
                boundary[b as usize] = true;
            }
        }

        let (face_offsets, vertex_faces) = compress(faces_of);
        let (neighbor_offsets, vertex_neighbors) = compress(neighbors_of);
        Self {
            face_offsets,
            vertex_faces,
            neighbor_offsets,
            vertex_neighbors,
            boundary,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.boundary.len()
    }

    /// Faces that use vertex `v`.
    pub fn faces_of(&self, v: u32) -> &[u32] {
        let v = v as usize;
        &self.vertex_faces[self.face_offsets[v] as usize..self.face_offsets[v + 1] as usize]
    }

    /// Vertices sharing an edge with `v`, ascending.
    pub fn neighbors_of(&self, v: u32) -> &[u32] {
        let v = v as usize;
        &self.vertex_neighbors
            [self.neighbor_offsets[v] as usize..self.neighbor_offsets[v + 1] as usize]
    }

    /// Whether `v` lies on an edge used by a single face.
    pub fn is_boundary(&self, v: u32) -> bool {
        self.boundary[v as usize]
    }

    /// Faces touching any of `vertices`, sorted and deduplicated.
    pub fn faces_around(&self, vertices: &[u32]) -> Vec<u32> {
        let mut faces: Vec<u32> = vertices
            .iter()
            .flat_map(|&v| self.faces_of(v).iter().copied())
            .collect();
        faces.sort_unstable();
        faces.dedup();
        faces
    }
}
