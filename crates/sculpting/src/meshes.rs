//! The set of meshes owned by a scene.

use relief_mesh::{Mesh, MeshId, MultiresMesh};

/// Meshes keyed by id, kept sorted by id so iteration order is stable.
#[derive(Debug, Clone, Default)]
pub struct MeshSet {
    entries: Vec<(MeshId, MultiresMesh)>,
    next_id: u32,
}

impl MeshSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id.
    pub fn allocate_id(&mut self) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert under a fresh id.
    pub fn push(&mut self, mesh: MultiresMesh) -> MeshId {
        let id = self.allocate_id();
        self.insert(id, mesh);
        id
    }

    /// Insert or replace the mesh stored under `id`.
    pub fn insert(&mut self, id: MeshId, mesh: MultiresMesh) {
        self.next_id = self.next_id.max(id.0 + 1);
        match self.entries.binary_search_by_key(&id, |(key, _)| *key) {
            Ok(index) => self.entries[index].1 = mesh,
            Err(index) => self.entries.insert(index, (id, mesh)),
        }
    }

    pub fn remove(&mut self, id: MeshId) -> Option<MultiresMesh> {
        let index = self.entries.binary_search_by_key(&id, |(key, _)| *key).ok()?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, id: MeshId) -> Option<&MultiresMesh> {
        self.entries
            .binary_search_by_key(&id, |(key, _)| *key)
            .ok()
            .map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut MultiresMesh> {
        self.entries
            .binary_search_by_key(&id, |(key, _)| *key)
            .ok()
            .map(|index| &mut self.entries[index].1)
    }

    pub fn contains(&self, id: MeshId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = MeshId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &MultiresMesh)> {
        self.entries.iter().map(|(id, mesh)| (*id, mesh))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MeshId, &mut MultiresMesh)> {
        self.entries.iter_mut().map(|(id, mesh)| (*id, mesh))
    }

    /// Active level of every mesh, for picking.
    pub fn active_meshes(&self) -> impl Iterator<Item = (MeshId, &Mesh)> {
        self.entries.iter().map(|(id, mesh)| (*id, mesh.active()))
    }

    /// Active level of one mesh.
    pub fn active(&self, id: MeshId) -> Option<&Mesh> {
        self.get(id).map(MultiresMesh::active)
    }

    pub fn active_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.get_mut(id).map(MultiresMesh::active_mut)
    }

    /// Remove every mesh. Ids are not reused.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
