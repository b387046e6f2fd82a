//! Dirty tracking handed to the rendering collaborator.
//!
//! Geometry updates widen a single vertex span; the renderer drains it with
//! [`crate::Mesh::take_dirty`] and re-uploads that span.

use std::ops::Range;

/// Vertex span modified since the last drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyRange {
    /// Modified vertices, `None` when nothing changed.
    pub vertices: Option<Range<u32>>,
    /// Face arrays changed; index buffers must be rebuilt too.
    pub topology_changed: bool,
}

impl DirtyRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a single vertex.
    pub fn mark(&mut self, vertex: u32) {
        self.vertices = Some(match self.vertices.take() {
            Some(range) => range.start.min(vertex)..range.end.max(vertex + 1),
            None => vertex..vertex + 1,
        });
    }

    /// Mark multiple vertices.
    pub fn mark_all(&mut self, vertices: impl IntoIterator<Item = u32>) {
        for vertex in vertices {
            self.mark(vertex);
        }
    }

    /// Mark every vertex of a mesh with `count` vertices.
    pub fn mark_everything(&mut self, count: usize, topology_changed: bool) {
        self.vertices = (count > 0).then_some(0..count as u32);
        self.topology_changed |= topology_changed;
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_none() && !self.topology_changed
    }

    /// Number of vertices in the span.
    pub fn len(&self) -> usize {
        self.vertices.as_ref().map_or(0, |r| r.len())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
