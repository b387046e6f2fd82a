//! Relief mesh core.
//!
//! This crate provides the data side of sculpting:
//! - Structure-of-arrays mesh levels with triangle/quad faces
//! - Multiresolution hierarchies with explicit correspondence and displacement
//! - A per-level BVH for ray casts and brush sphere queries
//! - Camera model and pointer picking, including symmetric picking
//!
//! # Example
//!
//! ```ignore
//! use relief_mesh::{Camera, MeshId, Picking, primitives};
//!
//! let mesh = primitives::sphere(16, 32)?;
//! let mut picking = Picking::new(false);
//! if picking.intersect_mouse([(MeshId(0), &mesh)], &camera, mouse) {
//!     picking.compute_pick_radius(&camera, &mesh, 50.0);
//!     let ring = picking.pick_vertices_in_sphere(&mesh, picking.local_radius2());
//! }
//! ```

pub mod camera;
pub mod constants;
pub mod dirty;
pub mod mesh;
pub mod multires;
pub mod picking;
pub mod primitives;
pub mod raycast;
pub mod spatial;
pub mod topology;
pub mod types;

pub use camera::{Camera, ProjectionKind};
pub use constants::TRI_INDEX;
pub use dirty::DirtyRange;
pub use mesh::{Mesh, validate_faces};
pub use multires::{Correspondence, LevelLink, MultiresMesh};
pub use picking::{AlphaMask, Picking};
pub use raycast::Ray;
pub use spatial::{Aabb, Bvh, FaceHit};
pub use topology::Topology;
pub use types::{Face, Material, MeshError, MeshId, SymmetryPlane};
