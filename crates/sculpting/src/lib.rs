//! Sculpting system for Relief.
//!
//! This crate turns pointer gestures into edits of multiresolution meshes:
//! - Brush-based deformation (Brush, Inflate, Crease, Flatten, Smooth, etc.)
//! - Vertex painting and the protective mask
//! - Vertex/edge/face selection
//! - Global remesh followed by relaxation
//! - Undo/redo through reversible deltas, plus binary/JSON scene export
//!
//! # Architecture
//!
//! A [`Scene`] owns the mesh set, camera, pickers and [`History`]. Pointer
//! input is forwarded to the [`SculptManager`], which picks under the
//! pointer, captures history before every mutation and dispatches to the
//! per-tool algorithms.
//!
//! ## Key Components
//!
//! - **Types**: Tool kinds, pointer samples, selection and transform modes
//! - **Brush**: Tool parameters, falloff and per-vertex weights
//! - **Deformation**: Vertex displacement algorithms
//! - **Paint**: Color, material and mask edits
//! - **Tools**: Gesture dispatch (start → update → end)
//! - **History**: Reversible deltas and scene snapshots

pub mod brush;
pub mod deformation;
pub mod history;
pub mod meshes;
pub mod paint;
pub mod remesh;
pub mod scene;
pub mod selection;
pub mod tools;
pub mod types;

pub use brush::{BrushParams, Falloff, FalloffCurve};
pub use history::{History, SceneSnapshot, SnapshotError};
pub use meshes::MeshSet;
pub use paint::PaintSettings;
pub use remesh::{RemeshError, Resampler, TriangulatingResampler, quad_remesh};
pub use scene::{Scene, SceneError};
pub use selection::ElementSelection;
pub use tools::{SculptContext, SculptManager};
pub use types::{SculptSample, SelectionAction, SelectionMode, ToolKind, TransformMode};
