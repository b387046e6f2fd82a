//! Shared configuration for Relief
//!
//! This crate provides the single source of truth for tool defaults, history
//! depth, remesh constants and spatial index tuning shared by the mesh and
//! sculpting crates. Every section has a `Default` impl built from the named
//! constants below, and a whole [`ReliefConfig`] can be loaded from JSON with
//! missing fields falling back to those defaults.

use serde::{Deserialize, Serialize};

/// Default brush radius in screen pixels
pub const DEFAULT_RADIUS: f32 = 50.0;

/// Smallest brush radius the GUI may set, in screen pixels
pub const MIN_RADIUS: f32 = 5.0;

/// Largest brush radius the GUI may set, in screen pixels
pub const MAX_RADIUS: f32 = 500.0;

/// Default brush intensity (0..1)
pub const DEFAULT_INTENSITY: f32 = 0.5;

/// Bounding-box diagonal that imported meshes are normalized to
pub const DEFAULT_NORMALIZE_SCALE: f32 = 100.0;

/// Maximum number of undo states kept
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Remesh resolution used by the quad remesh pipeline
pub const DEFAULT_REMESH_RESOLUTION: u32 = 150;

/// Relaxation passes run after resampling
pub const DEFAULT_RELAX_ITERATIONS: usize = 6;

/// Per-pass relaxation intensity
pub const DEFAULT_RELAX_INTENSITY: f32 = 0.4;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default parameters handed to every sculpt tool when it is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    /// Brush radius in screen pixels
    pub radius: f32,
    /// Brush intensity (0..1)
    pub intensity: f32,
    /// Falloff hardness (0 = fully smooth edge)
    pub hardness: f32,
    /// Exclude back-facing vertices from the influence set
    pub culling: bool,
    /// Let overlapping samples of one gesture compound
    pub accumulate: bool,
    /// Mirror every edit across the mesh symmetry plane
    pub symmetry: bool,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            intensity: DEFAULT_INTENSITY,
            hardness: 0.0,
            culling: false,
            accumulate: true,
            symmetry: true,
        }
    }
}

/// Constants for the remesh + relaxation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemeshConfig {
    /// Target resolution handed to the resampler
    pub resolution: u32,
    /// Number of relaxation passes
    pub relax_iterations: usize,
    /// Smoothing intensity per pass
    pub relax_intensity: f32,
    /// Restrict relaxation to the tangent plane
    pub tangent: bool,
}

impl Default for RemeshConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_REMESH_RESOLUTION,
            relax_iterations: DEFAULT_RELAX_ITERATIONS,
            relax_intensity: DEFAULT_RELAX_INTENSITY,
            tangent: true,
        }
    }
}

/// Tuning for the per-mesh bounding volume hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Maximum faces stored in one leaf
    pub max_faces_per_leaf: usize,
    /// Maximum tree depth
    pub max_depth: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            max_faces_per_leaf: 8,
            max_depth: 32,
        }
    }
}

/// Scene-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Diagonal length meshes are normalized to on ingestion
    pub normalize_scale: f32,
    /// Scale and center the whole imported set
    pub auto_matrix: bool,
    /// Maximum number of undo states
    pub history_limit: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            normalize_scale: DEFAULT_NORMALIZE_SCALE,
            auto_matrix: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Complete configuration for a sculpting session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefConfig {
    pub tools: ToolDefaults,
    pub remesh: RemeshConfig,
    pub spatial: SpatialConfig,
    pub scene: SceneConfig,
}

impl ReliefConfig {
    /// Parse a configuration from JSON, filling absent fields with defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
