//! Brush parameters and influence weights.
//!
//! A brush sample turns the vertex ring returned by the picker into
//! `(vertex, weight)` pairs. The weight of a vertex is
//! `intensity × falloff × alpha × (1 - selection)`; deformation algorithms
//! only ever see these pairs.

use std::collections::HashMap;

use glam::Vec3;
use relief_config::{MAX_RADIUS, MIN_RADIUS, ToolDefaults};
use relief_mesh::{Mesh, Picking};
use serde::{Deserialize, Serialize};

use crate::types::ToolKind;

/// Largest hardness accepted; 1.0 would divide by zero in the falloff.
pub const MAX_HARDNESS: f32 = 0.99;

/// Shape of the brush edge between the hard core and the rim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalloffCurve {
    Linear,
    /// Flat at both ends of the edge band.
    #[default]
    Smooth,
    /// Quadratic; used by crease for a narrow groove.
    Sharp,
}

impl FalloffCurve {
    /// `t` is the strength left across the edge band: 1 at the core, 0 at the rim.
    fn shape(self, t: f32) -> f32 {
        match self {
            Self::Linear => t,
            Self::Smooth => t * t * (3.0 - 2.0 * t),
            Self::Sharp => t * t,
        }
    }
}

/// Strength over the normalized brush distance.
///
/// Inside `hardness` the strength is 1; outside, `curve` runs from 1 at the
/// core down to 0 at the rim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Falloff {
    pub curve: FalloffCurve,
    pub hardness: f32,
}

impl Falloff {
    pub fn evaluate(&self, normalized_distance: f32) -> f32 {
        let d = normalized_distance.clamp(0.0, 1.0);
        if d <= self.hardness {
            return 1.0;
        }
        self.curve.shape((1.0 - d) / (1.0 - self.hardness))
    }
}

/// Parameters of one tool. Fields are private; setters clamp to valid ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushParams {
    radius: f32,
    intensity: f32,
    hardness: f32,
    falloff: FalloffCurve,
    culling: bool,
    accumulate: bool,
    negative: bool,
    pressure_affects_radius: bool,
    pressure_affects_intensity: bool,
}

impl Default for BrushParams {
    fn default() -> Self {
        Self::from_defaults(&ToolDefaults::default())
    }
}

impl BrushParams {
    pub fn from_defaults(defaults: &ToolDefaults) -> Self {
        let mut params = Self {
            radius: MIN_RADIUS,
            intensity: 0.0,
            hardness: 0.0,
            falloff: FalloffCurve::Smooth,
            culling: defaults.culling,
            accumulate: defaults.accumulate,
            negative: false,
            pressure_affects_radius: false,
            pressure_affects_intensity: true,
        };
        params.set_radius(defaults.radius);
        params.set_intensity(defaults.intensity);
        params.set_hardness(defaults.hardness);
        params
    }

    /// Starting parameters for a tool.
    pub fn for_tool(tool: ToolKind, defaults: &ToolDefaults) -> Self {
        let mut params = Self::from_defaults(defaults);
        match tool {
            ToolKind::Smooth | ToolKind::Flatten | ToolKind::Pinch => params.set_intensity(0.75),
            ToolKind::Inflate => params.set_intensity(0.3),
            ToolKind::Crease => params.set_falloff(FalloffCurve::Sharp),
            ToolKind::Paint => {
                params.set_intensity(1.0);
                params.set_hardness(0.25);
            }
            ToolKind::Masking => {
                params.set_intensity(1.0);
                params.set_hardness(0.25);
            }
            ToolKind::Drag | ToolKind::Move => {
                params.set_intensity(1.0);
                params.pressure_affects_intensity = false;
            }
            ToolKind::Twist | ToolKind::LocalScale => {
                params.set_intensity(1.0);
                params.pressure_affects_intensity = false;
            }
            ToolKind::Brush | ToolKind::Transform | ToolKind::ElementSelect => {}
        }
        params
    }

    /// Brush radius in screen pixels.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.clamp(MIN_RADIUS, MAX_RADIUS);
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.clamp(0.0, 1.0);
    }

    pub fn hardness(&self) -> f32 {
        self.hardness
    }

    pub fn set_hardness(&mut self, hardness: f32) {
        self.hardness = hardness.clamp(0.0, MAX_HARDNESS);
    }

    pub fn falloff_curve(&self) -> FalloffCurve {
        self.falloff
    }

    pub fn set_falloff(&mut self, falloff: FalloffCurve) {
        self.falloff = falloff;
    }

    pub fn falloff(&self) -> Falloff {
        Falloff {
            curve: self.falloff,
            hardness: self.hardness,
        }
    }

    pub fn culling(&self) -> bool {
        self.culling
    }

    pub fn set_culling(&mut self, culling: bool) {
        self.culling = culling;
    }

    pub fn accumulate(&self) -> bool {
        self.accumulate
    }

    pub fn set_accumulate(&mut self, accumulate: bool) {
        self.accumulate = accumulate;
    }

    pub fn negative(&self) -> bool {
        self.negative
    }

    pub fn set_negative(&mut self, negative: bool) {
        self.negative = negative;
    }

    pub fn pressure_affects_radius(&self) -> bool {
        self.pressure_affects_radius
    }

    pub fn set_pressure_affects_radius(&mut self, enabled: bool) {
        self.pressure_affects_radius = enabled;
    }

    pub fn pressure_affects_intensity(&self) -> bool {
        self.pressure_affects_intensity
    }

    pub fn set_pressure_affects_intensity(&mut self, enabled: bool) {
        self.pressure_affects_intensity = enabled;
    }

    /// Get effective radius based on pressure.
    pub fn effective_radius(&self, pressure: f32) -> f32 {
        if self.pressure_affects_radius {
            self.radius * (0.5 + 0.5 * pressure)
        } else {
            self.radius
        }
    }

    /// Get effective intensity based on pressure.
    pub fn effective_intensity(&self, pressure: f32) -> f32 {
        if self.pressure_affects_intensity {
            self.intensity * pressure
        } else {
            self.intensity
        }
    }

    /// +1, or -1 when `negative` is set.
    pub fn sign(&self) -> f32 {
        if self.negative { -1.0 } else { 1.0 }
    }
}

/// Where the viewer is, in mesh-local space, for back-face culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewOrigin {
    /// Perspective eye position
    Eye(Vec3),
    /// Orthographic viewing direction
    Direction(Vec3),
}

impl ViewOrigin {
    /// Whether a vertex with normal `normal` at `position` faces the viewer.
    pub fn faces_viewer(&self, position: Vec3, normal: Vec3) -> bool {
        match *self {
            ViewOrigin::Eye(eye) => normal.dot(eye - position) > 0.0,
            ViewOrigin::Direction(direction) => normal.dot(-direction) > 0.0,
        }
    }
}

/// Everything needed to weight the ring of one sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleFrame {
    pub center: Vec3,
    pub radius2: f32,
    pub intensity: f32,
    pub falloff: Falloff,
    pub respect_mask: bool,
    /// `Some` when culling is enabled.
    pub view: Option<ViewOrigin>,
}

/// Weights of the ring vertices for one sample. Vertices outside the sphere,
/// culled, or with zero weight are dropped.
pub fn vertex_weights(
    mesh: &Mesh,
    ring: &[u32],
    picking: &Picking,
    frame: &SampleFrame,
) -> Vec<(u32, f32)> {
    if frame.radius2 <= 0.0 {
        return Vec::new();
    }
    let positions = mesh.positions();
    let normals = mesh.normals();
    let materials = mesh.materials();

    ring.iter()
        .filter_map(|&v| {
            let p = positions[v as usize];
            let d2 = p.distance_squared(frame.center);
            if d2 > frame.radius2 {
                return None;
            }
            if let Some(view) = frame.view
                && !view.faces_viewer(p, normals[v as usize])
            {
                return None;
            }
            let mask = if frame.respect_mask {
                1.0 - materials[v as usize].selection
            } else {
                1.0
            };
            let weight = frame.intensity
                * frame.falloff.evaluate((d2 / frame.radius2).sqrt())
                * picking.alpha_weight(p)
                * mask;
            (weight > 0.0).then_some((v, weight))
        })
        .collect()
}

/// Per-gesture record of the largest influence applied to each vertex.
///
/// With `accumulate` off, repeated samples over the same vertex only add the
/// part of their weight that exceeds what the gesture already applied.
#[derive(Debug, Clone, Default)]
pub struct StrokeAccumulator {
    applied: HashMap<u32, f32>,
}

impl StrokeAccumulator {
    pub fn clear(&mut self) {
        self.applied.clear();
    }

    pub fn cap(&mut self, weights: &mut Vec<(u32, f32)>) {
        weights.retain_mut(|(vertex, weight)| {
            let applied = self.applied.entry(*vertex).or_insert(0.0);
            let extra = (*weight - *applied).max(0.0);
            *applied = applied.max(*weight);
            *weight = extra;
            extra > 0.0
        });
    }
}
